//! Sound engine: cpal output stream, voice mixer and WAV recording.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

use super::analyser::{Analyser, SampleTap, SharedTap};
use super::instrument::Sound;
use super::synthesis::{Mixer, Voice};
use crate::params::{AnalyserConfig, RecordingConfig, SynthConfig};

/// Errors raised while opening the device or recording
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoOutputDevice,

    #[error("failed to get audio config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported sample format {0} (expected f32)")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to create recording directory {path}: {source}")]
    RecordingDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("WAV recording failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("failed to open audio file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: symphonia::core::errors::Error,
    },

    #[error("{path} has no decodable audio track")]
    NoAudioTrack { path: PathBuf },

    #[error("{path} does not declare a sample rate")]
    UnknownSampleRate { path: PathBuf },
}

/// Tap of one started partial, kept by the caller to build analysers
#[derive(Clone)]
pub struct VoiceHandle {
    pub pan: f32,
    pub tap: SharedTap,
}

impl VoiceHandle {
    pub fn analyser(&self, config: AnalyserConfig) -> Analyser {
        Analyser::new(config, Arc::clone(&self.tap))
    }
}

type WavFileWriter = hound::WavWriter<BufWriter<File>>;

/// Stereo float WAV writer fed from the audio callback
pub struct Recorder {
    writer: Option<WavFileWriter>,
    path: PathBuf,
}

impl Recorder {
    pub fn create(path: &Path, sample_rate_hz: u32) -> Result<Self, AudioError> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: sample_rate_hz,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        Ok(Self {
            writer: Some(hound::WavWriter::create(path, spec)?),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an interleaved block; mono input is duplicated to both sides
    pub fn write_block(&mut self, data: &[f32], channels: usize) -> Result<(), AudioError> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        if channels == 0 {
            return Ok(());
        }
        for frame in data.chunks_exact(channels) {
            let left = frame[0];
            let right = frame.get(1).copied().unwrap_or(left);
            writer.write_sample(left)?;
            writer.write_sample(right)?;
        }
        Ok(())
    }

    /// Flush the header and close the file
    pub fn finish(mut self) -> Result<PathBuf, AudioError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(self.path)
    }
}

/// Owns the output stream and everything the callback touches
pub struct SoundEngine {
    mixer: Arc<Mutex<Mixer>>,
    recorder: Arc<Mutex<Option<Recorder>>>,
    sample_rate_hz: u32,
    tap_capacity: usize,
    recording_config: RecordingConfig,
    recorded_sounds: Vec<Sound>,
    takes: usize,

    /// Audio output stream (kept alive)
    _stream: cpal::Stream,
}

impl SoundEngine {
    /// Open the default output device and start a silent stream
    pub fn new(
        synth_config: &SynthConfig,
        analyser_config: &AnalyserConfig,
        recording_config: RecordingConfig,
    ) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let supported = device.default_output_config()?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(supported.sample_format()));
        }
        let sample_rate_hz = supported.sample_rate().0;
        let channels = supported.channels() as usize;

        log::info!(
            "Audio: {} @ {}Hz, {} channel(s)",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate_hz,
            channels
        );

        let mixer = Arc::new(Mutex::new(Mixer::new(synth_config, sample_rate_hz)));
        let recorder: Arc<Mutex<Option<Recorder>>> = Arc::new(Mutex::new(None));

        let mixer_clone = Arc::clone(&mixer);
        let recorder_clone = Arc::clone(&recorder);

        let stream = device.build_output_stream(
            &supported.config(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                mixer_clone
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .render(data, channels);

                let mut recorder = recorder_clone.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(active) = recorder.as_mut() {
                    if let Err(e) = active.write_block(data, channels) {
                        log::error!("Recording stopped: {}", e);
                        *recorder = None;
                    }
                }
            },
            |err| log::error!("Audio stream error: {}", err),
            None,
        )?;

        stream.play()?;

        Ok(Self {
            mixer,
            recorder,
            sample_rate_hz,
            tap_capacity: analyser_config.fft_size,
            recording_config,
            recorded_sounds: Vec::new(),
            takes: 0,
            _stream: stream,
        })
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn mixer(&self) -> std::sync::MutexGuard<'_, Mixer> {
        self.mixer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start every partial of `sound` now; one handle per partial
    pub fn play(&mut self, sound: &Sound) -> Vec<VoiceHandle> {
        let handles: Vec<VoiceHandle> = {
            let mut mixer = self.mixer();
            sound
                .partials
                .iter()
                .map(|partial| {
                    let tap = SampleTap::shared(self.tap_capacity);
                    mixer.add_voice(Voice::new(
                        partial.wave.clone(),
                        partial.frequency_hz,
                        partial.amplitude,
                        partial.envelope,
                        partial.pan,
                        Arc::clone(&tap),
                    ));
                    VoiceHandle {
                        pan: partial.pan,
                        tap,
                    }
                })
                .collect()
        };

        log::debug!(
            "Started {} partial(s), {:.2}s",
            handles.len(),
            sound.duration()
        );

        if self.is_recording() {
            self.recorded_sounds.push(sound.clone());
        }
        handles
    }

    pub fn pause(&self) {
        self.mixer().set_paused(true);
        log::info!("Audio paused");
    }

    pub fn resume(&self) {
        self.mixer().set_paused(false);
        log::info!("Audio resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.mixer().is_paused()
    }

    /// Silence every voice and close an active recording
    pub fn stop(&mut self) -> Result<(), AudioError> {
        self.mixer().stop_all();
        if self.is_recording() {
            self.finish_recording()?;
        }
        log::info!("Audio stopped");
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start a new take or finish the current one. Returns the new state.
    pub fn toggle_recording(&mut self) -> Result<bool, AudioError> {
        if self.is_recording() {
            self.finish_recording()?;
            return Ok(false);
        }

        let dir = &self.recording_config.output_dir;
        std::fs::create_dir_all(dir).map_err(|source| AudioError::RecordingDir {
            path: dir.clone(),
            source,
        })?;

        self.takes += 1;
        let path = self.recording_config.take_path(self.takes);
        let recorder = Recorder::create(&path, self.sample_rate_hz)?;
        *self.recorder.lock().unwrap_or_else(PoisonError::into_inner) = Some(recorder);
        self.recorded_sounds.clear();

        log::info!("Recording to {}", path.display());
        Ok(true)
    }

    fn finish_recording(&mut self) -> Result<(), AudioError> {
        let taken = self
            .recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(recorder) = taken {
            let path = recorder.finish()?;
            log::info!(
                "Recording saved to {} ({} sound(s))",
                path.display(),
                self.recorded_sounds.len()
            );
        }
        Ok(())
    }

    /// Sounds played during the current or most recent take
    pub fn recorded_sounds(&self) -> &[Sound] {
        &self.recorded_sounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_writes_stereo_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");

        let mut recorder = Recorder::create(&path, 48_000).unwrap();
        recorder.write_block(&[0.1, -0.1, 0.2, -0.2], 2).unwrap();
        let saved = recorder.finish().unwrap();
        assert_eq!(saved, path);

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48_000);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);

        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.1, -0.1, 0.2, -0.2]);
    }

    #[test]
    fn test_recorder_duplicates_mono_and_drops_extra_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");

        let mut recorder = Recorder::create(&path, 44_100).unwrap();
        recorder.write_block(&[0.5, 0.25], 1).unwrap();
        recorder.write_block(&[0.1, 0.2, 0.9, 0.3, 0.4, 0.9], 3).unwrap();
        recorder.finish().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0.5, 0.5, 0.25, 0.25, 0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_recorder_create_fails_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("take.wav");
        assert!(matches!(
            Recorder::create(&path, 48_000),
            Err(AudioError::Wav(_))
        ));
    }

    #[test]
    fn test_voice_handle_builds_analyser_on_shared_tap() {
        let handle = VoiceHandle {
            pan: 1.0,
            tap: SampleTap::shared(1024),
        };
        let analyser = handle.analyser(AnalyserConfig::default());
        assert!(Arc::ptr_eq(analyser.tap(), &handle.tap));
    }
}
