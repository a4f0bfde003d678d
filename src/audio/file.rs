//! Byte frames from a decoded audio file.
//!
//! The file is decoded up front (any format symphonia probes), downmixed to
//! mono, and then stepped through one hop per frequency frame so a geometry
//! session sees the file play back at `file_frame_rate` ticks per second.

use std::path::Path;
use std::sync::PoisonError;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::analyser::{Analyser, FrameSource, SampleTap};
use super::system::AudioError;
use crate::params::AnalyserConfig;

/// Mono samples of a whole file
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate_hz.max(1) as f64
    }
}

/// Decode the first audio track of `path` and downmix it to mono
pub fn decode_file(path: &Path) -> Result<DecodedAudio, AudioError> {
    let decode_err = |source| AudioError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let file = std::fs::File::open(path).map_err(|source| AudioError::OpenFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(decode_err)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::NoAudioTrack {
            path: path.to_path_buf(),
        })?;
    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate_hz = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::UnknownSampleRate {
            path: path.to_path_buf(),
        })?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_err)?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(decode_err(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping corrupt packet in {}: {}", path.display(), msg);
                continue;
            }
            Err(e) => return Err(decode_err(e)),
        };

        let spec = *decoded.spec();
        let mut buffer = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        buffer.copy_interleaved_ref(decoded);

        for frame in buffer.samples().chunks(channels) {
            samples.push(frame.iter().sum::<f32>() / channels as f32);
        }
    }

    let audio = DecodedAudio {
        samples,
        sample_rate_hz,
    };
    log::info!(
        "Decoded {}: {} samples, {} Hz, {:.1}s",
        path.display(),
        audio.samples.len(),
        audio.sample_rate_hz,
        audio.duration_secs()
    );
    Ok(audio)
}

/// Steps an [`Analyser`] through a decoded file.
///
/// Each frequency frame pushes the next hop of samples into the analyser's
/// tap, so the time-domain frame of the same tick sees the same window. Past
/// the end of the file the tap fills with silence.
pub struct FileSource {
    samples: Vec<f32>,
    sample_rate_hz: u32,
    hop: usize,
    position: usize,
    silence: Vec<f32>,
    analyser: Analyser,
}

impl FileSource {
    pub fn new(audio: DecodedAudio, config: AnalyserConfig) -> Self {
        let hop = (audio.sample_rate_hz / config.file_frame_rate.max(1)).max(1) as usize;
        let tap = SampleTap::shared(config.fft_size);
        Self {
            samples: audio.samples,
            sample_rate_hz: audio.sample_rate_hz,
            hop,
            position: 0,
            silence: vec![0.0; hop],
            analyser: Analyser::new(config, tap),
        }
    }

    /// Decode `path` and wrap it
    pub fn open(path: &Path, config: AnalyserConfig) -> Result<Self, AudioError> {
        Ok(Self::new(decode_file(path)?, config))
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Samples consumed per frequency frame
    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.samples.len()
    }

    fn advance(&mut self) {
        let end = (self.position + self.hop).min(self.samples.len());
        let mut tap = self
            .analyser
            .tap()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tap.push_slice(&self.samples[self.position..end]);
        let missing = self.hop - (end - self.position);
        if missing > 0 {
            tap.push_slice(&self.silence[..missing]);
        }
        self.position = end;
    }
}

impl FrameSource for FileSource {
    fn frequency_bin_count(&self) -> usize {
        self.analyser.frequency_bin_count()
    }

    fn fft_size(&self) -> usize {
        self.analyser.fft_size()
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.advance();
        self.analyser.byte_frequency_data(out);
    }

    fn byte_time_domain_data(&mut self, out: &mut [u8]) {
        self.analyser.byte_time_domain_data(out);
    }
}
