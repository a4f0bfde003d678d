//! Byte-quantized frequency and waveform frames over a voice tap.
//!
//! The synth callback pushes every rendered voice block into a [`SampleTap`].
//! An [`Analyser`] snapshots the newest `fft_size` samples on demand and turns
//! them into the same byte frames a Web Audio `AnalyserNode` produces.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::{Arc, Mutex, PoisonError};

use crate::params::AnalyserConfig;

/// Pull-based source of byte frames (latest snapshot only, no buffering)
pub trait FrameSource {
    /// Entries in a frequency frame
    fn frequency_bin_count(&self) -> usize;

    /// Entries in a time-domain frame
    fn fft_size(&self) -> usize;

    /// Fill `out` with magnitude-by-bin bytes
    fn byte_frequency_data(&mut self, out: &mut [u8]);

    /// Fill `out` with amplitude-by-sample bytes (128 = silence)
    fn byte_time_domain_data(&mut self, out: &mut [u8]);
}

/// Ring buffer holding the newest samples of one voice
#[derive(Debug, Clone)]
pub struct SampleTap {
    samples: Vec<f32>,
    write: usize,
}

/// Tap shared between the audio callback and the UI thread
pub type SharedTap = Arc<Mutex<SampleTap>>;

impl SampleTap {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)],
            write: 0,
        }
    }

    pub fn shared(capacity: usize) -> SharedTap {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn push_slice(&mut self, block: &[f32]) {
        let capacity = self.samples.len();
        // Only the newest `capacity` samples can survive
        let block = &block[block.len().saturating_sub(capacity)..];
        for &s in block {
            self.samples[self.write] = s;
            self.write = (self.write + 1) % capacity;
        }
    }

    /// Copy the newest `out.len()` samples, oldest first
    pub fn snapshot(&self, out: &mut [f32]) {
        let capacity = self.samples.len();
        let count = out.len().min(capacity);
        let start = (self.write + capacity - count) % capacity;
        for (i, slot) in out.iter_mut().take(count).enumerate() {
            *slot = self.samples[(start + i) % capacity];
        }
        for slot in out.iter_mut().skip(count) {
            *slot = 0.0;
        }
    }
}

/// Web-Audio-style analyser reading one voice tap
pub struct Analyser {
    config: AnalyserConfig,
    tap: SharedTap,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    time_domain: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
}

impl Analyser {
    pub fn new(config: AnalyserConfig, tap: SharedTap) -> Self {
        let fft_size = config.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            window: blackman_window(fft_size),
            smoothed: vec![0.0; config.frequency_bin_count()],
            time_domain: vec![0.0; fft_size],
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            config,
            tap,
            fft,
        }
    }

    pub fn tap(&self) -> &SharedTap {
        &self.tap
    }

    fn capture(&mut self) {
        let tap = self.tap.lock().unwrap_or_else(PoisonError::into_inner);
        tap.snapshot(&mut self.time_domain);
    }

    /// Run the FFT and fold the new magnitudes into the smoothed spectrum
    fn update_spectrum(&mut self) {
        self.capture();

        for ((slot, &s), &w) in self
            .spectrum
            .iter_mut()
            .zip(&self.time_domain)
            .zip(&self.window)
        {
            *slot = Complex::new(s * w, 0.0);
        }
        self.fft.process(&mut self.spectrum);

        let tau = self.config.smoothing_time_constant;
        let scale = 1.0 / self.config.fft_size as f32;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.spectrum) {
            let magnitude = bin.norm() * scale;
            let next = tau * *smoothed + (1.0 - tau) * magnitude;
            // Flush NaN/inf so one bad block cannot poison the average
            *smoothed = if next.is_finite() { next } else { 0.0 };
        }
    }
}

impl FrameSource for Analyser {
    fn frequency_bin_count(&self) -> usize {
        self.config.frequency_bin_count()
    }

    fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.update_spectrum();

        let min_db = self.config.min_decibels;
        let range = self.config.max_decibels - min_db;
        for (byte, &magnitude) in out.iter_mut().zip(&self.smoothed) {
            let db = 20.0 * magnitude.log10();
            *byte = if db.is_finite() {
                (255.0 * (db - min_db) / range).clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
    }

    fn byte_time_domain_data(&mut self, out: &mut [u8]) {
        self.capture();
        for (byte, &s) in out.iter_mut().zip(&self.time_domain) {
            *byte = (128.0 * (1.0 + s)).clamp(0.0, 255.0) as u8;
        }
    }
}

/// Blackman window (alpha = 0.16)
pub fn blackman_window(size: usize) -> Vec<f32> {
    let (a0, a1, a2) = (0.42, 0.5, 0.08);
    (0..size)
        .map(|i| {
            let phase = 2.0 * PI * i as f32 / size as f32;
            a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyser_with(samples: &[f32]) -> Analyser {
        let config = AnalyserConfig {
            smoothing_time_constant: 0.0,
            ..Default::default()
        };
        let tap = SampleTap::shared(config.fft_size);
        tap.lock().unwrap().push_slice(samples);
        Analyser::new(config, tap)
    }

    #[test]
    fn test_tap_keeps_newest_samples_in_order() {
        let mut tap = SampleTap::new(4);
        tap.push_slice(&[1.0, 2.0, 3.0]);
        tap.push_slice(&[4.0, 5.0]);

        let mut out = [0.0; 4];
        tap.snapshot(&mut out);
        assert_eq!(out, [2.0, 3.0, 4.0, 5.0]);

        let mut newest = [0.0; 2];
        tap.snapshot(&mut newest);
        assert_eq!(newest, [4.0, 5.0]);
    }

    #[test]
    fn test_tap_oversized_block() {
        let mut tap = SampleTap::new(3);
        tap.push_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let mut out = [0.0; 3];
        tap.snapshot(&mut out);
        assert_eq!(out, [5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_silent_tap_frames() {
        let mut analyser = analyser_with(&[]);
        let mut freq = vec![7u8; analyser.frequency_bin_count()];
        let mut wave = vec![7u8; analyser.fft_size()];

        analyser.byte_frequency_data(&mut freq);
        analyser.byte_time_domain_data(&mut wave);

        assert!(freq.iter().all(|&b| b == 0));
        assert!(wave.iter().all(|&b| b == 128));
    }

    #[test]
    fn test_time_domain_quantization_clamps() {
        let mut analyser = analyser_with(&[-1.0, 0.5, 2.0]);
        let mut wave = vec![0u8; analyser.fft_size()];
        analyser.byte_time_domain_data(&mut wave);

        let tail = &wave[wave.len() - 3..];
        assert_eq!(tail, &[0, 192, 255]);
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let config = AnalyserConfig::default();
        let bin = 32;
        let samples: Vec<f32> = (0..config.fft_size)
            .map(|i| 0.05 * (2.0 * PI * bin as f32 * i as f32 / config.fft_size as f32).sin())
            .collect();

        let mut analyser = analyser_with(&samples);
        let mut freq = vec![0u8; analyser.frequency_bin_count()];
        analyser.byte_frequency_data(&mut freq);

        let (peak_bin, &peak) = freq
            .iter()
            .enumerate()
            .max_by_key(|(_, &b)| b)
            .unwrap();
        // Quiet enough that neighbouring bins do not clip to 255 as well
        assert_eq!(peak_bin, bin);
        assert!(peak > 200 && peak < 255);
    }

    #[test]
    fn test_short_output_buffer_is_filled_partially() {
        let mut analyser = analyser_with(&[0.25; 1024]);
        let mut wave = [0u8; 4];
        analyser.byte_time_domain_data(&mut wave);
        assert_eq!(wave, [160; 4]);
    }
}
