//! Single-cycle wavetables built from harmonic coefficients.
//!
//! `real[k]` and `imag[k]` are the cosine and sine amplitudes of harmonic `k`;
//! index 0 (DC) is ignored. The table is synthesized with an inverse transform
//! and normalized to a peak of 1.

use std::f64::consts::PI;
use std::sync::Arc;

use super::fft::{self, ComplexSample, TransformError};

/// Samples per wavetable cycle
pub const WAVETABLE_SIZE: usize = 2048;

/// Immutable wavetable shared between voices
#[derive(Debug, Clone)]
pub struct PeriodicWave {
    table: Arc<[f32]>,
}

impl PeriodicWave {
    /// Build a wavetable from cosine (`real`) and sine (`imag`) coefficients.
    ///
    /// Missing entries in the shorter array count as zero; harmonics at or
    /// above `WAVETABLE_SIZE / 2` are dropped.
    pub fn new(real: &[f64], imag: &[f64]) -> Result<Self, TransformError> {
        let n = WAVETABLE_SIZE;
        let harmonics = real.len().max(imag.len()).min(n / 2);

        let coefficient = |values: &[f64], k: usize| {
            values
                .get(k)
                .copied()
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        };

        // x[t] = sum_k real[k]·cos(2πkt/N) + imag[k]·sin(2πkt/N)
        let half = n as f64 / 2.0;
        let mut spectrum = vec![ComplexSample::new(0.0, 0.0); n];
        for k in 1..harmonics {
            let bin = ComplexSample::new(half * coefficient(real, k), -half * coefficient(imag, k));
            spectrum[k] = bin;
            spectrum[n - k] = bin.conj();
        }

        let samples = fft::inverse_transform(&spectrum)?;
        let peak = samples.iter().map(|c| c.re.abs()).fold(0.0, f64::max);
        let gain = if peak > 0.0 { 1.0 / peak } else { 0.0 };

        Ok(Self {
            table: samples.iter().map(|c| (c.re * gain) as f32).collect(),
        })
    }

    /// Pure sine wave
    pub fn sine() -> Self {
        let n = WAVETABLE_SIZE;
        Self {
            table: (0..n)
                .map(|i| (2.0 * PI * i as f64 / n as f64).sin() as f32)
                .collect(),
        }
    }

    pub fn table(&self) -> &[f32] {
        &self.table
    }

    /// Linearly interpolated sample at `phase` (cycles, wrapped into [0, 1))
    pub fn sample(&self, phase: f64) -> f32 {
        let n = self.table.len();
        let position = phase.rem_euclid(1.0) * n as f64;
        let index = position.floor() as usize % n;
        let frac = (position - position.floor()) as f32;
        let a = self.table[index];
        let b = self.table[(index + 1) % n];
        a + (b - a) * frac
    }

    /// Amplitudes of harmonics `1..=count`, measured with a forward transform
    pub fn harmonic_amplitudes(&self, count: usize) -> Vec<f64> {
        let samples: Vec<ComplexSample> = self
            .table
            .iter()
            .map(|&s| ComplexSample::new(s as f64, 0.0))
            .collect();
        let spectrum = fft::transform(&samples);
        let scale = 2.0 / spectrum.len() as f64;
        (1..=count)
            .map(|k| spectrum.get(k).map_or(0.0, |bin| bin.norm() * scale))
            .collect()
    }
}
