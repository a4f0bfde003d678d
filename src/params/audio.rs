//! Analyser and synthesizer configuration.

use serde::Deserialize;

use crate::config::ConfigError;

/// Byte-frame analyser configuration (mirrors a Web Audio `AnalyserNode`)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    /// Analysis window size in samples (must be power of 2)
    /// Frequency frames carry `fft_size / 2` bins, time-domain frames `fft_size` samples
    pub fft_size: usize,

    /// Exponential smoothing between consecutive magnitude frames (0.0-1.0)
    pub smoothing_time_constant: f32,

    /// Magnitude mapped to byte 0 (dBFS)
    pub min_decibels: f32,

    /// Magnitude mapped to byte 255 (dBFS)
    pub max_decibels: f32,

    /// Frames per second of audio consumed when stepping through a file
    pub file_frame_rate: u32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            file_frame_rate: 60,
        }
    }
}

impl AnalyserConfig {
    /// Number of bins in a frequency frame
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Centre frequency (Hz) of a frequency-frame bin
    pub fn bin_to_hz(&self, bin: usize, sample_rate_hz: u32) -> f32 {
        bin as f32 * sample_rate_hz as f32 / self.fft_size as f32
    }

    /// Validate configuration (FFT size must be power of 2, etc.)
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fft_size < 32 || !self.fft_size.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "analyser fft_size must be a power of 2 >= 32, got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(ConfigError::Invalid(format!(
                "analyser smoothing_time_constant must be within 0..=1, got {}",
                self.smoothing_time_constant
            )));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(ConfigError::Invalid(format!(
                "analyser min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            )));
        }
        if self.file_frame_rate == 0 {
            return Err(ConfigError::Invalid(
                "analyser file_frame_rate must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Synthesizer voice and bus configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Centre frequency of the master-bus band-pass filter (Hz)
    pub band_pass_center_hz: f32,

    /// Quality factor of the band-pass filter (dimensionless, higher = narrower)
    pub band_pass_q: f32,

    /// Gain applied after the band-pass filter
    pub master_gain: f32,

    /// Hard output clip (absolute sample value) protecting ears and speakers
    pub output_limit: f32,

    /// Number of overtones and sub-octaves generated per note
    pub harmonic_depth: u32,

    /// Piano key (1 = A0, 49 = A4) played by the first key of the note row
    pub base_key: i32,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            band_pass_center_hz: 1000.0,
            band_pass_q: 1.0,
            master_gain: 1.0,
            output_limit: 0.5,
            harmonic_depth: 1,
            base_key: 40, // C4
        }
    }
}

impl SynthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.band_pass_center_hz <= 0.0 || self.band_pass_q <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "band-pass filter needs positive centre and Q, got {} Hz / Q {}",
                self.band_pass_center_hz, self.band_pass_q
            )));
        }
        if self.output_limit <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "output_limit must be > 0, got {}",
                self.output_limit
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_analyser_matches_voice_taps() {
        let config = AnalyserConfig::default();
        assert_eq!(config.frequency_bin_count(), 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bin_to_hz() {
        let config = AnalyserConfig::default();

        // 48000 Hz / 1024 = 46.875 Hz per bin
        assert_eq!(config.bin_to_hz(0, 48_000), 0.0);
        assert!((config.bin_to_hz(2, 48_000) - 93.75).abs() < 1e-4);
    }

    #[test]
    fn test_analyser_rejects_non_power_of_two() {
        let config = AnalyserConfig {
            fft_size: 1000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_analyser_rejects_inverted_decibel_range() {
        let config = AnalyserConfig {
            min_decibels: -20.0,
            max_decibels: -30.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_analyser_rejects_zero_file_frame_rate() {
        let config = AnalyserConfig {
            file_frame_rate: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_synth_defaults_validate() {
        assert!(SynthConfig::default().validate().is_ok());
        let broken = SynthConfig {
            band_pass_q: 0.0,
            ..Default::default()
        };
        assert!(broken.validate().is_err());
    }
}
