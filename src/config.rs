//! Optional `soundviz.toml` configuration.
//!
//! Every table and field falls back to the defaults in [`crate::params`], so a
//! file only needs the values it changes:
//!
//! ```toml
//! [geometry]
//! tick_budget = 300
//! retained_ticks = 120
//!
//! [synth]
//! harmonic_depth = 2
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::params::{
    AnalyserConfig, ChartConfig, GeometryParams, OrbitCameraParams, RecordingConfig,
    RenderConfig, SynthConfig,
};

/// File picked up from the working directory when `--config` is absent
pub const CONFIG_FILE_NAME: &str = "soundviz.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub geometry: GeometryParams,
    pub camera: OrbitCameraParams,
    pub analyser: AnalyserConfig,
    pub synth: SynthConfig,
    pub render: RenderConfig,
    pub chart: ChartConfig,
    pub recording: RecordingConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analyser.validate()?;
        self.synth.validate()?;

        let g = &self.geometry;
        if !(g.frequency_y_scale > 0.0 && g.waveform_z_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "geometry scales must be > 0, got {} / {}",
                g.frequency_y_scale, g.waveform_z_scale
            )));
        }
        if !g.time_step_increment.is_finite() {
            return Err(ConfigError::Invalid(
                "geometry time_step_increment must be finite".to_string(),
            ));
        }
        if g.retained_ticks == Some(0) {
            return Err(ConfigError::Invalid(
                "geometry retained_ticks must be at least 1 (omit it to keep everything)"
                    .to_string(),
            ));
        }

        let c = &self.camera;
        if c.radius <= 0.0 || c.near_plane <= 0.0 || c.near_plane >= c.far_plane {
            return Err(ConfigError::Invalid(format!(
                "camera needs radius > 0 and 0 < near < far, got radius {} near {} far {}",
                c.radius, c.near_plane, c.far_plane
            )));
        }

        if self.render.window_width == 0 || self.render.window_height == 0 {
            return Err(ConfigError::Invalid("window size must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Explicit path if given, otherwise `soundviz.toml` in the working directory
pub fn discover_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    local.exists().then_some(local)
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[geometry]\ntick_budget = 250\nretained_ticks = 40\n\n[synth]\nharmonic_depth = 3"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.geometry.tick_budget, 250);
        assert_eq!(config.geometry.retained_ticks, Some(40));
        assert_eq!(config.geometry.time_step_increment, 0.005);
        assert_eq!(config.synth.harmonic_depth, 3);
        assert_eq!(config.synth.base_key, 40);
        assert_eq!(config.analyser.fft_size, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_default() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.geometry.tick_budget, 100);
        assert_eq!(config.camera.radius, 10.0);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[geometry]\ntick_budget = \"lots\"").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validation_catches_bad_values() {
        let mut config = Config::default();
        config.analyser.fft_size = 100;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.geometry.retained_ticks = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.camera.near_plane = 200.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/tmp/custom.toml");
        assert_eq!(discover_config_path(Some(path)), Some(path.to_path_buf()));
    }
}
