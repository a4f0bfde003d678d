//! Rendering, chart and recording configuration.

use serde::Deserialize;
use std::path::PathBuf;

/// Rendering configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Window width (pixels)
    pub window_width: u32,

    /// Window height (pixels)
    pub window_height: u32,

    /// Clear colour (linear RGBA)
    pub background: [f64; 4],

    /// Draw the red/green/blue reference axes
    pub show_axes: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            background: [1.0, 1.0, 1.0, 1.0],
            show_axes: true,
        }
    }
}

/// 2-D spectrum / waveform chart configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Image width (pixels)
    pub width: u32,

    /// Image height (pixels)
    pub height: u32,

    /// Space reserved around the plot area for axes and ticks (pixels)
    pub padding: u32,

    /// Bar / line colour (RGBA)
    pub theme: [u8; 4],

    /// Directory chart snapshots are written to
    pub output_dir: PathBuf,

    /// TrueType/OpenType font for tick labels; unlabeled ticks without one
    pub font_path: Option<PathBuf>,

    /// Tick label height (pixels)
    pub label_size: f32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 240,
            padding: 20,
            theme: [40, 110, 220, 255],
            output_dir: PathBuf::from("charts"),
            font_path: None,
            label_size: 10.0,
        }
    }
}

/// Recording mode configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Output directory for recorded takes
    pub output_dir: PathBuf,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("recording"),
        }
    }
}

impl RecordingConfig {
    /// WAV path for the given take number
    pub fn take_path(&self, take: usize) -> PathBuf {
        self.output_dir.join(format!("take_{:03}.wav", take))
    }
}
