//! Point-cloud mapping constants for the audio geometry stream.

use serde::Deserialize;

/// How byte frames are mapped into the two point-cloud bands
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeometryParams {
    /// Time-axis advance per tick after the first (world units before pan scaling)
    pub time_step_increment: f64,

    /// Frequency band: bins per world unit along Y
    pub frequency_y_scale: f64,

    /// Frequency band: Y offset lifting the spectrum above the waveform
    pub frequency_y_offset: f64,

    /// Waveform band: samples per world unit along Z
    pub waveform_z_scale: f64,

    /// Colour-cycle density for frequency points
    pub frequency_color_density: f64,

    /// Colour-cycle density for waveform points
    pub waveform_color_density: f64,

    /// Ticks a session runs before returning to idle
    pub tick_budget: usize,

    /// Keep only the newest N ticks of points per band (None = full trail)
    pub retained_ticks: Option<usize>,
}

impl Default for GeometryParams {
    fn default() -> Self {
        Self {
            time_step_increment: 0.005,
            frequency_y_scale: 500.0,
            frequency_y_offset: 0.25,
            waveform_z_scale: 500.0,
            frequency_color_density: 2.0,
            waveform_color_density: 2.35,
            tick_budget: 100,
            retained_ticks: None,
        }
    }
}
