//! Orbit camera configuration.

use serde::Deserialize;
use std::f32::consts::FRAC_PI_4;

/// Orbit camera parameters (fixed radius around the origin)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrbitCameraParams {
    /// Distance from the look-at target (world units)
    pub radius: f32,

    /// Rotation per dragged pixel (radians)
    pub sensitivity_rad_per_px: f32,

    /// Angle both axes return to on reset (radians)
    pub reset_angle_rad: f32,

    /// Vertical field of view (degrees)
    pub fov_degrees: f32,

    /// Near clipping plane (world units)
    pub near_plane: f32,

    /// Far clipping plane (world units)
    pub far_plane: f32,
}

impl Default for OrbitCameraParams {
    fn default() -> Self {
        Self {
            radius: 10.0,
            sensitivity_rad_per_px: 0.01,
            reset_angle_rad: -FRAC_PI_4,
            fov_degrees: 45.0,
            near_plane: 0.1,
            far_plane: 100.0,
        }
    }
}
