//! Orbit camera driven by pointer drags.

use glam::{Mat4, Vec3};
use std::f32::consts::FRAC_PI_2;

use crate::params::OrbitCameraParams;

/// Camera on a sphere of fixed radius, always looking at the origin
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    params: OrbitCameraParams,
    /// Elevation (radians), clamped to ±π/2
    angle_x: f32,
    /// Azimuth (radians), unbounded
    angle_y: f32,
}

impl OrbitCamera {
    /// Create a camera at the reset pose
    pub fn new(params: OrbitCameraParams) -> Self {
        let angle = params.reset_angle_rad;
        Self {
            params,
            angle_x: angle.clamp(-FRAC_PI_2, FRAC_PI_2),
            angle_y: angle,
        }
    }

    pub fn angle_x(&self) -> f32 {
        self.angle_x
    }

    pub fn angle_y(&self) -> f32 {
        self.angle_y
    }

    /// Apply a pointer delta in pixels: horizontal drags orbit around Y,
    /// vertical drags change elevation.
    pub fn rotate(&mut self, dx: f64, dy: f64) {
        let sensitivity = self.params.sensitivity_rad_per_px;
        self.angle_y += dx as f32 * sensitivity;
        self.angle_x = (self.angle_x + dy as f32 * sensitivity).clamp(-FRAC_PI_2, FRAC_PI_2);
    }

    pub fn reset(&mut self) {
        let angle = self.params.reset_angle_rad;
        self.angle_x = angle.clamp(-FRAC_PI_2, FRAC_PI_2);
        self.angle_y = angle;
    }

    /// Camera position on the orbit sphere
    pub fn eye(&self) -> Vec3 {
        let r = self.params.radius;
        let (sin_x, cos_x) = self.angle_x.sin_cos();
        let (sin_y, cos_y) = self.angle_y.sin_cos();
        Vec3::new(r * sin_y * cos_x, r * sin_x, r * cos_y * cos_x)
    }

    /// World Y, or a horizontal up vector when looking straight down/up
    fn up(&self) -> Vec3 {
        if self.angle_x.cos() > 1e-4 {
            return Vec3::Y;
        }
        let (sin_y, cos_y) = self.angle_y.sin_cos();
        -Vec3::new(sin_y, 0.0, cos_y) * self.angle_x.signum()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), Vec3::ZERO, self.up())
    }

    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.params.fov_degrees.to_radians(),
            aspect_ratio,
            self.params.near_plane,
            self.params.far_plane,
        )
    }
}

/// Turns press/move/release pointer events into move deltas
#[derive(Debug, Default, Clone)]
pub struct DragTracker {
    last: Option<(f64, f64)>,
}

impl DragTracker {
    pub fn press(&mut self, x: f64, y: f64) {
        self.last = Some((x, y));
    }

    /// Delta since the previous position, only while pressed
    pub fn move_to(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (last_x, last_y) = self.last?;
        self.last = Some((x, y));
        Some((x - last_x, y - last_y))
    }

    pub fn release(&mut self) {
        self.last = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.last.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    fn camera() -> OrbitCamera {
        OrbitCamera::new(OrbitCameraParams::default())
    }

    #[test]
    fn test_starts_at_reset_pose() {
        let cam = camera();
        assert_eq!(cam.angle_x(), -FRAC_PI_4);
        assert_eq!(cam.angle_y(), -FRAC_PI_4);
    }

    #[test]
    fn test_rotate_scales_by_sensitivity() {
        let mut cam = camera();
        cam.rotate(10.0, -20.0);
        assert!((cam.angle_y() - (-FRAC_PI_4 + 0.1)).abs() < 1e-6);
        assert!((cam.angle_x() - (-FRAC_PI_4 - 0.2)).abs() < 1e-6);
    }

    #[test]
    fn test_elevation_clamps_exactly() {
        let mut cam = camera();
        for _ in 0..500 {
            cam.rotate(0.0, 7.0);
            assert!(cam.angle_x() <= FRAC_PI_2);
        }
        assert_eq!(cam.angle_x(), FRAC_PI_2);

        for _ in 0..500 {
            cam.rotate(0.0, -7.0);
        }
        assert_eq!(cam.angle_x(), -FRAC_PI_2);
    }

    #[test]
    fn test_azimuth_is_unbounded() {
        let mut cam = camera();
        for _ in 0..1000 {
            cam.rotate(100.0, 0.0);
        }
        assert!(cam.angle_y() > 900.0);
    }

    #[test]
    fn test_reset_restores_pose() {
        let mut cam = camera();
        cam.rotate(123.0, 45.0);
        cam.reset();
        assert_eq!(cam.angle_x(), -FRAC_PI_4);
        assert_eq!(cam.angle_y(), -FRAC_PI_4);
    }

    #[test]
    fn test_eye_on_sphere() {
        let mut cam = camera();
        for (dx, dy) in [(0.0, 0.0), (50.0, 10.0), (-300.0, 80.0), (17.0, -200.0)] {
            cam.rotate(dx, dy);
            assert!((cam.eye().length() - 10.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_eye_formula_at_zero_angles() {
        let params = OrbitCameraParams {
            reset_angle_rad: 0.0,
            ..Default::default()
        };
        let cam = OrbitCamera::new(params);
        let eye = cam.eye();
        assert!(eye.x.abs() < 1e-6);
        assert!(eye.y.abs() < 1e-6);
        assert!((eye.z - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_view_maps_origin_in_front_of_camera() {
        let cam = camera();
        let origin = cam.view_matrix().transform_point3(Vec3::ZERO);
        // Right-handed view space looks down -Z
        assert!(origin.x.abs() < 1e-4);
        assert!(origin.y.abs() < 1e-4);
        assert!((origin.z + 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_view_is_finite_at_poles() {
        let mut cam = camera();
        cam.rotate(0.0, 1000.0);
        assert!(cam.view_matrix().is_finite());
        cam.rotate(0.0, -1000.0);
        assert!(cam.view_matrix().is_finite());
    }

    #[test]
    fn test_projection_matrix() {
        let proj = camera().projection_matrix(16.0 / 9.0);
        assert_ne!(proj, Mat4::IDENTITY);
        assert!(proj.is_finite());
    }

    #[test]
    fn test_drag_tracker_deltas() {
        let mut drag = DragTracker::default();
        assert_eq!(drag.move_to(5.0, 5.0), None);

        drag.press(10.0, 20.0);
        assert!(drag.is_dragging());
        assert_eq!(drag.move_to(15.0, 18.0), Some((5.0, -2.0)));
        assert_eq!(drag.move_to(15.0, 30.0), Some((0.0, 12.0)));

        drag.release();
        assert_eq!(drag.move_to(0.0, 0.0), None);
    }
}
