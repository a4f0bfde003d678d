//! Audio geometry stream: byte frames accumulated into a two-band point cloud.
//!
//! Every tick pulls one frequency frame and one time-domain frame from a
//! [`FrameSource`] and appends one point per entry to the matching band. The
//! time cursor moves the newest tick along X (scaled by the session's pan),
//! so the cloud grows into a trail. Nothing is pruned unless a retention cap
//! is configured.

mod color;

pub use color::color_at;

use std::collections::VecDeque;

use crate::audio::FrameSource;
use crate::camera::OrbitCamera;
use crate::params::{GeometryParams, OrbitCameraParams};
use crate::rendering::SceneRenderer;

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No session was running; nothing happened
    Idle,
    /// Points were appended and more ticks remain
    Continue,
    /// Points were appended and the budget is now exhausted
    Finished,
}

enum Session {
    Idle,
    Running {
        source: Box<dyn FrameSource>,
        tick_budget: usize,
        ticks_elapsed: usize,
        pan: f64,
    },
}

/// One data series with its own cursor and buffers
#[derive(Default)]
struct Band {
    /// Flattened xyz triples
    positions: Vec<f32>,
    /// Flattened rgba quadruples, parallel to `positions`
    colors: Vec<f32>,
    /// Points appended by each retained tick, oldest first
    tick_lengths: VecDeque<usize>,
    time_step: Option<f64>,
    frame: Vec<u8>,
}

impl Band {
    fn reset(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.tick_lengths.clear();
        self.time_step = None;
        self.frame.clear();
    }

    /// First tick sits at 0, later ticks move by `increment`
    fn advance(&mut self, increment: f64) -> f64 {
        let step = self.time_step.map_or(0.0, |t| t + increment);
        self.time_step = Some(step);
        step
    }

    /// Largest byte in the frame, with silence treated as 1
    fn peak(&self) -> f64 {
        match self.frame.iter().copied().max() {
            Some(0) | None => 1.0,
            Some(peak) => peak as f64,
        }
    }

    fn push(&mut self, point: [f64; 3], color: [f64; 4]) {
        self.positions.extend(point.iter().map(|&v| v as f32));
        self.colors.extend(color.iter().map(|&v| v as f32));
    }

    /// Record this tick's length and drop the oldest ticks beyond `retained`
    fn end_tick(&mut self, points: usize, retained: Option<usize>) {
        self.tick_lengths.push_back(points);
        let Some(retained) = retained else {
            return;
        };
        let mut dropped = 0;
        while self.tick_lengths.len() > retained {
            dropped += self.tick_lengths.pop_front().unwrap_or(0);
        }
        if dropped > 0 {
            self.positions.drain(..3 * dropped);
            self.colors.drain(..4 * dropped);
        }
    }

    fn point_count(&self) -> usize {
        self.positions.len() / 3
    }
}

/// Per-session accumulator of frequency and waveform geometry plus its camera
pub struct AudioGeometryStream {
    params: GeometryParams,
    frequency: Band,
    waveform: Band,
    session: Session,
    camera: OrbitCamera,
}

impl AudioGeometryStream {
    pub fn new(params: GeometryParams, camera_params: OrbitCameraParams) -> Self {
        Self {
            params,
            frequency: Band::default(),
            waveform: Band::default(),
            session: Session::Idle,
            camera: OrbitCamera::new(camera_params),
        }
    }

    /// Begin a new session: clear everything and run `tick_budget` ticks.
    ///
    /// `pan` scales the time axis for the whole session. A zero budget
    /// leaves the stream idle.
    pub fn start(&mut self, source: Box<dyn FrameSource>, tick_budget: usize, pan: f64) {
        self.frequency.reset();
        self.waveform.reset();

        if tick_budget == 0 {
            self.session = Session::Idle;
            log::debug!("Geometry session skipped (zero tick budget)");
            return;
        }

        log::info!(
            "Geometry session started: {} ticks, pan {:+.1}, {} bins / {} samples",
            tick_budget,
            pan,
            source.frequency_bin_count(),
            source.fft_size()
        );
        self.session = Session::Running {
            source,
            tick_budget,
            ticks_elapsed: 0,
            pan,
        };
    }

    /// Drop the frame source; accumulated geometry stays drawable
    pub fn stop(&mut self) {
        if self.is_running() {
            log::info!("Geometry session stopped");
        }
        self.session = Session::Idle;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.session, Session::Running { .. })
    }

    /// Ticks executed so far in the running session
    pub fn ticks_elapsed(&self) -> Option<usize> {
        match &self.session {
            Session::Running { ticks_elapsed, .. } => Some(*ticks_elapsed),
            Session::Idle => None,
        }
    }

    /// Sample both bands once. Safe to call while idle.
    pub fn tick(&mut self) -> TickOutcome {
        let Session::Running {
            source,
            tick_budget,
            ticks_elapsed,
            pan,
        } = &mut self.session
        else {
            return TickOutcome::Idle;
        };

        sample_frequency_band(&mut self.frequency, source.as_mut(), *pan, &self.params);
        sample_waveform_band(&mut self.waveform, source.as_mut(), *pan, &self.params);

        *ticks_elapsed += 1;
        log::trace!(
            "Tick {}/{}: {} points",
            ticks_elapsed,
            tick_budget,
            self.frequency.point_count() + self.waveform.point_count()
        );

        if *ticks_elapsed < *tick_budget {
            return TickOutcome::Continue;
        }

        log::info!(
            "Geometry session finished: {} points",
            self.frequency.point_count() + self.waveform.point_count()
        );
        self.session = Session::Idle;
        TickOutcome::Finished
    }

    pub fn frequency_positions(&self) -> &[f32] {
        &self.frequency.positions
    }

    pub fn waveform_positions(&self) -> &[f32] {
        &self.waveform.positions
    }

    /// Newest frequency frame (empty before the first tick of a session)
    pub fn frequency_frame(&self) -> &[u8] {
        &self.frequency.frame
    }

    /// Newest time-domain frame
    pub fn waveform_frame(&self) -> &[u8] {
        &self.waveform.frame
    }

    /// `frequency_positions ++ waveform_positions`
    pub fn positions(&self) -> Vec<f32> {
        [self.frequency.positions.as_slice(), &self.waveform.positions].concat()
    }

    /// RGBA per point, parallel to [`positions`](Self::positions)
    pub fn colors(&self) -> Vec<f32> {
        [self.frequency.colors.as_slice(), &self.waveform.colors].concat()
    }

    pub fn point_count(&self) -> usize {
        self.frequency.point_count() + self.waveform.point_count()
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn rotate_camera(&mut self, dx: f64, dy: f64) {
        self.camera.rotate(dx, dy);
    }

    pub fn reset_camera(&mut self) {
        self.camera.reset();
    }

    /// Submit the whole accumulated cloud with the current camera
    pub fn draw(&self, renderer: &mut dyn SceneRenderer, aspect_ratio: f32) {
        renderer.draw(
            &self.positions(),
            &self.colors(),
            self.camera.view_matrix(),
            self.camera.projection_matrix(aspect_ratio),
        );
    }
}

/// Spectrum: bins along Y, magnitude along Z
fn sample_frequency_band(
    band: &mut Band,
    source: &mut dyn FrameSource,
    pan: f64,
    params: &GeometryParams,
) {
    band.frame.resize(source.frequency_bin_count(), 0);
    source.byte_frequency_data(&mut band.frame);

    let x = pan * band.advance(params.time_step_increment);
    let peak = band.peak();
    let len = band.frame.len();

    for i in 0..len {
        let y = if i == 0 {
            0.0
        } else {
            i as f64 / params.frequency_y_scale
        } + params.frequency_y_offset;
        let z = band.frame[i] as f64 / peak;
        band.push(
            [x, y, z],
            color_at(i, len, params.frequency_color_density),
        );
    }
    band.end_tick(len, params.retained_ticks);
}

/// Waveform: amplitude along -Y, samples along Z centred on the origin
fn sample_waveform_band(
    band: &mut Band,
    source: &mut dyn FrameSource,
    pan: f64,
    params: &GeometryParams,
) {
    band.frame.resize(source.fft_size(), 0);
    source.byte_time_domain_data(&mut band.frame);

    let x = pan * band.advance(params.time_step_increment);
    let peak = band.peak();
    let len = band.frame.len();
    let half = len as f64 / 2.0;

    for i in 0..len {
        let y = -(band.frame[i] as f64 / peak);
        let z = (half - i as f64) / params.waveform_z_scale;
        band.push([x, y, z], color_at(i, len, params.waveform_color_density));
    }
    band.end_tick(len, params.retained_ticks);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    /// Frame source replaying fixed frames
    struct FixedFrames {
        frequency: Vec<u8>,
        waveform: Vec<u8>,
    }

    impl FrameSource for FixedFrames {
        fn frequency_bin_count(&self) -> usize {
            self.frequency.len()
        }

        fn fft_size(&self) -> usize {
            self.waveform.len()
        }

        fn byte_frequency_data(&mut self, out: &mut [u8]) {
            out.copy_from_slice(&self.frequency);
        }

        fn byte_time_domain_data(&mut self, out: &mut [u8]) {
            out.copy_from_slice(&self.waveform);
        }
    }

    fn source(frequency: &[u8], waveform: &[u8]) -> Box<dyn FrameSource> {
        Box::new(FixedFrames {
            frequency: frequency.to_vec(),
            waveform: waveform.to_vec(),
        })
    }

    fn stream() -> AudioGeometryStream {
        AudioGeometryStream::new(GeometryParams::default(), OrbitCameraParams::default())
    }

    fn point(positions: &[f32], i: usize) -> [f32; 3] {
        [positions[3 * i], positions[3 * i + 1], positions[3 * i + 2]]
    }

    #[test]
    fn test_budget_bounds_ticks() {
        let mut s = stream();
        s.start(source(&[10; 8], &[128; 16]), 3, 1.0);

        assert_eq!(s.tick(), TickOutcome::Continue);
        assert_eq!(s.tick(), TickOutcome::Continue);
        assert_eq!(s.tick(), TickOutcome::Finished);
        assert!(!s.is_running());

        assert_eq!(s.frequency_positions().len(), 3 * 3 * 8);
        assert_eq!(s.waveform_positions().len(), 3 * 3 * 16);

        // Exhausted sessions stop growing
        assert_eq!(s.tick(), TickOutcome::Idle);
        assert_eq!(s.frequency_positions().len(), 3 * 3 * 8);
    }

    #[test]
    fn test_zero_budget_runs_nothing() {
        let mut s = stream();
        s.start(source(&[1; 4], &[1; 4]), 0, 1.0);
        assert!(!s.is_running());
        assert_eq!(s.tick(), TickOutcome::Idle);
        assert_eq!(s.point_count(), 0);
    }

    #[test]
    fn test_latest_frames_survive_the_session() {
        let mut s = stream();
        assert!(s.frequency_frame().is_empty());

        s.start(source(&[3, 9], &[128, 200, 10]), 1, 1.0);
        assert_eq!(s.tick(), TickOutcome::Finished);
        assert_eq!(s.frequency_frame(), &[3, 9]);
        assert_eq!(s.waveform_frame(), &[128, 200, 10]);

        // A new session starts from empty frames
        s.start(source(&[1], &[1]), 1, 1.0);
        assert!(s.frequency_frame().is_empty());
        assert!(s.waveform_frame().is_empty());
    }

    #[test]
    fn test_idle_tick_is_noop() {
        let mut s = stream();
        assert_eq!(s.tick(), TickOutcome::Idle);
        assert!(s.positions().is_empty());
        assert_eq!(s.ticks_elapsed(), None);
    }

    #[test]
    fn test_frequency_point_mapping() {
        let mut s = stream();
        s.start(source(&[0, 50, 100, 200], &[128; 2]), 2, -1.0);
        s.tick();

        let p = s.frequency_positions();
        assert_eq!(point(p, 0), [0.0, 0.25, 0.0]);
        assert_eq!(point(p, 1), [0.0, (1.0 / 500.0 + 0.25) as f32, 0.25]);
        assert_eq!(point(p, 3), [0.0, (3.0 / 500.0 + 0.25) as f32, 1.0]);

        // Second tick moves along X by pan * increment
        s.tick();
        assert!((point(s.frequency_positions(), 4)[0] + 0.005).abs() < 1e-9);
    }

    #[test]
    fn test_waveform_point_mapping() {
        let mut s = stream();
        s.start(source(&[1], &[64, 128, 255, 0]), 2, 1.0);
        s.tick();
        s.tick();

        let p = s.waveform_positions();
        let first = point(p, 0);
        assert_eq!(first[0], 0.0);
        assert!((first[1] + 64.0 / 255.0).abs() < 1e-6);
        assert!((first[2] - 2.0 / 500.0).abs() < 1e-7);

        assert_eq!(point(p, 2)[1], -1.0);
        assert!((point(p, 3)[2] + 1.0 / 500.0).abs() < 1e-7);

        // Second tick
        assert!((point(p, 4)[0] - 0.005).abs() < 1e-9);
    }

    #[test]
    fn test_silent_frame_produces_zero_heights() {
        let mut s = stream();
        s.start(source(&[0, 0, 0, 0], &[0, 0, 0, 0]), 1, 1.0);
        s.tick();

        for i in 0..4 {
            assert_eq!(point(s.frequency_positions(), i)[2], 0.0);
            assert_eq!(point(s.waveform_positions(), i)[1], 0.0);
        }
        assert!(s.positions().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_colors_parallel_to_positions() {
        let mut s = stream();
        s.start(source(&[7; 5], &[9; 11]), 4, 1.0);
        while s.tick() == TickOutcome::Continue {}

        let positions = s.positions();
        let colors = s.colors();
        assert_eq!(positions.len() / 3, colors.len() / 4);
        assert!(colors.iter().all(|c| (0.0..=1.0).contains(c)));

        // Band colours come from their own densities
        let expected = color_at(2, 5, 2.0);
        assert_eq!(colors[4 * 2], expected[0] as f32);
        let expected = color_at(2, 11, 2.35);
        assert_eq!(colors[4 * (5 * 4 + 2) + 1], expected[1] as f32);
    }

    #[test]
    fn test_positions_concatenate_bands() {
        let mut s = stream();
        s.start(source(&[3; 2], &[5; 3]), 1, 1.0);
        s.tick();

        let all = s.positions();
        assert_eq!(&all[..6], s.frequency_positions());
        assert_eq!(&all[6..], s.waveform_positions());
    }

    #[test]
    fn test_restart_resets_accumulators_and_cursors() {
        let mut s = stream();
        s.start(source(&[1; 4], &[1; 4]), 5, 1.0);
        s.tick();
        s.tick();

        s.start(source(&[2; 4], &[2; 4]), 5, 1.0);
        assert_eq!(s.point_count(), 0);
        assert_eq!(s.ticks_elapsed(), Some(0));

        s.tick();
        assert_eq!(point(s.frequency_positions(), 0)[0], 0.0);
    }

    #[test]
    fn test_stop_ends_session_and_keeps_geometry() {
        let mut s = stream();
        s.start(source(&[1; 4], &[1; 4]), 10, 1.0);
        s.tick();
        s.stop();
        assert!(!s.is_running());
        assert_eq!(s.tick(), TickOutcome::Idle);
        assert_eq!(s.point_count(), 8);
    }

    #[test]
    fn test_retention_cap_drops_oldest_ticks() {
        let params = GeometryParams {
            retained_ticks: Some(2),
            ..Default::default()
        };
        let mut s = AudioGeometryStream::new(params, OrbitCameraParams::default());
        s.start(source(&[1; 4], &[1; 6]), 5, 1.0);
        for _ in 0..5 {
            s.tick();
        }

        assert_eq!(s.frequency_positions().len(), 3 * 2 * 4);
        assert_eq!(s.waveform_positions().len(), 3 * 2 * 6);
        assert_eq!(s.colors().len(), 4 * 2 * (4 + 6));

        // Oldest retained tick is the fourth (cursor 0.015)
        assert!((point(s.frequency_positions(), 0)[0] - 0.015).abs() < 1e-6);
    }

    /// Records what the stream submits
    #[derive(Default)]
    struct CapturingRenderer {
        positions: Vec<f32>,
        colors: Vec<f32>,
        view: Option<Mat4>,
        draws: usize,
    }

    impl SceneRenderer for CapturingRenderer {
        fn draw(&mut self, positions: &[f32], colors: &[f32], view: Mat4, _projection: Mat4) {
            self.positions = positions.to_vec();
            self.colors = colors.to_vec();
            self.view = Some(view);
            self.draws += 1;
        }
    }

    #[test]
    fn test_draw_submits_full_history() {
        let mut s = stream();
        let mut renderer = CapturingRenderer::default();
        s.start(source(&[4; 3], &[4; 3]), 3, 1.0);

        s.tick();
        s.draw(&mut renderer, 1.5);
        assert_eq!(renderer.positions.len(), 3 * 6);

        s.tick();
        s.draw(&mut renderer, 1.5);
        assert_eq!(renderer.positions.len(), 3 * 12);
        assert_eq!(renderer.colors.len(), 4 * 12);
        assert_eq!(renderer.draws, 2);
        assert_eq!(renderer.view, Some(s.camera().view_matrix()));
    }

    #[test]
    fn test_camera_delegation() {
        let mut s = stream();
        let before = s.camera().angle_y();
        s.rotate_camera(100.0, 0.0);
        assert!((s.camera().angle_y() - before - 1.0).abs() < 1e-6);
        s.reset_camera();
        assert_eq!(s.camera().angle_y(), before);
    }
}
