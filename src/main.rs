//! soundviz - play instrument tones and watch their spectrum and waveform
//! pile up into a rotatable 3-D point cloud.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use std::path::{Path, PathBuf};

use soundviz::audio::{piano_key_frequency, FileSource, Instrument, InstrumentKind, SoundEngine};
use soundviz::camera::DragTracker;
use soundviz::chart;
use soundviz::cli::Args;
use soundviz::config::{discover_config_path, load_config, Config};
use soundviz::geometry::AudioGeometryStream;
use soundviz::rendering::RenderSystem;

/// Letter row → (position in row, semitones above the base key): a major scale
fn note_for_key(code: KeyCode) -> Option<(u32, i32)> {
    const ROW: [(KeyCode, i32); 9] = [
        (KeyCode::KeyA, 0),
        (KeyCode::KeyS, 2),
        (KeyCode::KeyD, 4),
        (KeyCode::KeyF, 5),
        (KeyCode::KeyG, 7),
        (KeyCode::KeyH, 9),
        (KeyCode::KeyJ, 11),
        (KeyCode::KeyK, 12),
        (KeyCode::KeyL, 14),
    ];
    ROW.iter()
        .position(|(key, _)| *key == code)
        .map(|i| (i as u32, ROW[i].1))
}

/// Digits 1-6 pick an instrument
fn instrument_for_key(code: KeyCode) -> Option<InstrumentKind> {
    let index = match code {
        KeyCode::Digit1 => 0,
        KeyCode::Digit2 => 1,
        KeyCode::Digit3 => 2,
        KeyCode::Digit4 => 3,
        KeyCode::Digit5 => 4,
        KeyCode::Digit6 => 5,
        _ => return None,
    };
    InstrumentKind::ALL.get(index).copied()
}

/// Main application state
struct App {
    config: Config,

    // Window and rendering
    window: Option<Arc<Window>>,
    render_system: Option<RenderSystem>,

    // Audio and visualization
    engine: Option<SoundEngine>,
    instrument: Instrument,
    stream: AudioGeometryStream,
    /// Sample rate behind the stream's frames, for chart tick labels
    frames_sample_rate_hz: Option<u32>,
    charts_written: usize,

    // Pointer
    drag: DragTracker,
    cursor: (f64, f64),

    /// Piano key to play once everything is up
    startup_key: Option<i32>,
    /// Audio file to analyse once everything is up
    startup_file: Option<PathBuf>,
}

impl App {
    fn new(
        config: Config,
        instrument: Instrument,
        startup_key: Option<i32>,
        startup_file: Option<PathBuf>,
    ) -> Self {
        let stream = AudioGeometryStream::new(config.geometry.clone(), config.camera.clone());
        Self {
            config,
            window: None,
            render_system: None,
            engine: None,
            instrument,
            stream,
            frames_sample_rate_hz: None,
            charts_written: 0,
            drag: DragTracker::default(),
            cursor: (0.0, 0.0),
            startup_key,
            startup_file,
        }
    }

    fn request_redraw(&self) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    /// Play a note and start a visualization session on its last voice
    fn play_key(&mut self, key: i32, index: u32) {
        let Some(engine) = self.engine.as_mut() else {
            log::warn!("No audio device, ignoring note");
            return;
        };

        let frequency_hz = piano_key_frequency(key);
        let sound = self.instrument.note(frequency_hz, index);
        let handles = engine.play(&sound);
        log::info!(
            "Playing {} key {} ({:.2} Hz)",
            self.instrument.kind().name(),
            key,
            frequency_hz
        );

        if let Some(handle) = handles.last() {
            let analyser = handle.analyser(self.config.analyser.clone());
            self.stream.start(
                Box::new(analyser),
                self.config.geometry.tick_budget,
                handle.pan as f64,
            );
            self.frames_sample_rate_hz = Some(engine.sample_rate_hz());
        }
        self.request_redraw();
    }

    /// Start a visualization session stepping through an audio file
    fn analyse_file(&mut self, path: &Path) {
        match FileSource::open(path, self.config.analyser.clone()) {
            Ok(source) => {
                self.frames_sample_rate_hz = Some(source.sample_rate_hz());
                self.stream
                    .start(Box::new(source), self.config.geometry.tick_budget, 1.0);
                self.request_redraw();
            }
            Err(e) => log::error!("Failed to analyse {}: {}", path.display(), e),
        }
    }

    fn select_instrument(&mut self, kind: InstrumentKind) {
        match Instrument::new(kind, self.config.synth.harmonic_depth) {
            Ok(instrument) => {
                log::info!("Instrument: {}", kind.name());
                self.instrument = instrument;
            }
            Err(e) => log::error!("Failed to build {} wavetable: {}", kind.name(), e),
        }
    }

    fn toggle_pause(&self) {
        if let Some(engine) = &self.engine {
            if engine.is_paused() {
                engine.resume();
            } else {
                engine.pause();
            }
        }
    }

    fn stop_all(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            if let Err(e) = engine.stop() {
                log::error!("Failed to stop audio cleanly: {}", e);
            }
        }
        self.stream.stop();
    }

    fn toggle_recording(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        match engine.toggle_recording() {
            Ok(true) => {}
            Ok(false) => log::info!("Takes hold {} sound(s)", engine.recorded_sounds().len()),
            Err(e) => log::error!("Recording toggle failed: {}", e),
        }
    }

    /// Write spectrum and waveform charts of the newest frames
    fn write_charts(&mut self) {
        let Some(sample_rate_hz) = self.frames_sample_rate_hz else {
            log::warn!("Nothing to chart yet");
            return;
        };
        if self.stream.frequency_frame().is_empty() {
            log::warn!("Nothing to chart yet");
            return;
        }

        self.charts_written += 1;
        if let Err(e) = chart::save_snapshot(
            self.stream.frequency_frame(),
            self.stream.waveform_frame(),
            &self.config.chart,
            &self.config.analyser,
            sample_rate_hz,
            self.charts_written,
        ) {
            log::warn!("Chart snapshot failed: {}", e);
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode) {
        if let Some((index, offset)) = note_for_key(code) {
            self.play_key(self.config.synth.base_key + offset, index);
            return;
        }
        if let Some(kind) = instrument_for_key(code) {
            self.select_instrument(kind);
            return;
        }
        match code {
            KeyCode::Escape => event_loop.exit(),
            KeyCode::Space => self.toggle_pause(),
            KeyCode::Backspace => self.stop_all(),
            KeyCode::KeyR => {
                self.stream.reset_camera();
                self.request_redraw();
            }
            KeyCode::F1 => self.toggle_recording(),
            KeyCode::KeyP => self.write_charts(),
            _ => {}
        }
    }

    /// Advance the session by one tick and draw
    fn render_frame(&mut self) {
        self.stream.tick();

        let Some(render_system) = self.render_system.as_mut() else {
            return;
        };
        let aspect = render_system.aspect_ratio();
        self.stream.draw(render_system, aspect);
    }
}

impl ApplicationHandler for App {
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.stream.is_running() {
            self.request_redraw();
        }
    }

    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }

        let window_attributes = Window::default_attributes()
            .with_title("soundviz")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.render.window_width,
                self.config.render.window_height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(RenderSystem::new(Arc::clone(&window), &self.config.render)) {
            Ok(render_system) => self.render_system = Some(render_system),
            Err(e) => {
                log::error!("Failed to initialize rendering: {}", e);
                event_loop.exit();
                return;
            }
        }

        match SoundEngine::new(
            &self.config.synth,
            &self.config.analyser,
            self.config.recording.clone(),
        ) {
            Ok(engine) => self.engine = Some(engine),
            Err(e) => log::warn!("Audio unavailable, running silent: {}", e),
        }

        log::info!("soundviz is running");
        log::info!("A-L play notes, 1-6 instruments, space pause, backspace stop");
        log::info!("Drag to orbit, R reset camera, F1 record, P charts, ESC quit");

        self.window = Some(window);

        if let Some(key) = self.startup_key.take() {
            self.play_key(key, 0);
        }
        if let Some(path) = self.startup_file.take() {
            self.analyse_file(&path);
        }
        self.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(render_system) = self.render_system.as_mut() {
                    render_system.resize(size.width, size.height);
                }
                self.request_redraw();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(code),
                        repeat: false,
                        ..
                    },
                ..
            } => self.handle_key(event_loop, code),
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => self.drag.press(self.cursor.0, self.cursor.1),
                ElementState::Released => {
                    if self.drag.is_dragging() {
                        let camera = self.stream.camera();
                        log::debug!(
                            "Camera at ({:.2}, {:.2})",
                            camera.angle_x(),
                            camera.angle_y()
                        );
                    }
                    self.drag.release();
                }
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x, position.y);
                if let Some((dx, dy)) = self.drag.move_to(position.x, position.y) {
                    self.stream.rotate_camera(dx, dy);
                    self.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => self.render_frame(),
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    // Explicit --config must load; an auto-discovered file only warns
    let mut config = match discover_config_path(args.config.as_deref()) {
        Some(path) => match load_config(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) if args.config.is_none() => {
                log::warn!("{}, using defaults", e);
                Config::default()
            }
            Err(e) => return Err(e).context("Failed to load configuration"),
        },
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let instrument = Instrument::new(args.parse_instrument(), config.synth.harmonic_depth)
        .context("Failed to build instrument wavetable")?;

    let mut app = App::new(config, instrument, args.play, args.file.clone());
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.run_app(&mut app).context("Event loop failed")?;
    Ok(())
}
