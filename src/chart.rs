//! 2-D spectrum bar charts and waveform line charts rasterized to RGBA images.
//!
//! Tick labels (Hz and % on the spectrum, seconds and amplitude on the
//! waveform) need a font file; without `font_path` only the tick marks are
//! drawn.

use fontdue::{Font, FontSettings};
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::params::{AnalyserConfig, ChartConfig};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const AXIS: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Tick marks along the horizontal axis
const X_TICKS: u32 = 10;

/// Tick marks along the vertical axis
const Y_TICKS: u32 = 5;

/// Tick length (pixels)
const TICK_LENGTH: i64 = 5;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("failed to create chart directory {path}: {source}")]
    Dir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write chart image: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to read label font {path}: {source}")]
    FontFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid label font: {0}")]
    Font(&'static str),
}

/// Label text for every tick, left to right and bottom to top
#[derive(Debug, Clone, PartialEq)]
pub struct TickLabels {
    pub x: Vec<String>,
    pub y: Vec<String>,
}

/// Spectrum ticks: 0 Hz to Nyquist along X, 0-100 % along Y
pub fn frequency_tick_labels(analyser: &AnalyserConfig, sample_rate_hz: u32) -> TickLabels {
    let nyquist = analyser.bin_to_hz(analyser.frequency_bin_count(), sample_rate_hz);
    TickLabels {
        x: (0..=X_TICKS)
            .map(|i| format!("{}Hz", (nyquist * i as f32 / X_TICKS as f32).round()))
            .collect(),
        y: (0..=Y_TICKS).map(|i| format!("{}%", i * 100 / Y_TICKS)).collect(),
    }
}

/// Waveform ticks: seconds across the analysis window, -1..1 amplitude
pub fn waveform_tick_labels(analyser: &AnalyserConfig, sample_rate_hz: u32) -> TickLabels {
    let window_secs = analyser.fft_size as f64 / sample_rate_hz.max(1) as f64;
    TickLabels {
        x: (0..=X_TICKS)
            .map(|i| format!("{:.3}s", window_secs * i as f64 / X_TICKS as f64))
            .collect(),
        y: (0..=Y_TICKS)
            .map(|i| format!("{:.1}", -1.0 + 2.0 * i as f64 / Y_TICKS as f64))
            .collect(),
    }
}

/// Rasterizer for tick labels
pub struct LabelFont {
    font: Font,
    size: f32,
}

impl LabelFont {
    pub fn from_bytes(bytes: &[u8], size: f32) -> Result<Self, ChartError> {
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(ChartError::Font)?;
        Ok(Self { font, size })
    }

    pub fn load(path: &Path, size: f32) -> Result<Self, ChartError> {
        let bytes = std::fs::read(path).map_err(|source| ChartError::FontFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes, size)
    }

    fn measure(&self, text: &str) -> f64 {
        text.chars()
            .map(|ch| self.font.metrics(ch, self.size).advance_width as f64)
            .sum()
    }

    /// Alpha-blend `text` with its top-left corner at (x, y)
    fn draw(&self, img: &mut RgbaImage, text: &str, x: f64, y: f64, color: Rgba<u8>) {
        let mut cursor_x = x.round() as i64;
        let baseline = y.round() as i64 + self.size.round() as i64;
        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.size);
            let glyph_top = baseline - metrics.height as i64 - metrics.ymin as i64;

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let coverage = bitmap[gy * metrics.width + gx];
                    if coverage > 0 {
                        blend(
                            img,
                            cursor_x + metrics.xmin as i64 + gx as i64,
                            glyph_top + gy as i64,
                            color,
                            coverage,
                        );
                    }
                }
            }
            cursor_x += metrics.advance_width.round() as i64;
        }
    }
}

/// Plot area inside the padding
struct Plot {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl Plot {
    fn new(config: &ChartConfig) -> Self {
        let pad = config.padding as f64;
        Self {
            left: pad,
            top: pad,
            width: (config.width as f64 - 2.0 * pad).max(0.0),
            height: (config.height as f64 - 2.0 * pad).max(0.0),
        }
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

fn blank(config: &ChartConfig) -> RgbaImage {
    RgbaImage::from_pixel(config.width.max(1), config.height.max(1), BACKGROUND)
}

/// Magnitude-by-bin bars growing up from the bottom axis
pub fn draw_frequency_chart(frame: &[u8], config: &ChartConfig) -> RgbaImage {
    let mut img = blank(config);
    let plot = Plot::new(config);
    let theme = Rgba(config.theme);

    if !frame.is_empty() {
        let bar_width = plot.width / frame.len() as f64;
        for (i, &value) in frame.iter().enumerate() {
            let bar_height = value as f64 / 255.0 * plot.height;
            let x = plot.left + i as f64 * bar_width;
            fill_rect(
                &mut img,
                x,
                plot.bottom() - bar_height,
                x + bar_width,
                plot.bottom(),
                theme,
            );
        }
    }

    draw_axes(&mut img, &plot);
    img
}

/// Amplitude-by-sample polyline (128 = centre line)
pub fn draw_waveform_chart(frame: &[u8], config: &ChartConfig) -> RgbaImage {
    let mut img = blank(config);
    let plot = Plot::new(config);
    let theme = Rgba(config.theme);

    if !frame.is_empty() {
        let segment_width = plot.width / frame.len() as f64;
        let points: Vec<(f64, f64)> = frame
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                (
                    plot.left + i as f64 * segment_width,
                    value as f64 / 255.0 * plot.height + plot.top,
                )
            })
            .collect();

        if let [only] = points.as_slice() {
            draw_line(&mut img, *only, *only, theme);
        }
        for pair in points.windows(2) {
            draw_line(&mut img, pair[0], pair[1], theme);
        }
    }

    draw_axes(&mut img, &plot);
    img
}

/// Write under each X tick and beside each Y tick
pub fn label_axes(img: &mut RgbaImage, config: &ChartConfig, labels: &TickLabels, font: &LabelFont) {
    let plot = Plot::new(config);
    let bottom = plot.bottom();

    let x_count = labels.x.len().saturating_sub(1).max(1) as f64;
    for (i, text) in labels.x.iter().enumerate() {
        let x = plot.left + i as f64 / x_count * plot.width;
        let top = bottom + TICK_LENGTH as f64 + 1.0;
        font.draw(img, text, x - font.measure(text) / 2.0, top, AXIS);
    }

    let y_count = labels.y.len().saturating_sub(1).max(1) as f64;
    for (i, text) in labels.y.iter().enumerate() {
        let y = bottom - i as f64 / y_count * plot.height;
        font.draw(img, text, 0.0, y - font.size as f64 / 2.0, AXIS);
    }
}

/// Write spectrum and waveform PNGs for one snapshot into the chart directory.
///
/// Labels are drawn when `config.font_path` loads; a broken font only costs
/// the labels.
pub fn save_snapshot(
    frequency: &[u8],
    waveform: &[u8],
    config: &ChartConfig,
    analyser: &AnalyserConfig,
    sample_rate_hz: u32,
    index: usize,
) -> Result<(PathBuf, PathBuf), ChartError> {
    let dir = &config.output_dir;
    std::fs::create_dir_all(dir).map_err(|source| ChartError::Dir {
        path: dir.clone(),
        source,
    })?;

    let font = config.font_path.as_deref().and_then(|path| {
        LabelFont::load(path, config.label_size)
            .map_err(|e| log::warn!("{}, charts drawn without labels", e))
            .ok()
    });

    let mut spectrum = draw_frequency_chart(frequency, config);
    let mut wave = draw_waveform_chart(waveform, config);
    if let Some(font) = &font {
        let spectrum_labels = frequency_tick_labels(analyser, sample_rate_hz);
        label_axes(&mut spectrum, config, &spectrum_labels, font);
        let wave_labels = waveform_tick_labels(analyser, sample_rate_hz);
        label_axes(&mut wave, config, &wave_labels, font);
    }

    let spectrum_path = chart_path(dir, index, "spectrum");
    let waveform_path = chart_path(dir, index, "waveform");
    spectrum.save(&spectrum_path)?;
    wave.save(&waveform_path)?;

    log::info!("Charts written to {}", dir.display());
    Ok((spectrum_path, waveform_path))
}

fn chart_path(dir: &Path, index: usize, kind: &str) -> PathBuf {
    dir.join(format!("snapshot_{:02}_{}.png", index, kind))
}

/// Bottom and left axes with outward tick marks
fn draw_axes(img: &mut RgbaImage, plot: &Plot) {
    let bottom = plot.bottom();
    let right = plot.left + plot.width;

    draw_line(img, (plot.left, bottom), (right, bottom), AXIS);
    draw_line(img, (plot.left, bottom), (plot.left, plot.top), AXIS);

    for i in 0..=X_TICKS {
        let x = plot.left + i as f64 / X_TICKS as f64 * plot.width;
        draw_line(img, (x, bottom), (x, bottom + TICK_LENGTH as f64), AXIS);
    }
    for i in 0..=Y_TICKS {
        let y = bottom - i as f64 / Y_TICKS as f64 * plot.height;
        draw_line(img, (plot.left, y), (plot.left - TICK_LENGTH as f64, y), AXIS);
    }
}

fn put(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Mix `color` over the pixel by `coverage` (0-255)
fn blend(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, coverage: u8) {
    if x < 0 || y < 0 || x as u32 >= img.width() || y as u32 >= img.height() {
        return;
    }
    let a = coverage as f32 / 255.0 * (color[3] as f32 / 255.0);
    let pixel = img.get_pixel_mut(x as u32, y as u32);
    for c in 0..3 {
        pixel[c] = (color[c] as f32 * a + pixel[c] as f32 * (1.0 - a)).round() as u8;
    }
    pixel[3] = 255;
}

/// Fill pixels whose centres fall in [x0, x1) × [y0, y1)
fn fill_rect(img: &mut RgbaImage, x0: f64, y0: f64, x1: f64, y1: f64, color: Rgba<u8>) {
    let (xs, xe) = (x0.round() as i64, x1.round() as i64);
    let (ys, ye) = (y0.round() as i64, y1.round() as i64);
    for y in ys..ye {
        for x in xs..xe {
            put(img, x, y, color);
        }
    }
}

/// One-pixel line between two points (DDA)
fn draw_line(img: &mut RgbaImage, from: (f64, f64), to: (f64, f64), color: Rgba<u8>) {
    let (x0, y0) = (from.0.round(), from.1.round());
    let (x1, y1) = (to.0.round(), to.1.round());
    let steps = (x1 - x0).abs().max((y1 - y0).abs()) as i64;

    if steps == 0 {
        put(img, x0 as i64, y0 as i64, color);
        return;
    }
    for s in 0..=steps {
        let t = s as f64 / steps as f64;
        let x = x0 + (x1 - x0) * t;
        let y = y0 + (y1 - y0) * t;
        put(img, x.round() as i64, y.round() as i64, color);
    }
}
