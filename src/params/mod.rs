//! Parameter definitions with physical units and documented semantics.
//!
//! All magic numbers are extracted here with:
//! - Units (seconds, Hz, radians, pixels, world units)
//! - Documented ranges and meanings
//! - Serde defaults so a partial `soundviz.toml` fills in the rest

mod audio;
mod camera;
mod geometry;
mod render;

// Re-export all types
pub use audio::{AnalyserConfig, SynthConfig};
pub use camera::OrbitCameraParams;
pub use geometry::GeometryParams;
pub use render::{ChartConfig, RecordingConfig, RenderConfig};
