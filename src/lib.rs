//! soundviz library - instrument synth with an audio-driven 3-D point cloud

pub mod audio;
pub mod camera;
pub mod chart;
pub mod cli;
pub mod config;
pub mod geometry;
pub mod params;
pub mod rendering;
