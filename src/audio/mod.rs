//! Audio: spectral transform, analysers and the instrument synthesizer.
//!
//! Voices render in the cpal callback and publish their samples to per-voice
//! taps. Analysers read those taps on the UI thread and hand byte frames to
//! the geometry stream. A decoded audio file can stand in for a voice.

pub mod analyser;
pub mod fft;
pub mod file;
pub mod instrument;
pub mod periodic_wave;
pub mod synthesis;
pub mod system;

// Re-export public types
pub use analyser::{Analyser, FrameSource, SampleTap, SharedTap};
pub use fft::{inverse_transform, transform, transform_value, ComplexSample, TransformError};
pub use file::{decode_file, DecodedAudio, FileSource};
pub use instrument::{piano_key_frequency, Instrument, InstrumentKind, Partial, Sound};
pub use periodic_wave::PeriodicWave;
pub use synthesis::Adsr;
pub use system::{AudioError, SoundEngine, VoiceHandle};
