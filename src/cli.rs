//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;

use crate::audio::InstrumentKind;
use crate::config::Config;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "soundviz")]
#[command(about = "Instrument synth with a 3-D spectrum and waveform point cloud", long_about = None)]
pub struct Args {
    /// Configuration file (defaults to ./soundviz.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Ticks each visualization session runs for
    #[arg(long, value_name = "TICKS")]
    pub tick_budget: Option<usize>,

    /// Keep only the newest N ticks of points
    #[arg(long, value_name = "TICKS")]
    pub retain_ticks: Option<usize>,

    /// Instrument: keys (default), drum, string, balafon, tabla, bansuri
    #[arg(long, value_name = "NAME", default_value = "keys")]
    pub instrument: String,

    /// Overtones and sub-octaves per note
    #[arg(long, value_name = "N")]
    pub harmonics: Option<u32>,

    /// Directory WAV takes are written to
    #[arg(long, value_name = "DIR")]
    pub record_dir: Option<PathBuf>,

    /// Play this piano key (49 = A4) as soon as the window opens
    #[arg(long, value_name = "KEY")]
    pub play: Option<i32>,

    /// Visualize an audio file (wav, flac, mp3, ogg) instead of waiting for a note
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

impl Args {
    /// Parse instrument from command-line arguments
    pub fn parse_instrument(&self) -> InstrumentKind {
        match InstrumentKind::from_name(&self.instrument) {
            Some(kind) => {
                log::info!("Instrument: {}", kind.name());
                kind
            }
            None => {
                log::warn!("Unknown instrument '{}', using keys", self.instrument);
                InstrumentKind::Keys
            }
        }
    }

    /// Overlay explicit flags on top of the file configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(budget) = self.tick_budget {
            config.geometry.tick_budget = budget;
        }
        if let Some(retained) = self.retain_ticks {
            config.geometry.retained_ticks = Some(retained);
        }
        if let Some(depth) = self.harmonics {
            config.synth.harmonic_depth = depth;
        }
        if let Some(dir) = &self.record_dir {
            config.recording.output_dir = dir.clone();
        }
    }
}
