//! Instrument voicings and the expansion of a note into stereo partials.
//!
//! A note becomes: sub-octaves (only while audible), the fundamental, and
//! decaying overtones. Every partial is then duplicated hard left and hard
//! right so each side gets its own analyser tap.

use super::fft::TransformError;
use super::periodic_wave::PeriodicWave;
use super::synthesis::Adsr;

/// Sub-octaves below this frequency are skipped
const MIN_AUDIBLE_HZ: f64 = 20.0;

/// Amplitude ratio between consecutive overtones
const OVERTONE_DECAY: f64 = 0.8;

const KEYS_REAL: &[f64] = &[0.0, 1.0, 0.4, 0.2, 0.1];
const KEYS_IMAG: &[f64] = &[0.0, 0.5, 0.5, 0.5, 0.0];
const STRING_REAL: &[f64] = &[0.0, 1.0, 0.9, 0.8, 0.7, 0.5, 0.4, 0.3];
const FUNDAMENTAL_REAL: &[f64] = &[0.0, 1.0, 0.0];
const SILENT_IMAG: &[f64] = &[];

/// Pans every partial is rendered at
pub const STEREO_PANS: [f32; 2] = [-1.0, 1.0];

/// Built-in instrument families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Keys,
    Drum,
    String,
    Balafon,
    Tabla,
    Bansuri,
}

impl InstrumentKind {
    pub const ALL: [InstrumentKind; 6] = [
        InstrumentKind::Keys,
        InstrumentKind::Drum,
        InstrumentKind::String,
        InstrumentKind::Balafon,
        InstrumentKind::Tabla,
        InstrumentKind::Bansuri,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InstrumentKind::Keys => "keys",
            InstrumentKind::Drum => "drum",
            InstrumentKind::String => "string",
            InstrumentKind::Balafon => "balafon",
            InstrumentKind::Tabla => "tabla",
            InstrumentKind::Bansuri => "bansuri",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Harmonic coefficients and base envelope
    fn voicing(self) -> (&'static [f64], &'static [f64], Adsr) {
        match self {
            InstrumentKind::Keys => (KEYS_REAL, KEYS_IMAG, Adsr::new(0.1, 0.0, 0.9, 0.0)),
            // Drum and string attacks are raw values reshaped per partial
            InstrumentKind::Drum => (FUNDAMENTAL_REAL, SILENT_IMAG, Adsr::new(1100.0, 0.1, 0.1, 0.0)),
            InstrumentKind::String => (STRING_REAL, SILENT_IMAG, Adsr::new(1100.0, 0.2, 0.5, 0.1)),
            InstrumentKind::Balafon | InstrumentKind::Tabla | InstrumentKind::Bansuri => {
                (FUNDAMENTAL_REAL, SILENT_IMAG, Adsr::new(0.1, 0.1, 0.2, 0.0))
            }
        }
    }

    /// Envelope for partial `n`, with the family's attack shaping applied
    fn shaped_envelope(self, base: Adsr, n: u32) -> Adsr {
        let attack = match self {
            InstrumentKind::Drum => (base.attack - curved_response(n)) / 10_000.0,
            InstrumentKind::String => (base.attack - curved_response(n)) / 1_000.0,
            _ => base.attack,
        };
        Adsr { attack, ..base }
    }
}

/// One oscillator to start: frequency, gain, envelope and stereo position
#[derive(Debug, Clone)]
pub struct Partial {
    pub frequency_hz: f64,
    pub amplitude: f64,
    pub envelope: Adsr,
    pub pan: f32,
    pub wave: PeriodicWave,
}

/// Everything started by a single note
#[derive(Debug, Clone, Default)]
pub struct Sound {
    pub partials: Vec<Partial>,
}

impl Sound {
    /// Seconds until the longest partial has released
    pub fn duration(&self) -> f64 {
        self.partials
            .iter()
            .map(|p| p.envelope.duration())
            .fold(0.0, f64::max)
    }
}

/// Instrument with a prebuilt wavetable
#[derive(Debug, Clone)]
pub struct Instrument {
    kind: InstrumentKind,
    wave: PeriodicWave,
    envelope: Adsr,
    harmonic_depth: u32,
}

impl Instrument {
    pub fn new(kind: InstrumentKind, harmonic_depth: u32) -> Result<Self, TransformError> {
        let (real, imag, envelope) = kind.voicing();
        Ok(Self {
            kind,
            wave: PeriodicWave::new(real, imag)?,
            envelope,
            harmonic_depth,
        })
    }

    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    /// Expand a note into stereo partials.
    ///
    /// `index` is the note's position within its instrument (it shapes the
    /// fundamental's attack for drums and strings).
    pub fn note(&self, frequency_hz: f64, index: u32) -> Sound {
        let mono = self.harmonics(frequency_hz, index);

        let partials = STEREO_PANS
            .iter()
            .flat_map(|&pan| {
                mono.iter().map(move |&(frequency_hz, amplitude, envelope)| Partial {
                    frequency_hz,
                    amplitude,
                    envelope,
                    pan,
                    wave: self.wave.clone(),
                })
            })
            .collect();

        Sound { partials }
    }

    /// `(frequency, amplitude, envelope)` for sub-octaves, fundamental and
    /// overtones, lowest first
    fn harmonics(&self, frequency_hz: f64, index: u32) -> Vec<(f64, f64, Adsr)> {
        let depth = self.harmonic_depth;
        let mut harmonics = Vec::with_capacity(2 * depth as usize + 1);

        for n in (1..=depth).rev() {
            let octave_hz = frequency_hz / 2f64.powi(n as i32);
            if octave_hz >= MIN_AUDIBLE_HZ {
                let envelope = self.kind.shaped_envelope(self.envelope, n);
                harmonics.push((octave_hz, 1.0 / n as f64, envelope));
            }
        }

        harmonics.push((
            frequency_hz,
            1.0,
            self.kind.shaped_envelope(self.envelope, index),
        ));

        for n in 1..=depth {
            let envelope = self.kind.shaped_envelope(self.envelope, n);
            harmonics.push((
                frequency_hz * (n + 1) as f64,
                OVERTONE_DECAY.powi(n as i32),
                envelope,
            ));
        }

        harmonics
    }
}

/// Equal-tempered piano key frequency (key 49 = A4 = 440 Hz)
pub fn piano_key_frequency(key: i32) -> f64 {
    440.0 * 2f64.powf((key - 49) as f64 / 12.0)
}

/// `round(exp(-n / (20 + n)) * 1000)`: 1000 at n = 0, falling slowly
fn curved_response(n: u32) -> f64 {
    let n = n as f64;
    ((-n / (20.0 + n)).exp() * 1000.0).round()
}
