//! Voice rendering: wavetable oscillators, ADSR envelopes, stereo panning and
//! the band-pass master bus.
//!
//! Everything here runs inside the audio callback, so blocks are rendered into
//! preallocated scratch buffers and each voice tap is locked once per block.

use std::f32::consts::FRAC_PI_2;
use std::sync::PoisonError;

use super::analyser::SharedTap;
use super::periodic_wave::PeriodicWave;
use crate::params::SynthConfig;

/// Level the envelope starts from and releases to (exponential-ramp safe floor)
const ENVELOPE_FLOOR: f64 = 0.001;

/// Attack / decay / sustain / release durations in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adsr {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Adsr {
    pub const fn new(attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
    }

    /// Total voice lifetime
    pub fn duration(&self) -> f64 {
        self.attack + self.decay + self.sustain + self.release
    }

    /// Gain at `t` seconds after note start.
    ///
    /// Linear ramps: floor → `peak` over the attack, `peak` → `sustain_level`
    /// over the decay, hold for the sustain, then → floor over the release.
    pub fn gain_at(&self, t: f64, peak: f64, sustain_level: f64) -> f64 {
        let ramp = |from: f64, to: f64, elapsed: f64, length: f64| {
            from + (to - from) * (elapsed / length)
        };

        if t < 0.0 {
            return ENVELOPE_FLOOR;
        }
        let mut t = t;
        if t < self.attack {
            return ramp(ENVELOPE_FLOOR, peak, t, self.attack);
        }
        t -= self.attack;
        if t < self.decay {
            return ramp(peak, sustain_level, t, self.decay);
        }
        t -= self.decay;
        if t < self.sustain {
            return sustain_level;
        }
        t -= self.sustain;
        if t < self.release {
            return ramp(sustain_level, ENVELOPE_FLOOR, t, self.release);
        }
        ENVELOPE_FLOOR
    }
}

/// Equal-power stereo gains for `pan` in [-1, 1]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let x = (pan.clamp(-1.0, 1.0) + 1.0) / 2.0;
    ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin())
}

/// RBJ band-pass biquad (constant 0 dB peak gain), direct form I
#[derive(Debug, Clone)]
pub struct BandPass {
    b0: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BandPass {
    pub fn new(center_hz: f32, q: f32, sample_rate_hz: f32) -> Self {
        let w0 = 2.0 * std::f32::consts::PI * center_hz / sample_rate_hz;
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;

        Self {
            b0: alpha / a0,
            b2: -alpha / a0,
            a1: -2.0 * w0.cos() / a0,
            a2: (1.0 - alpha) / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// One sounding partial: oscillator → envelope gain → tap + panner
pub struct Voice {
    wave: PeriodicWave,
    frequency_hz: f64,
    amplitude: f64,
    envelope: Adsr,
    pan: f32,
    phase: f64,
    elapsed_s: f64,
    tap: SharedTap,
}

impl Voice {
    pub fn new(
        wave: PeriodicWave,
        frequency_hz: f64,
        amplitude: f64,
        envelope: Adsr,
        pan: f32,
        tap: SharedTap,
    ) -> Self {
        Self {
            wave,
            frequency_hz,
            amplitude,
            envelope,
            pan,
            phase: 0.0,
            elapsed_s: 0.0,
            tap,
        }
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_s >= self.envelope.duration()
    }

    /// Render `out.len()` mono samples (silence once the envelope has ended)
    /// and publish them to the voice tap.
    pub fn render(&mut self, out: &mut [f32], sample_rate_hz: f64) {
        let dt = 1.0 / sample_rate_hz;
        let increment = self.frequency_hz * dt;

        for slot in out.iter_mut() {
            *slot = if self.is_finished() {
                0.0
            } else {
                let gain = self.amplitude * self.envelope.gain_at(self.elapsed_s, 1.0, 1.0);
                self.wave.sample(self.phase) * gain as f32
            };
            self.phase = (self.phase + increment).fract();
            self.elapsed_s += dt;
        }

        let mut tap = self.tap.lock().unwrap_or_else(PoisonError::into_inner);
        tap.push_slice(out);
    }
}

/// Voice mixer feeding the interleaved device buffer
pub struct Mixer {
    voices: Vec<Voice>,
    band_pass: BandPass,
    master_gain: f32,
    output_limit: f32,
    sample_rate_hz: f64,
    paused: bool,
    voice_block: Vec<f32>,
    bus: Vec<f32>,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Mixer {
    pub fn new(config: &SynthConfig, sample_rate_hz: u32) -> Self {
        Self {
            voices: Vec::new(),
            band_pass: BandPass::new(
                config.band_pass_center_hz,
                config.band_pass_q,
                sample_rate_hz as f32,
            ),
            master_gain: config.master_gain,
            output_limit: config.output_limit,
            sample_rate_hz: sample_rate_hz as f64,
            paused: false,
            voice_block: Vec::new(),
            bus: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    pub fn add_voice(&mut self, voice: Voice) {
        self.voices.push(voice);
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Drop every voice, clear filter memory and leave the mixer running
    pub fn stop_all(&mut self) {
        self.voices.clear();
        self.band_pass.reset();
        self.paused = false;
    }

    /// Fill an interleaved buffer with `channels` channels.
    ///
    /// Channel 0 is left and channel 1 right; extra channels stay silent and a
    /// mono device gets the average of both sides.
    pub fn render(&mut self, data: &mut [f32], channels: usize) {
        data.fill(0.0);
        if self.paused || channels == 0 {
            return;
        }

        let frames = data.len() / channels;
        self.bus.clear();
        self.bus.resize(frames, 0.0);
        self.left.clear();
        self.left.resize(frames, 0.0);
        self.right.clear();
        self.right.resize(frames, 0.0);
        self.voice_block.resize(frames, 0.0);

        for voice in &mut self.voices {
            voice.render(&mut self.voice_block, self.sample_rate_hz);
            let (gain_l, gain_r) = pan_gains(voice.pan());
            for (i, &s) in self.voice_block.iter().enumerate() {
                self.bus[i] += s;
                self.left[i] += s * gain_l;
                self.right[i] += s * gain_r;
            }
        }
        self.voices.retain(|voice| !voice.is_finished());

        let limit = self.output_limit;
        for (i, frame) in data.chunks_exact_mut(channels).enumerate() {
            let filtered = self.band_pass.process(self.bus[i]) * self.master_gain;
            // Safety limiter: hard clip to protect ears
            let left = (self.left[i] + filtered).clamp(-limit, limit);
            let right = (self.right[i] + filtered).clamp(-limit, limit);

            if channels == 1 {
                frame[0] = 0.5 * (left + right);
            } else {
                frame[0] = left;
                frame[1] = right;
            }
        }
    }
}
