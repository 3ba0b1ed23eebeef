//! Scenes that implement the [`EventSource`](crate::graph::EventSource) trait.
//!
//! A scene sequences a handful of voices on a fixed step grid measured in
//! source clocks. Note choices come from a seeded `StdRng`, so a given seed
//! always plays the same tune regardless of how the host splits frames.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use blipstep_core::{BufferOverflowError, Resampler};

use crate::graph::EventSource;
use crate::nodes::{half_period, NoiseVoice, Pan, SquareVoice};

/// Minor pentatonic, in semitones above the root.
const PENTATONIC: [i32; 6] = [0, 3, 5, 7, 10, 12];
/// Bass roots cycled every bar (i, iv, v, iv).
const BASS_ROOTS: [i32; 4] = [0, 5, 7, 5];
const STEPS_PER_BAR: u32 = 8;

const LEAD_ROOT_HZ: f64 = 440.0;
const BASS_ROOT_HZ: f64 = 110.0;
const LEAD_VOLUME: f32 = 2600.0;
const BASS_VOLUME: f32 = 3400.0;
const HAT_VOLUME: f32 = 900.0;

#[inline]
fn transpose(root: f64, semitones: i32) -> f64 {
    root * (f64::from(semitones) / 12.0).exp2()
}

/// Chip-style arpeggio: square lead, square bass and a noise hat.
#[derive(Clone, Debug)]
pub struct Scene {
    // voices
    lead: SquareVoice,
    bass: SquareVoice,
    hat: NoiseVoice,
    // sequencing
    rng: StdRng,
    seed: u64,
    clock_rate: f64,
    step_clocks: u32,
    until_step: u32, // clocks left before the next step fires
    step: u32,
    // parameters
    tempo_hz: f64, // steps per second
    gain: f32,
}

impl Scene {
    /// Eighth notes at 120 BPM.
    pub fn chiptune(seed: u64) -> Self {
        let mut s = Self {
            lead: SquareVoice::new(0, Pan::new(-0.35)),
            bass: SquareVoice::new(0, Pan::CENTER),
            hat: NoiseVoice::new(1, Pan::new(0.5)),
            rng: StdRng::seed_from_u64(seed),
            seed,
            clock_rate: 0.0,
            step_clocks: 1,
            until_step: 0,
            step: 0,
            tempo_hz: 4.0,
            gain: 1.0,
        };
        s.apply_gain();
        s
    }

    /// Look a scene up by its CLI name.
    pub fn by_name(name: &str, seed: u64) -> Option<Self> {
        match name {
            "chiptune" | "chip" => Some(Self::chiptune(seed)),
            _ => None,
        }
    }

    #[inline] pub fn step_clocks(&self) -> u32 { self.step_clocks }

    /// Output gain in [0..2]; takes effect on the next edge of each voice.
    pub fn set_gain(&mut self, g: f32) {
        self.gain = g.clamp(0.0, 2.0);
        self.apply_gain();
    }

    fn apply_gain(&mut self) {
        let gain = self.gain;
        let v = |base: f32| (base * gain).round() as i32;
        self.lead.set_volume(v(LEAD_VOLUME));
        self.bass.set_volume(v(BASS_VOLUME));
    }

    /// Advance the sequencer by one step at frame time `now`.
    fn advance(&mut self, now: u32, channels: &mut [Resampler]) -> Result<(), BufferOverflowError> {
        let beat = self.step % STEPS_PER_BAR;

        if beat == 0 {
            let bar = (self.step / STEPS_PER_BAR) as usize % BASS_ROOTS.len();
            let hz = transpose(BASS_ROOT_HZ, BASS_ROOTS[bar]);
            self.bass.set_period(half_period(hz, self.clock_rate), now, channels)?;
        }

        // The occasional rest keeps the line from droning.
        let lead = if beat != 0 && self.rng.gen_bool(0.15) {
            None
        } else {
            let semis = PENTATONIC[self.rng.gen_range(0..PENTATONIC.len())];
            half_period(transpose(LEAD_ROOT_HZ, semis), self.clock_rate)
        };
        self.lead.set_period(lead, now, channels)?;

        if beat % 2 == 1 || self.rng.gen_bool(0.25) {
            let volume = (HAT_VOLUME * self.gain).round() as i32;
            self.hat.trigger(now, volume, self.step_clocks / 4);
        }

        self.step = self.step.wrapping_add(1);
        Ok(())
    }
}

impl EventSource for Scene {
    fn reset(&mut self, clock_rate: f64) {
        self.clock_rate = clock_rate;
        self.step_clocks = (clock_rate / self.tempo_hz).round().clamp(1.0, f64::from(u32::MAX)) as u32;
        // ~16 kHz shift rate, the usual bright hat setting on chip noise channels.
        let hat_period = (clock_rate / 16_000.0).round().clamp(1.0, f64::from(u32::MAX)) as u32;
        self.hat = NoiseVoice::new(hat_period, Pan::new(0.5));

        self.lead.reset();
        self.bass.reset();
        self.rng = StdRng::seed_from_u64(self.seed);
        self.until_step = 0;
        self.step = 0;
        tracing::debug!(seed = self.seed, clock_rate, step_clocks = self.step_clocks, "scene reset");
    }

    fn run(&mut self, clocks: u32, channels: &mut [Resampler]) -> Result<(), BufferOverflowError> {
        let mut now = 0;
        while now < clocks {
            if self.until_step == 0 {
                self.advance(now, channels)?;
                self.until_step = self.step_clocks;
            }
            let end = clocks.min(now.saturating_add(self.until_step));
            self.lead.run_until(end, channels)?;
            self.bass.run_until(end, channels)?;
            self.hat.run_until(end, channels)?;
            self.until_step -= end - now;
            now = end;
        }

        self.lead.end_frame(clocks);
        self.bass.end_frame(clocks);
        self.hat.end_frame(clocks);
        Ok(())
    }
}
