//! Building blocks (voices) for blipstep scenes.
//!
//! Voices model chip-style tone generators: they only know *when* their
//! output level flips and by how much, and hand those steps to the
//! resampler. Everything here is small and allocation-free.
//!
//! Contents:
//! - `Pan`         : integer per-channel gains (constant-power taper)
//! - `StepOutput`  : turns absolute levels into per-channel deltas
//! - `SquareVoice` : 50% duty square wave with a period in clocks
//! - `NoiseVoice`  : 15-bit LFSR noise with a gate length
//!
//! Times passed to voices are clocks since the start of the current frame.
//! After a frame, call `end_frame(clocks)` so the cursors carry over.

use blipstep_core::{BufferOverflowError, Resampler};
use num_traits::ToPrimitive;

/// Unity gain for `Pan`.
pub const PAN_UNITY: i32 = 256;

/// Left/right gains in 1/256 steps.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pan {
    gains: [i32; 2],
}

impl Pan {
    pub const CENTER: Pan = Pan { gains: [181, 181] };

    /// `pan` in [-1..1], where -1 = hard left, +1 = hard right.
    pub fn new(pan: f32) -> Self {
        // constant power using sine/cosine taper
        let p = (pan.clamp(-1.0, 1.0) + 1.0) * 0.25 * core::f32::consts::PI;
        let g = |x: f32| (x * PAN_UNITY as f32).round() as i32;
        Self { gains: [g(p.cos()), g(p.sin())] }
    }

    /// Gain for `channel` out of `count` channels. Mono ignores panning.
    #[inline]
    pub fn gain(&self, channel: usize, count: usize) -> i32 {
        if count == 1 { PAN_UNITY } else { self.gains[channel.min(1)] }
    }
}

/// Tracks the level last written to each channel and emits only changes.
#[derive(Copy, Clone, Debug)]
pub struct StepOutput {
    pan: Pan,
    last: [i32; 2],
}

impl StepOutput {
    #[inline] pub fn new(pan: Pan) -> Self { Self { pan, last: [0; 2] } }

    /// Forget written levels (the resamplers were cleared).
    #[inline] pub fn reset(&mut self) { self.last = [0; 2]; }

    /// Move the output to `amp` at `time`.
    pub fn set(&mut self, time: u32, amp: i32, channels: &mut [Resampler]) -> Result<(), BufferOverflowError> {
        let count = channels.len();
        for (c, blip) in channels.iter_mut().enumerate().take(2) {
            let level = amp * self.pan.gain(c, count) / PAN_UNITY;
            let delta = level - self.last[c];
            if delta != 0 {
                blip.add_delta(time, delta)?;
                self.last[c] = level;
            }
        }
        Ok(())
    }
}

/// Half-period in clocks for `hz` at `clock_rate`, or `None` when it is
/// out of range (the voice is then silenced).
pub fn half_period(hz: f64, clock_rate: f64) -> Option<u32> {
    if hz <= 0.0 {
        return None;
    }
    (clock_rate / (2.0 * hz)).round().to_u32().filter(|&p| p > 0)
}

/// Free-running square wave.
#[derive(Copy, Clone, Debug)]
pub struct SquareVoice {
    period: u32, // clocks per half cycle, 0 = silent
    volume: i32,
    high: bool,
    time: u32, // next edge
    out: StepOutput,
}

impl SquareVoice {
    #[inline]
    pub fn new(volume: i32, pan: Pan) -> Self {
        Self { period: 0, volume, high: false, time: 0, out: StepOutput::new(pan) }
    }

    /// Takes effect at the next edge.
    #[inline] pub fn set_volume(&mut self, v: i32) { self.volume = v; }

    pub fn reset(&mut self) {
        self.period = 0;
        self.high = false;
        self.time = 0;
        self.out.reset();
    }

    /// Change pitch at `now`. `None` silences the voice.
    pub fn set_period(&mut self, period: Option<u32>, now: u32, channels: &mut [Resampler]) -> Result<(), BufferOverflowError> {
        match period {
            Some(p) => {
                if self.period == 0 {
                    self.time = now;
                }
                self.period = p;
            }
            None => {
                self.period = 0;
                self.high = false;
                self.out.set(now, 0, channels)?;
            }
        }
        Ok(())
    }

    /// Emit edges before `end`.
    pub fn run_until(&mut self, end: u32, channels: &mut [Resampler]) -> Result<(), BufferOverflowError> {
        if self.period == 0 {
            return Ok(());
        }
        while self.time < end {
            self.high = !self.high;
            let amp = if self.high { self.volume } else { -self.volume };
            self.out.set(self.time, amp, channels)?;
            self.time = self.time.saturating_add(self.period);
        }
        Ok(())
    }

    #[inline]
    pub fn end_frame(&mut self, clocks: u32) {
        self.time = self.time.saturating_sub(clocks);
    }
}

/// Pseudo-random noise from a 15-bit LFSR, gated for a fixed length.
#[derive(Copy, Clone, Debug)]
pub struct NoiseVoice {
    period: u32, // clocks per shift
    volume: i32,
    lfsr: u16,
    time: u32,     // next shift
    gate_end: u32, // silence from here
    active: bool,
    out: StepOutput,
}

impl NoiseVoice {
    pub fn new(period: u32, pan: Pan) -> Self {
        Self {
            period: period.max(1),
            volume: 0,
            lfsr: 1,
            time: 0,
            gate_end: 0,
            active: false,
            out: StepOutput::new(pan),
        }
    }

    pub fn reset(&mut self) {
        self.lfsr = 1;
        self.time = 0;
        self.gate_end = 0;
        self.active = false;
        self.out.reset();
    }

    #[inline] pub fn is_active(&self) -> bool { self.active }

    /// Sound at `volume` from `now` for `length` clocks.
    pub fn trigger(&mut self, now: u32, volume: i32, length: u32) {
        self.volume = volume;
        self.time = now;
        self.gate_end = now.saturating_add(length);
        self.active = true;
    }

    #[inline]
    fn shift(&mut self) -> bool {
        let feedback = (self.lfsr ^ (self.lfsr >> 1)) & 1;
        self.lfsr = (self.lfsr >> 1) | (feedback << 14);
        self.lfsr & 1 == 0
    }

    pub fn run_until(&mut self, end: u32, channels: &mut [Resampler]) -> Result<(), BufferOverflowError> {
        if !self.active {
            return Ok(());
        }
        let stop = end.min(self.gate_end);
        while self.time < stop {
            let amp = if self.shift() { self.volume } else { -self.volume };
            self.out.set(self.time, amp, channels)?;
            self.time = self.time.saturating_add(self.period);
        }
        // A gate ending exactly on `end` closes at the start of the next span.
        if self.gate_end < end {
            self.out.set(self.gate_end, 0, channels)?;
            self.active = false;
        }
        Ok(())
    }

    #[inline]
    pub fn end_frame(&mut self, clocks: u32) {
        self.time = self.time.saturating_sub(clocks);
        self.gate_end = self.gate_end.saturating_sub(clocks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono() -> Vec<Resampler> {
        let mut b = Resampler::new(1024);
        b.set_rates(1_000_000.0, 50_000.0).unwrap();
        b.clear();
        vec![b]
    }

    #[test]
    fn pan_is_constant_power() {
        for p in [-1.0, -0.3, 0.0, 0.5, 1.0] {
            let pan = Pan::new(p);
            let power = pan.gain(0, 2).pow(2) + pan.gain(1, 2).pow(2);
            assert!((power - PAN_UNITY * PAN_UNITY).abs() < 2 * PAN_UNITY, "p={p} power={power}");
        }
        assert_eq!(Pan::new(-1.0).gain(1, 2), 0);
        assert_eq!(Pan::new(0.0), Pan::CENTER);
        assert_eq!(Pan::new(1.0).gain(0, 1), PAN_UNITY);
    }

    #[test]
    fn half_period_rejects_out_of_range() {
        assert_eq!(half_period(440.0, 1_000_000.0), Some(1136));
        assert_eq!(half_period(0.0, 1_000_000.0), None);
        assert_eq!(half_period(1e-9, 1e12), None);
        assert_eq!(half_period(f64::NAN, 1_000_000.0), None);
    }

    #[test]
    fn square_toggles_every_period() {
        let mut ch = mono();
        let mut sq = SquareVoice::new(1000, Pan::CENTER);
        sq.set_period(Some(100), 0, &mut ch).unwrap();
        sq.run_until(1000, &mut ch).unwrap();
        sq.end_frame(1000);
        assert_eq!(sq.time, 0);

        ch[0].end_frame(1000).unwrap();
        let mut out = [0i16; 50];
        let n = ch[0].read_samples(&mut out, 50, 1);
        assert_eq!(n, 50);
        // 100-clock half period at 20 clocks/sample: 5-sample plateaus.
        assert!(out[20..].iter().any(|&s| s > 800));
        assert!(out[20..].iter().any(|&s| s < -800));
    }

    #[test]
    fn silenced_square_returns_to_zero() {
        let mut ch = mono();
        let mut sq = SquareVoice::new(1000, Pan::CENTER);
        sq.set_period(Some(50), 0, &mut ch).unwrap();
        sq.run_until(120, &mut ch).unwrap();
        sq.set_period(None, 120, &mut ch).unwrap();
        sq.run_until(2000, &mut ch).unwrap();
        ch[0].end_frame(2000).unwrap();

        let mut out = [0i16; 100];
        ch[0].read_samples(&mut out, 100, 1);
        assert!(out[20..].iter().all(|&s| s.abs() < 20), "{:?}", &out[20..30]);
    }

    #[test]
    fn noise_gate_closes() {
        let mut ch = mono();
        let mut hat = NoiseVoice::new(7, Pan::CENTER);
        hat.trigger(10, 600, 300);
        hat.run_until(200, &mut ch).unwrap();
        assert!(hat.is_active());
        hat.run_until(1000, &mut ch).unwrap();
        assert!(!hat.is_active());
        hat.end_frame(1000);
        assert_eq!(hat.gate_end, 0);
    }

    #[test]
    fn lfsr_has_full_period() {
        let mut n = NoiseVoice::new(1, Pan::CENTER);
        let start = n.lfsr;
        let mut steps = 0;
        loop {
            n.shift();
            steps += 1;
            if n.lfsr == start {
                break;
            }
        }
        assert_eq!(steps, (1 << 15) - 1);
    }
}
