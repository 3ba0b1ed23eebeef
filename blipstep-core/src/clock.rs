//! Fixed-point mapping between the event clock and the output sample clock.
//!
//! A clock time `t` (ticks since the start of the current frame) maps to the
//! sample-domain position `t * factor + offset`, where one output sample is
//! [`TIME_UNIT`]. `factor` is the scaled clocks→samples ratio and `offset`
//! carries the fractional sample left over from earlier frames.
//!
//! Products are formed in 128 bits so long frames never wrap; the buffer
//! capacity checks in the facade are the only limit on frame length.

use num_traits::float::FloatCore;

use crate::error::RateConfigurationError;

// --------------------------------- Constants -------------------------------------

/// Bits dropped from a position before decoding phase and interpolation.
pub const PRE_SHIFT: u32 = 32;
/// Fractional width of a sample-domain position.
pub const TIME_BITS: u32 = PRE_SHIFT + 20;
/// One output sample, in fixed point.
pub const TIME_UNIT: u64 = 1 << TIME_BITS;
/// Fractional bits left after `PRE_SHIFT`.
pub const FRAC_BITS: u32 = TIME_BITS - PRE_SHIFT;

pub const PHASE_BITS: u32 = 5;
pub const PHASE_COUNT: usize = 1 << PHASE_BITS;

/// Taps per half of the step kernel; a full kernel spans `2 * HALF_WIDTH` slots.
pub const HALF_WIDTH: usize = 8;
/// Deltas may land this many samples past the end of a frame.
pub const END_FRAME_EXTRA: usize = 2;
/// Slots allocated beyond the advertised capacity.
pub const GUARD: usize = HALF_WIDTH * 2 + END_FRAME_EXTRA;

/// Fractional bits carried by delay line accumulators.
pub const DELTA_BITS: u32 = 15;
pub const DELTA_UNIT: i32 = 1 << DELTA_BITS;

/// High-pass breakpoint of the output stage.
pub const BASS_SHIFT: u32 = 9;

/// Clocks per sample assumed until rates are configured.
pub const MAX_RATIO: u64 = 1 << 20;
/// Recommended upper bound on samples produced by one frame.
pub const MAX_FRAME: usize = 4000;

const FACTOR_LIMIT: f64 = 18_446_744_073_709_551_616.0; // 2^64

// ------------------------------- Decoded position --------------------------------

/// A clock time decoded into the sample domain, `PRE_SHIFT` bits dropped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Position {
    fixed: u64,
}

impl Position {
    /// Whole samples past the first unfinished slot.
    #[inline]
    pub fn sample(self) -> usize {
        usize::try_from(self.fixed >> FRAC_BITS).unwrap_or(usize::MAX)
    }

    /// Step table row for this sub-sample position.
    #[inline]
    pub fn phase(self) -> usize {
        ((self.fixed >> (FRAC_BITS - PHASE_BITS)) as usize) & (PHASE_COUNT - 1)
    }

    /// Position between `phase()` and the next row, in `DELTA_BITS` fixed point.
    #[inline]
    pub fn phase_interp(self) -> i64 {
        ((self.fixed >> (FRAC_BITS - PHASE_BITS - DELTA_BITS)) & (DELTA_UNIT as u64 - 1)) as i64
    }

    /// Position within the sample, in `DELTA_BITS` fixed point.
    #[inline]
    pub fn sample_interp(self) -> i64 {
        ((self.fixed >> (FRAC_BITS - DELTA_BITS)) & (DELTA_UNIT as u64 - 1)) as i64
    }
}

// --------------------------------- Clock state -----------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FixedPointClock {
    factor: u64,
    offset: u64,
}

impl Default for FixedPointClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedPointClock {
    /// `MAX_RATIO` clocks per sample, offset already reset.
    #[inline]
    pub const fn new() -> Self {
        let factor = TIME_UNIT / MAX_RATIO;
        Self { factor, offset: factor / 2 }
    }

    #[inline] pub fn factor(&self) -> u64 { self.factor }
    #[inline] pub fn offset(&self) -> u64 { self.offset }

    /// Configure `factor = ceil(TIME_UNIT * sample_rate / clock_rate)`.
    ///
    /// Rounding up means the clock never under-counts produced samples. The
    /// offset is left alone; callers clear after changing rates.
    pub fn set_rates(&mut self, clock_rate: f64, sample_rate: f64) -> Result<(), RateConfigurationError> {
        let err = RateConfigurationError { clock_rate, sample_rate };
        if !(clock_rate.is_finite() && clock_rate > 0.0 && sample_rate > 0.0) {
            tracing::warn!(clock_rate, sample_rate, "rejected rate");
            return Err(err);
        }

        let factor = TIME_UNIT as f64 * sample_rate / clock_rate;
        if !factor.is_finite() || factor >= FACTOR_LIMIT {
            tracing::warn!(clock_rate, sample_rate, factor, "ratio exceeds fixed-point range");
            return Err(err);
        }

        // The float product may itself have rounded down; offset = factor/2
        // in `reset_offset` absorbs either direction.
        self.factor = (FloatCore::ceil(factor) as u64).max(1);
        tracing::debug!(clock_rate, sample_rate, factor = self.factor, "rates configured");
        Ok(())
    }

    /// Center the carried fraction: `offset = factor / 2`.
    #[inline]
    pub fn reset_offset(&mut self) {
        self.offset = self.factor / 2;
    }

    #[inline]
    pub(crate) fn set_offset(&mut self, offset: u64) {
        debug_assert!(offset < TIME_UNIT);
        self.offset = offset;
    }

    #[inline]
    fn scaled(&self, time: u32) -> u128 {
        u128::from(time) * u128::from(self.factor) + u128::from(self.offset)
    }

    /// Decode a frame-relative clock time.
    #[inline]
    pub fn position(&self, time: u32) -> Position {
        // time < 2^32 and factor < 2^64, so the shifted value fits in 64 bits.
        Position { fixed: (self.scaled(time) >> PRE_SHIFT) as u64 }
    }

    /// Whole samples completed by a frame of `duration` clocks, and the
    /// fractional offset that carries into the next frame.
    #[inline]
    pub fn split_frame(&self, duration: u32) -> (usize, u64) {
        let off = self.scaled(duration);
        let samples = usize::try_from(off >> TIME_BITS).unwrap_or(usize::MAX);
        (samples, (off & u128::from(TIME_UNIT - 1)) as u64)
    }

    /// Clocks needed to complete `samples` more samples, given `avail` already
    /// finished out of `capacity`.
    ///
    /// Returns 0 when the samples would not fit, when the carried fraction
    /// already covers them, or when the answer does not fit a frame length.
    pub fn clocks_needed(&self, samples: usize, avail: usize, capacity: usize) -> u32 {
        if avail.saturating_add(samples) > capacity {
            return 0;
        }

        let needed = samples as u128 * u128::from(TIME_UNIT);
        let offset = u128::from(self.offset);
        if needed < offset {
            return 0;
        }

        let factor = u128::from(self.factor);
        u32::try_from((needed - offset + factor - 1) / factor).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_rounds_up() {
        let mut c = FixedPointClock::new();
        c.set_rates(1_000_000.0, 44_100.0).unwrap();
        assert_eq!(c.factor(), 198_608_743_567_039);

        let exact = TIME_UNIT as f64 * 44_100.0 / 1_000_000.0;
        assert!(c.factor() as f64 >= exact);
        assert!(((c.factor() - 1) as f64) < exact);
    }

    #[test]
    fn rejected_rates_leave_state() {
        let mut c = FixedPointClock::new();
        c.set_rates(3_579_545.0, 48_000.0).unwrap();
        let before = c;

        // 2^52 * 5000 does not fit in 64 bits.
        assert!(c.set_rates(1.0, 5000.0).is_err());
        assert!(c.set_rates(0.0, 48_000.0).is_err());
        assert!(c.set_rates(1_000_000.0, -1.0).is_err());
        assert!(c.set_rates(f64::NAN, 48_000.0).is_err());
        assert!(c.set_rates(f64::INFINITY, 48_000.0).is_err());
        assert_eq!(c, before);
    }

    #[test]
    fn clocks_needed_matches_reference() {
        let mut c = FixedPointClock::new();
        c.set_rates(1_000_000.0, 44_100.0).unwrap();
        c.reset_offset();
        assert_eq!(c.clocks_needed(1, 0, 100), 23);
        assert_eq!(c.clocks_needed(10, 0, 100), 227);
        assert_eq!(c.clocks_needed(0, 0, 100), 0);
        assert_eq!(c.clocks_needed(51, 50, 100), 0);
    }

    #[test]
    fn split_frame_carries_fraction() {
        let mut c = FixedPointClock::new();
        c.set_rates(1_000_000.0, 44_100.0).unwrap();
        c.reset_offset();
        let (samples, offset) = c.split_frame(1000);
        assert_eq!(samples, 44);
        assert_eq!(offset, 549_664_334_520_695);
        assert!(offset < TIME_UNIT);
    }

    #[test]
    fn position_decodes_phase() {
        let mut c = FixedPointClock::new();
        c.set_rates(1_000_000.0, 44_100.0).unwrap();
        c.reset_offset();
        let p = c.position(500);
        assert_eq!(p.sample(), 22);
        assert_eq!(p.phase(), 2);
        assert_eq!(p.phase_interp(), 10_013);
        assert_eq!(p.sample_interp(), 2_360);
    }
}
