//! The resampler facade: one channel's clock, delay line and integrator.
//!
//! Per frame the caller adds deltas at non-decreasing clock times, closes
//! the frame with [`Resampler::end_frame`], then reads finished samples:
//!
//! ```
//! use blipstep_core::Resampler;
//!
//! let mut blip = Resampler::new(4096);
//! blip.set_rates(1_789_773.0, 48_000.0)?;
//! blip.clear();
//!
//! let frame = blip.clocks_needed(800);
//! blip.add_delta(0, 8000)?;
//! blip.add_delta(frame / 2, -8000)?;
//! blip.end_frame(frame)?;
//!
//! let mut out = [0i16; 800];
//! let n = blip.read_samples(&mut out, 800, 1);
//! assert_eq!(n, 800);
//! # Ok::<(), blipstep_core::Error>(())
//! ```

use crate::clock::FixedPointClock;
use crate::delay_line::DelayLineBuffer;
use crate::error::{BufferOverflowError, RateConfigurationError};
use crate::extract::{strided_capacity, Integrator};

#[derive(Clone, Debug)]
pub struct Resampler {
    clock: FixedPointClock,
    line: DelayLineBuffer,
    integrator: Integrator,
    avail: usize,
}

impl Resampler {
    /// Buffer up to `capacity` finished samples. The instance starts cleared
    /// at `MAX_RATIO` clocks per sample.
    pub fn new(capacity: usize) -> Self {
        let mut r = Self {
            clock: FixedPointClock::new(),
            line: DelayLineBuffer::new(capacity),
            integrator: Integrator::new(),
            avail: 0,
        };
        r.clear();
        r
    }

    #[inline] pub fn capacity(&self) -> usize { self.line.capacity() }
    #[inline] pub fn clock(&self) -> &FixedPointClock { &self.clock }

    /// For every `clock_rate` input clocks, about `sample_rate` samples are
    /// produced. Call [`clear`](Self::clear) afterwards.
    #[inline]
    pub fn set_rates(&mut self, clock_rate: f64, sample_rate: f64) -> Result<(), RateConfigurationError> {
        self.clock.set_rates(clock_rate, sample_rate)
    }

    /// Drop all buffered samples and filter state.
    pub fn clear(&mut self) {
        self.clock.reset_offset();
        self.avail = 0;
        self.integrator.reset();
        self.line.clear();
    }

    /// Frame length in clocks that makes `samples` more samples available,
    /// or 0 if they would not fit.
    #[inline]
    pub fn clocks_needed(&self, samples: usize) -> u32 {
        self.clock.clocks_needed(samples, self.avail, self.capacity())
    }

    /// Add an amplitude step of `delta` at clock `time` of the current frame.
    pub fn add_delta(&mut self, time: u32, delta: i32) -> Result<(), BufferOverflowError> {
        let pos = self.clock.position(time);
        let origin = self.avail.saturating_add(pos.sample());
        self.line.add_step(origin, pos.phase(), pos.phase_interp(), delta)
    }

    /// Like [`add_delta`](Self::add_delta) but without band-limiting: the
    /// step is split linearly between two samples. Cheaper, more aliasing.
    pub fn add_delta_fast(&mut self, time: u32, delta: i32) -> Result<(), BufferOverflowError> {
        let pos = self.clock.position(time);
        let origin = self.avail.saturating_add(pos.sample());
        self.line.add_linear(origin, pos.sample_interp(), delta)
    }

    /// Finish the samples before clock `duration` and start a new frame
    /// there. Deltas may have been added up to a couple of samples past it.
    pub fn end_frame(&mut self, duration: u32) -> Result<(), BufferOverflowError> {
        let (samples, offset) = self.clock.split_frame(duration);
        let avail = self.avail.saturating_add(samples);
        if avail > self.capacity() {
            tracing::warn!(duration, avail, capacity = self.capacity(), "frame overruns buffer");
            return Err(BufferOverflowError::new(avail, self.capacity()));
        }
        self.avail = avail;
        self.clock.set_offset(offset);
        Ok(())
    }

    #[inline]
    pub fn samples_avail(&self) -> usize {
        self.avail
    }

    /// Read up to `max_count` samples into `out[0]`, `out[stride]`, ...
    /// Other interleaved slots are left untouched; a stride of 0 means 1.
    /// Returns the number of samples read.
    pub fn read_samples(&mut self, out: &mut [i16], max_count: usize, stride: usize) -> usize {
        let count = max_count
            .min(self.avail)
            .min(strided_capacity(out.len(), stride));
        if count == 0 {
            return 0;
        }

        let n = self.integrator.drain(&self.line.slots()[..count], out, stride);
        debug_assert_eq!(n, count);
        self.line.remove(count);
        self.avail -= count;
        count
    }
}
