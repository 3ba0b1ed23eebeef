//! Accumulation window of not-yet-finished samples.
//!
//! Slot `i` holds the summed kernel contributions for the `i`-th sample
//! after the read cursor. `capacity` slots are visible to callers; the
//! [`GUARD`] slots after them absorb the kernel tail of deltas placed near
//! the end of the window, so injection needs one range check per delta
//! rather than one per tap.
//!
//! Accumulators are `DELTA_BITS` fixed point and wrap on overflow. The
//! buffer tracks the end of the touched region so removal only moves
//! slots that can be non-zero.

use alloc::boxed::Box;
use alloc::vec;

use cfg_if::cfg_if;

use crate::clock::{DELTA_BITS, DELTA_UNIT, END_FRAME_EXTRA, GUARD, HALF_WIDTH};
use crate::error::BufferOverflowError;
use crate::step_table;

#[derive(Clone, Debug)]
pub struct DelayLineBuffer {
    slots: Box<[i32]>,
    capacity: usize,
    // slots at or past this index are zero
    dirty: usize,
}

impl DelayLineBuffer {
    /// Allocate `capacity + GUARD` zeroed slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0; capacity + GUARD].into_boxed_slice(),
            capacity,
            dirty: 0,
        }
    }

    #[inline] pub fn capacity(&self) -> usize { self.capacity }
    #[inline] pub fn slots(&self) -> &[i32] { &self.slots }

    #[inline]
    pub fn clear(&mut self) {
        self.slots.fill(0);
        self.dirty = 0;
    }

    /// Reject a kernel whose first slot would be `origin`.
    #[inline]
    fn check_origin(&self, origin: usize) -> Result<(), BufferOverflowError> {
        let limit = self.capacity + END_FRAME_EXTRA;
        if origin > limit {
            tracing::warn!(origin, limit, "delta lands past the delay line");
            return Err(BufferOverflowError::new(origin, limit));
        }
        Ok(())
    }

    /// Add a band-limited step of height `delta` starting at slot `origin`.
    ///
    /// `phase` selects the step table row and `interp` (`DELTA_BITS` fixed
    /// point) blends it with the next row. Writes `2 * HALF_WIDTH` slots.
    pub fn add_step(
        &mut self,
        origin: usize,
        phase: usize,
        interp: i64,
        delta: i32,
    ) -> Result<(), BufferOverflowError> {
        self.check_origin(origin)?;

        let delta = i64::from(delta);
        let delta2 = (delta * interp) >> DELTA_BITS;
        let delta1 = delta - delta2;

        let (rise, rise_next) = step_table::rising(phase);
        let (fall, fall_prev) = step_table::falling(phase);
        let mut fall_rev = *fall;
        let mut fall_prev_rev = *fall_prev;
        fall_rev.reverse();
        fall_prev_rev.reverse();

        let (head, tail) = self.slots[origin..origin + 2 * HALF_WIDTH].split_at_mut(HALF_WIDTH);
        accumulate(head, rise, rise_next, delta1, delta2);
        accumulate(tail, &fall_rev, &fall_prev_rev, delta1, delta2);
        self.dirty = self.dirty.max(origin + 2 * HALF_WIDTH);
        Ok(())
    }

    /// Split `delta` across the two slots around the sample boundary, by
    /// `interp` (`DELTA_BITS` fixed point). No kernel shaping.
    pub fn add_linear(
        &mut self,
        origin: usize,
        interp: i64,
        delta: i32,
    ) -> Result<(), BufferOverflowError> {
        self.check_origin(origin)?;

        let delta = i64::from(delta);
        let delta2 = delta * interp;
        let a = origin + HALF_WIDTH - 1;
        self.slots[a] = self.slots[a].wrapping_add((delta * i64::from(DELTA_UNIT) - delta2) as i32);
        self.slots[a + 1] = self.slots[a + 1].wrapping_add(delta2 as i32);
        self.dirty = self.dirty.max(a + 2);
        Ok(())
    }

    /// Drop the first `count` slots, shifting later contributions down and
    /// zeroing the vacated tail.
    pub fn remove(&mut self, count: usize) {
        let end = self.dirty;
        if count >= end {
            self.slots[..end].fill(0);
            self.dirty = 0;
            return;
        }
        self.slots.copy_within(count..end, 0);
        self.slots[end - count..end].fill(0);
        self.dirty = end - count;
    }
}

/// `out[i] += (taps[i] * d1 + next[i] * d2) mod 2^32` for one half kernel.
#[inline]
fn accumulate(
    out: &mut [i32],
    taps: &[i16; HALF_WIDTH],
    next: &[i16; HALF_WIDTH],
    d1: i64,
    d2: i64,
) {
    cfg_if! {
        if #[cfg(feature = "simd")] {
            use wide::i32x8;
            // Wrapping lane arithmetic gives the same low 32 bits as the
            // 64-bit scalar products.
            let t = i32x8::from((*taps).map(i32::from));
            let n = i32x8::from((*next).map(i32::from));
            let mut acc = [0i32; HALF_WIDTH];
            acc.copy_from_slice(out);
            let sum = i32x8::from(acc) + t * i32x8::splat(d1 as i32) + n * i32x8::splat(d2 as i32);
            out.copy_from_slice(&sum.to_array());
        } else {
            for ((slot, &t), &n) in out.iter_mut().zip(taps).zip(next) {
                let tap = i64::from(t) * d1 + i64::from(n) * d2;
                *slot = slot.wrapping_add(tap as i32);
            }
        }
    }
}
