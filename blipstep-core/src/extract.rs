//! Output stage: integrate finished slots, saturate, DC-block.
//!
//! The delay line holds *differences*; the integrator turns them back into
//! amplitudes. A leaky feedback of each emitted sample into the integrator
//! forms a one-pole high-pass whose breakpoint is set by `BASS_SHIFT`.

use crate::clock::{BASS_SHIFT, DELTA_BITS};

/// Saturate to `i16`: positive overflow gives `i16::MAX`, negative overflow
/// `i16::MIN`.
///
/// Over the values the integrator can produce (`i32 >> DELTA_BITS`), this is
/// bit-identical to the `(n >> 16) ^ 0x7FFF` two's-complement shortcut.
#[inline]
pub fn saturate16(n: i32) -> i16 {
    match i16::try_from(n) {
        Ok(s) => s,
        Err(_) if n < 0 => i16::MIN,
        Err(_) => i16::MAX,
    }
}

/// Running sum plus high-pass state, carried across reads.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Integrator {
    sum: i32,
}

impl Integrator {
    #[inline] pub const fn new() -> Self { Self { sum: 0 } }
    #[inline] pub fn reset(&mut self) { self.sum = 0; }

    /// Emit the current output sample, then fold in the next slot.
    #[inline]
    pub fn process(&mut self, slot: i32) -> i16 {
        let raw = self.sum >> DELTA_BITS;
        self.sum = self.sum.wrapping_add(slot);
        let s = saturate16(raw);
        self.sum = self.sum.wrapping_sub(i32::from(s) << (DELTA_BITS - BASS_SHIFT));
        s
    }

    /// Drain `slots` into `out[0]`, `out[stride]`, ... and return the count
    /// written, which is limited by how many strided positions `out` has.
    pub fn drain(&mut self, slots: &[i32], out: &mut [i16], stride: usize) -> usize {
        let stride = stride.max(1);
        let mut written = 0;
        for (dst, &slot) in out.iter_mut().step_by(stride).zip(slots) {
            *dst = self.process(slot);
            written += 1;
        }
        written
    }
}

/// How many samples fit in `len` elements at `stride`.
#[inline]
pub fn strided_capacity(len: usize, stride: usize) -> usize {
    let stride = stride.max(1);
    len.div_ceil(stride)
}
