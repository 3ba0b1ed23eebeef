#![cfg_attr(not(feature = "std"), no_std)]
//! Blipstep Core: band-limited delta resampler, `no_std`-ready.
//!
//! A signal source that only knows "at clock tick T the amplitude changes
//! by D" feeds those steps in; evenly spaced, anti-aliased 16-bit samples
//! come out. The clock can run at any rate up to ~2^20 ticks per sample.
//!
//! Features
//! - `std`    : (default) use the Rust standard library
//! - `no-std` : build with `#![no_std]` (needs `alloc` for the delay line)
//! - `simd`   : add kernel taps with `wide` lanes (bit-identical results)
//!
//! Modules
//! - [`clock`]      : fixed-point clock→sample mapping and constants
//! - [`step_table`] : band-limited step response, 32 phases × 8 taps
//! - [`delay_line`] : accumulation window with guard slots
//! - [`extract`]    : integrator, saturation and DC-blocking output stage
//! - [`blip`]       : the [`Resampler`] facade
//!
//! Design
//! - One allocation at construction; nothing allocates afterwards
//! - Every capacity check happens before any write
//! - One instance per channel; instances share nothing

extern crate alloc;

pub mod blip;
pub mod clock;
pub mod delay_line;
pub mod error;
pub mod extract;
pub mod step_table;

pub use blip::Resampler;
pub use error::{BufferOverflowError, Error, RateConfigurationError};

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::blip::Resampler;
    pub use crate::clock::{FixedPointClock, MAX_FRAME, MAX_RATIO, TIME_UNIT};
    pub use crate::error::{BufferOverflowError, Error, RateConfigurationError};
    pub use crate::extract::saturate16;
}
