//! Error kinds reported by the resampler.
//!
//! Both are local and synchronous: every check runs before any state is
//! touched, so a returned error means the instance is exactly as it was.

use thiserror::Error;

/// The clock/sample rate pair cannot be represented in the fixed-point factor.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("clock rate {clock_rate} Hz cannot be resampled to {sample_rate} Hz in fixed point")]
pub struct RateConfigurationError {
    pub clock_rate: f64,
    pub sample_rate: f64,
}

/// A delta write or a frame end would run past the allocated slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("buffer overflow: {requested} exceeds limit {limit}")]
pub struct BufferOverflowError {
    /// Slot index or sample count the operation needed.
    pub requested: usize,
    /// Largest value that would have been accepted.
    pub limit: usize,
}

impl BufferOverflowError {
    #[inline]
    pub(crate) fn new(requested: usize, limit: usize) -> Self {
        Self { requested, limit }
    }
}

/// Either error kind, for callers that propagate both with `?`.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Rate(#[from] RateConfigurationError),
    #[error(transparent)]
    Overflow(#[from] BufferOverflowError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn messages_name_the_limit() {
        let e = BufferOverflowError::new(120, 102);
        assert_eq!(e.to_string(), "buffer overflow: 120 exceeds limit 102");

        let wrapped: Error = e.into();
        assert_eq!(wrapped.to_string(), e.to_string());
    }
}
