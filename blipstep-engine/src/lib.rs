//! Blipstep Engine: frame driver + voices + scenes.
//!
//! Crate layout:
//! - [`graph`]  : `EventSource` trait and `Engine<S>` wrapper
//! - [`nodes`]  : square and noise voices, integer panning
//! - [`scenes`] : sequenced voice sets that implement `EventSource`
//!
//! Sources speak in clocks and amplitude steps; one
//! [`Resampler`](blipstep_core::Resampler) per channel turns them into
//! interleaved 16-bit frames. Nothing allocates after `Engine::new`.

pub mod graph;
pub mod nodes;
pub mod scenes;

// Re-export some commonly used items to make downstream imports ergonomic.
pub use blipstep_core::{Error, Resampler};
pub use graph::{Engine, EventSource};
pub use nodes::{NoiseVoice, Pan, SquareVoice};
pub use scenes::Scene;
