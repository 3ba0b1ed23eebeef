//! Frame driver.
//!
//! This module defines the minimal `EventSource` trait and an `Engine<S>`
//! wrapper that owns a source plus one [`Resampler`] per output channel and
//! runs the per-frame cycle: ask how many clocks the next samples need, let
//! the source emit its deltas for that span, close the frame, read.
//!
//! Design goals
//! - No allocations after construction
//! - Rate changes clear every channel and reset the source in one place
//! - Generic over the source type, so scenes can be swapped without trait objects

use blipstep_core::clock::MAX_FRAME;
use blipstep_core::{BufferOverflowError, Error, Resampler};

/// Anything that turns elapsed clocks into amplitude steps.
pub trait EventSource {
    /// Called when the engine is (re)initialized or when rates change. The
    /// resamplers have just been cleared, so all output levels are zero.
    fn reset(&mut self, clock_rate: f64);

    /// Emit deltas for the next `clocks` clocks into `channels`, at
    /// frame-relative times below `clocks`, and carry state into the next frame.
    fn run(&mut self, clocks: u32, channels: &mut [Resampler]) -> Result<(), BufferOverflowError>;
}

/// Drives an `EventSource` through one resampler per channel (mono or stereo).
pub struct Engine<S: EventSource> {
    clock_rate: f64,
    sample_rate: f64,
    channels: Vec<Resampler>,
    source: S,
}

impl<S: EventSource> Engine<S> {
    /// `channels` is clamped to 1..=2.
    pub fn new(source: S, channels: usize, clock_rate: f64, sample_rate: f64) -> Result<Self, Error> {
        let count = channels.clamp(1, 2);
        let mut engine = Self {
            clock_rate,
            sample_rate,
            channels: (0..count).map(|_| Resampler::new(MAX_FRAME * 2)).collect(),
            source,
        };
        engine.set_rates(clock_rate, sample_rate)?;
        Ok(engine)
    }

    /// Reconfigure every channel. Buffered audio is dropped and the source
    /// restarts; on error nothing changes.
    pub fn set_rates(&mut self, clock_rate: f64, sample_rate: f64) -> Result<(), Error> {
        // Every channel shares the same rates, so checking one validates all.
        let mut candidate = *self.channels[0].clock();
        candidate.set_rates(clock_rate, sample_rate)?;

        for blip in &mut self.channels {
            blip.set_rates(clock_rate, sample_rate)?;
            blip.clear();
        }
        self.clock_rate = clock_rate;
        self.sample_rate = sample_rate;
        self.source.reset(clock_rate);
        tracing::debug!(clock_rate, sample_rate, channels = self.channels.len(), "engine rates set");
        Ok(())
    }

    #[inline] pub fn clock_rate(&self) -> f64 { self.clock_rate }
    #[inline] pub fn sample_rate(&self) -> f64 { self.sample_rate }
    #[inline] pub fn channel_count(&self) -> usize { self.channels.len() }

    /// Get a mutable reference to the source for live parameter tweaks.
    #[inline] pub fn source_mut(&mut self) -> &mut S { &mut self.source }

    /// Replace the source; channels are cleared so the new one starts from silence.
    pub fn swap_source(&mut self, source: S) {
        self.source = source;
        self.restart();
    }

    /// Clear every channel and reset the source.
    fn restart(&mut self) {
        for blip in &mut self.channels {
            blip.clear();
        }
        self.source.reset(self.clock_rate);
    }

    /// Run the source for one frame and close it on every channel.
    fn run_frame(&mut self, clocks: u32) -> Result<(), BufferOverflowError> {
        self.source.run(clocks, &mut self.channels)?;
        for blip in &mut self.channels {
            blip.end_frame(clocks)?;
        }
        Ok(())
    }

    /// Fill `out` with interleaved frames. A trailing partial frame is left
    /// untouched. Returns the number of frames written.
    ///
    /// A failed frame may have reached only some channels, so on error every
    /// channel is cleared and the source restarts from silence.
    pub fn render_interleaved(&mut self, out: &mut [i16]) -> Result<usize, Error> {
        let stride = self.channels.len();
        let frames = out.len() / stride;
        let mut done = 0;

        while done < frames {
            let want = (frames - done).min(MAX_FRAME);
            let avail = self.channels[0].samples_avail();
            if avail < want {
                let clocks = self.channels[0].clocks_needed(want - avail);
                if clocks > 0 {
                    if let Err(e) = self.run_frame(clocks) {
                        tracing::warn!(clocks, error = %e, "frame failed, restarting source");
                        self.restart();
                        return Err(e.into());
                    }
                }
            }

            let n = want.min(self.channels[0].samples_avail());
            if n == 0 {
                break;
            }
            let base = done * stride;
            for (c, blip) in self.channels.iter_mut().enumerate() {
                blip.read_samples(&mut out[base + c..], n, stride);
            }
            done += n;
        }
        Ok(done)
    }
}
