//! Audio output context: the device clock the engine renders against.

use crate::audio_buffer::AudioBuffer;
use crate::error::ContextError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    /// Created but not yet unlocked, or suspended
    Suspended,
    Running,
    Closed,
}

/// Sink for rendered blocks with a fixed sample rate.
///
/// `resume` is the unlock point: it blocks until the device is running,
/// so callers can treat a successful return as "audio will be heard".
pub trait AudioContext {
    fn sample_rate(&self) -> u32;
    fn state(&self) -> ContextState;
    fn resume(&mut self) -> Result<(), ContextError>;
    fn suspend(&mut self) -> Result<(), ContextError>;
    /// Queue one rendered block for playback.
    fn write(&mut self, block: &AudioBuffer) -> Result<(), ContextError>;
    /// Frames written but not yet played.
    fn queued_frames(&self) -> usize;
}

/// In-memory context. Keeps every written frame (interleaved stereo) and
/// only "plays" them when told to via [`OfflineContext::consume`].
#[derive(Clone, Debug)]
pub struct OfflineContext {
    sample_rate: u32,
    state: ContextState,
    samples: Vec<f32>,
    consumed: usize,
    resumes: usize,
}

impl OfflineContext {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            state: ContextState::Suspended,
            samples: Vec::new(),
            consumed: 0,
            resumes: 0,
        }
    }

    pub fn rendered_frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Interleaved stereo samples written so far.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn take_samples(&mut self) -> Vec<f32> {
        self.consumed = 0;
        core::mem::take(&mut self.samples)
    }

    /// Pretend the device played `frames` queued frames.
    pub fn consume(&mut self, frames: usize) {
        self.consumed = (self.consumed + frames).min(self.rendered_frames());
    }

    /// How many times `resume` has been called.
    pub fn resume_count(&self) -> usize {
        self.resumes
    }

    pub fn close(&mut self) {
        self.state = ContextState::Closed;
    }
}

impl AudioContext for OfflineContext {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<(), ContextError> {
        if self.state == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        self.resumes += 1;
        self.state = ContextState::Running;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), ContextError> {
        if self.state == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        self.state = ContextState::Suspended;
        Ok(())
    }

    fn write(&mut self, block: &AudioBuffer) -> Result<(), ContextError> {
        if self.state == ContextState::Closed {
            return Err(ContextError::Closed);
        }
        block.append_interleaved(&mut self.samples);
        Ok(())
    }

    fn queued_frames(&self) -> usize {
        self.rendered_frames() - self.consumed
    }
}
