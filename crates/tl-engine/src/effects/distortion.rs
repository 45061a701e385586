//! Soft-clipping waveshaper.

use tl_ir::DistortionParams;

use super::{check, Effect};
use crate::audio_buffer::AudioBuffer;
use crate::error::EffectError;

/// `tanh(k·x) / tanh(k)`, blended with the dry signal.
pub struct Distortion {
    drive: f32,
    norm: f32,
    wet: f32,
}

impl Distortion {
    pub fn new(params: &DistortionParams) -> Result<Self, EffectError> {
        let amount = check("distortion", "amount", params.amount, 0.0..=1.0)?;
        let wet = check("distortion", "wet", params.wet, 0.0..=1.0)?;
        let drive = 1.0 + amount * 49.0;
        Ok(Self {
            drive,
            norm: 1.0 / libm::tanhf(drive),
            wet,
        })
    }

    fn shape(&self, x: f32) -> f32 {
        libm::tanhf(self.drive * x) * self.norm
    }
}

impl Effect for Distortion {
    fn name(&self) -> &'static str {
        "distortion"
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let dry = 1.0 - self.wet;
        for ch in 0..buffer.channels() {
            for s in buffer.channel_mut(ch) {
                *s = *s * dry + self.shape(*s) * self.wet;
            }
        }
    }

    fn reset(&mut self) {}
}
