//! One-pole RC low-pass filter: `y = y_prev + alpha * (x - y_prev)`.

use core::f32::consts::TAU;

use tl_ir::LowpassParams;

use super::{check, Effect};
use crate::audio_buffer::AudioBuffer;
use crate::error::EffectError;

pub struct Lowpass {
    prev_left: f32,
    prev_right: f32,
    alpha: f32,
}

impl Lowpass {
    pub fn new(params: &LowpassParams, sample_rate: f32) -> Result<Self, EffectError> {
        let cutoff = check("lowpass", "cutoffHz", params.cutoff_hz, 20.0..=(sample_rate / 2.0).min(22_050.0))?;
        Ok(Self {
            prev_left: 0.0,
            prev_right: 0.0,
            alpha: 1.0 - libm::expf(-TAU * cutoff / sample_rate),
        })
    }
}

impl Effect for Lowpass {
    fn name(&self) -> &'static str {
        "lowpass"
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let alpha = self.alpha;
        let mut prev_l = self.prev_left;
        let mut prev_r = self.prev_right;

        let (left, right) = buffer.stereo_mut();
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            prev_l += alpha * (*l - prev_l);
            prev_r += alpha * (*r - prev_r);
            *l = prev_l;
            *r = prev_r;
        }

        self.prev_left = prev_l;
        self.prev_right = prev_r;
    }

    fn reset(&mut self) {
        self.prev_left = 0.0;
        self.prev_right = 0.0;
    }
}
