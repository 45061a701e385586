//! Feedback delay.

use tl_ir::DelayParams;

use super::{check, Effect};
use crate::audio_buffer::AudioBuffer;
use crate::error::EffectError;

/// Fixed-length circular buffer.
pub(crate) struct DelayLine {
    buf: Vec<f32>,
    pos: usize,
}

impl DelayLine {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            buf: vec![0.0; len.max(1)],
            pos: 0,
        }
    }

    /// Oldest sample, `len` frames ago.
    pub(crate) fn read(&self) -> f32 {
        self.buf[self.pos]
    }

    /// Sample `delay` frames ago (fractional, clamped to the line).
    pub(crate) fn read_at(&self, delay: f32) -> f32 {
        let len = self.buf.len();
        let delay = delay.clamp(0.0, (len - 1) as f32);
        let whole = delay as usize;
        let frac = delay - whole as f32;
        let i0 = (self.pos + len - 1 - whole) % len;
        let i1 = (i0 + len - 1) % len;
        self.buf[i0] + (self.buf[i1] - self.buf[i0]) * frac
    }

    pub(crate) fn write(&mut self, x: f32) {
        self.buf[self.pos] = x;
        self.pos = (self.pos + 1) % self.buf.len();
    }

    pub(crate) fn clear(&mut self) {
        self.buf.fill(0.0);
        self.pos = 0;
    }
}

pub struct Delay {
    lines: [DelayLine; 2],
    feedback: f32,
    wet: f32,
}

impl Delay {
    pub fn new(params: &DelayParams, sample_rate: u32) -> Result<Self, EffectError> {
        let time = check("delay", "timeMs", params.time_ms, 1.0..=5000.0)?;
        let feedback = check("delay", "feedback", params.feedback, 0.0..=0.99)?;
        let wet = check("delay", "wet", params.wet, 0.0..=1.0)?;
        let len = libm::roundf(time * sample_rate as f32 / 1000.0) as usize;
        Ok(Self {
            lines: [DelayLine::new(len), DelayLine::new(len)],
            feedback,
            wet,
        })
    }
}

impl Effect for Delay {
    fn name(&self) -> &'static str {
        "delay"
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        for (ch, line) in self.lines.iter_mut().enumerate() {
            if ch as u16 >= buffer.channels() {
                break;
            }
            for s in buffer.channel_mut(ch as u16) {
                let delayed = line.read();
                line.write(*s + delayed * self.feedback);
                *s += delayed * self.wet;
            }
        }
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
    }
}
