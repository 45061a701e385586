//! Delay-line pitch shifter with two crossfaded read taps.
//!
//! Each tap's delay sweeps across a window at a rate set by the pitch
//! ratio; the taps are half a window apart and crossfade with triangular
//! gains that sum to one.

use tl_ir::PitchParams;

use super::delay::DelayLine;
use super::{check, Effect};
use crate::audio_buffer::AudioBuffer;
use crate::error::EffectError;

pub struct PitchShift {
    lines: [DelayLine; 2],
    /// Position of tap A within the window, `[0, 1)`
    phase: f32,
    step: f32,
    window: f32,
    wet: f32,
}

fn triangle(phase: f32) -> f32 {
    1.0 - libm::fabsf(2.0 * phase - 1.0)
}

fn wrap(phase: f32) -> f32 {
    phase - libm::floorf(phase)
}

impl PitchShift {
    pub fn new(params: &PitchParams, sample_rate: u32) -> Result<Self, EffectError> {
        let semitones = check("pitch", "semitones", params.semitones, -24.0..=24.0)?;
        let window_ms = check("pitch", "windowMs", params.window_ms, 10.0..=200.0)?;
        let wet = check("pitch", "wet", params.wet, 0.0..=1.0)?;
        let ratio = libm::powf(2.0, semitones / 12.0);
        let window = window_ms * sample_rate as f32 / 1000.0;
        let len = window as usize + 2;
        Ok(Self {
            lines: [DelayLine::new(len), DelayLine::new(len)],
            phase: 0.0,
            step: (1.0 - ratio) / window,
            window,
            wet,
        })
    }
}

impl Effect for PitchShift {
    fn name(&self) -> &'static str {
        "pitch"
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let dry = 1.0 - self.wet;
        let (left, right) = buffer.stereo_mut();
        let [line_l, line_r] = &mut self.lines;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            self.phase = wrap(self.phase + self.step);
            let phase_b = wrap(self.phase + 0.5);
            let (gain_a, gain_b) = (triangle(self.phase), triangle(phase_b));
            let (delay_a, delay_b) = (self.phase * self.window, phase_b * self.window);

            for (s, line) in [(l, &mut *line_l), (r, &mut *line_r)] {
                line.write(*s);
                let shifted = line.read_at(delay_a) * gain_a + line.read_at(delay_b) * gain_b;
                *s = *s * dry + shifted * self.wet;
            }
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        for line in &mut self.lines {
            line.clear();
        }
    }
}
