//! Schroeder/Moorer style reverb: parallel damped combs into series allpasses.

use arrayvec::ArrayVec;
use tl_ir::ReverbParams;

use super::delay::DelayLine;
use super::{check, Effect};
use crate::audio_buffer::AudioBuffer;
use crate::error::EffectError;

/// Comb lengths in frames at 44.1 kHz.
const COMB_TUNING: [usize; 4] = [1116, 1188, 1277, 1356];
const ALLPASS_TUNING: [usize; 2] = [556, 441];
/// Added to every right-channel length to decorrelate the sides.
const STEREO_SPREAD: usize = 23;
const DAMPING: f32 = 0.2;
const ALLPASS_FEEDBACK: f32 = 0.5;
const COMB_SCALE: f32 = 0.25;

struct Comb {
    line: DelayLine,
    feedback: f32,
    store: f32,
}

impl Comb {
    fn new(len: usize, decay_sec: f32, sample_rate: f32) -> Self {
        // Loop gain that reaches -60 dB after `decay_sec`.
        let feedback = libm::powf(10.0, -3.0 * len as f32 / (decay_sec * sample_rate));
        Self {
            line: DelayLine::new(len),
            feedback,
            store: 0.0,
        }
    }

    fn tick(&mut self, x: f32) -> f32 {
        let y = self.line.read();
        self.store = y * (1.0 - DAMPING) + self.store * DAMPING;
        self.line.write(x + self.store * self.feedback);
        y
    }
}

struct Allpass {
    line: DelayLine,
}

impl Allpass {
    fn tick(&mut self, x: f32) -> f32 {
        let buffered = self.line.read();
        self.line.write(x + buffered * ALLPASS_FEEDBACK);
        buffered - x
    }
}

struct Side {
    pre_delay: DelayLine,
    combs: ArrayVec<Comb, 4>,
    allpasses: ArrayVec<Allpass, 2>,
}

impl Side {
    fn new(spread: usize, pre_delay: usize, decay_sec: f32, sample_rate: f32) -> Self {
        let scale = |n: usize| ((n + spread) as f32 * sample_rate / 44_100.0) as usize;
        Self {
            pre_delay: DelayLine::new(pre_delay),
            combs: COMB_TUNING
                .iter()
                .map(|&n| Comb::new(scale(n), decay_sec, sample_rate))
                .collect(),
            allpasses: ALLPASS_TUNING
                .iter()
                .map(|&n| Allpass {
                    line: DelayLine::new(scale(n)),
                })
                .collect(),
        }
    }

    fn tick(&mut self, x: f32) -> f32 {
        let input = self.pre_delay.read();
        self.pre_delay.write(x);
        let mut y = 0.0;
        for comb in &mut self.combs {
            y += comb.tick(input);
        }
        y *= COMB_SCALE;
        for ap in &mut self.allpasses {
            y = ap.tick(y);
        }
        y
    }

    fn clear(&mut self) {
        self.pre_delay.clear();
        for comb in &mut self.combs {
            comb.line.clear();
            comb.store = 0.0;
        }
        for ap in &mut self.allpasses {
            ap.line.clear();
        }
    }
}

pub struct Reverb {
    sides: [Side; 2],
    wet: f32,
}

impl Reverb {
    pub fn new(params: &ReverbParams, sample_rate: u32) -> Result<Self, EffectError> {
        let decay = check("reverb", "decaySec", params.decay_sec, 0.1..=20.0)?;
        let pre_delay_ms = check("reverb", "preDelayMs", params.pre_delay_ms, 0.0..=500.0)?;
        let wet = check("reverb", "wet", params.wet, 0.0..=1.0)?;
        let sr = sample_rate as f32;
        let pre_delay = libm::roundf(pre_delay_ms * sr / 1000.0) as usize;
        Ok(Self {
            sides: [
                Side::new(0, pre_delay, decay, sr),
                Side::new(STEREO_SPREAD, pre_delay, decay, sr),
            ],
            wet,
        })
    }
}

impl Effect for Reverb {
    fn name(&self) -> &'static str {
        "reverb"
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let dry = 1.0 - self.wet;
        for (ch, side) in self.sides.iter_mut().enumerate() {
            if ch as u16 >= buffer.channels() {
                break;
            }
            for s in buffer.channel_mut(ch as u16) {
                *s = *s * dry + side.tick(*s) * self.wet;
            }
        }
    }

    fn reset(&mut self) {
        for side in &mut self.sides {
            side.clear();
        }
    }
}
