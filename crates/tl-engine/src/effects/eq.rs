//! Three-band EQ: low shelf, mid peak, high shelf.

use core::f32::consts::TAU;

use tl_ir::EqParams;

use super::{check, Effect};
use crate::audio_buffer::AudioBuffer;
use crate::error::EffectError;

const SHELF_SLOPE: f32 = 1.0;
const MID_Q: f32 = 0.7;

/// Direct form I biquad, normalized so `a0 = 1`.
#[derive(Clone, Copy, Debug, Default)]
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    fn normalized(b: [f32; 3], a: [f32; 3]) -> Self {
        Self {
            b0: b[0] / a[0],
            b1: b[1] / a[0],
            b2: b[2] / a[0],
            a1: a[1] / a[0],
            a2: a[2] / a[0],
            ..Default::default()
        }
    }

    fn low_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = libm::powf(10.0, gain_db / 40.0);
        let w0 = TAU * freq / sample_rate;
        let (sin, cos) = (libm::sinf(w0), libm::cosf(w0));
        let alpha = sin / 2.0 * libm::sqrtf((a + 1.0 / a) * (1.0 / SHELF_SLOPE - 1.0) + 2.0);
        let k = 2.0 * libm::sqrtf(a) * alpha;
        Self::normalized(
            [
                a * ((a + 1.0) - (a - 1.0) * cos + k),
                2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
                a * ((a + 1.0) - (a - 1.0) * cos - k),
            ],
            [
                (a + 1.0) + (a - 1.0) * cos + k,
                -2.0 * ((a - 1.0) + (a + 1.0) * cos),
                (a + 1.0) + (a - 1.0) * cos - k,
            ],
        )
    }

    fn high_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = libm::powf(10.0, gain_db / 40.0);
        let w0 = TAU * freq / sample_rate;
        let (sin, cos) = (libm::sinf(w0), libm::cosf(w0));
        let alpha = sin / 2.0 * libm::sqrtf((a + 1.0 / a) * (1.0 / SHELF_SLOPE - 1.0) + 2.0);
        let k = 2.0 * libm::sqrtf(a) * alpha;
        Self::normalized(
            [
                a * ((a + 1.0) + (a - 1.0) * cos + k),
                -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
                a * ((a + 1.0) + (a - 1.0) * cos - k),
            ],
            [
                (a + 1.0) - (a - 1.0) * cos + k,
                2.0 * ((a - 1.0) - (a + 1.0) * cos),
                (a + 1.0) - (a - 1.0) * cos - k,
            ],
        )
    }

    fn peaking(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = libm::powf(10.0, gain_db / 40.0);
        let w0 = TAU * freq / sample_rate;
        let (sin, cos) = (libm::sinf(w0), libm::cosf(w0));
        let alpha = sin / (2.0 * q);
        Self::normalized(
            [1.0 + alpha * a, -2.0 * cos, 1.0 - alpha * a],
            [1.0 + alpha / a, -2.0 * cos, 1.0 - alpha / a],
        )
    }

    fn tick(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }

    fn clear(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

pub struct ThreeBandEq {
    /// `[channel][band]`
    bands: [[Biquad; 3]; 2],
}

impl ThreeBandEq {
    pub fn new(params: &EqParams, sample_rate: f32) -> Result<Self, EffectError> {
        let nyquist = sample_rate / 2.0;
        let low_db = check("eq", "lowDb", params.low_db, -24.0..=24.0)?;
        let mid_db = check("eq", "midDb", params.mid_db, -24.0..=24.0)?;
        let high_db = check("eq", "highDb", params.high_db, -24.0..=24.0)?;
        let low_freq = check("eq", "lowFreqHz", params.low_freq_hz, 20.0..=nyquist * 0.9)?;
        let high_freq = check("eq", "highFreqHz", params.high_freq_hz, 20.0..=nyquist * 0.9)?;
        if high_freq <= low_freq {
            return Err(EffectError::InvalidParam {
                effect: "eq",
                param: "highFreqHz",
                value: high_freq,
            });
        }
        let mid_freq = libm::sqrtf(low_freq * high_freq);
        let chain = [
            Biquad::low_shelf(low_freq, low_db, sample_rate),
            Biquad::peaking(mid_freq, mid_db, MID_Q, sample_rate),
            Biquad::high_shelf(high_freq, high_db, sample_rate),
        ];
        Ok(Self { bands: [chain, chain] })
    }
}

impl Effect for ThreeBandEq {
    fn name(&self) -> &'static str {
        "eq"
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        for (ch, chain) in self.bands.iter_mut().enumerate() {
            if ch as u16 >= buffer.channels() {
                break;
            }
            for s in buffer.channel_mut(ch as u16) {
                let mut y = *s;
                for band in chain.iter_mut() {
                    y = band.tick(y);
                }
                *s = y;
            }
        }
    }

    fn reset(&mut self) {
        for band in self.bands.iter_mut().flatten() {
            band.clear();
        }
    }
}
