//! 16-bit stereo frame for PCM export.

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Quantize a float pair, clipping to full scale.
    pub fn from_f32(left: f32, right: f32) -> Self {
        Self {
            left: quantize(left),
            right: quantize(right),
        }
    }
}

fn quantize(x: f32) -> i16 {
    if x.is_nan() {
        return 0;
    }
    libm::roundf(x.clamp(-1.0, 1.0) * 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_and_clipping() {
        assert_eq!(Frame::from_f32(1.0, -1.0), Frame { left: 32767, right: -32767 });
        assert_eq!(Frame::from_f32(4.0, -4.0), Frame { left: 32767, right: -32767 });
        assert_eq!(Frame::from_f32(f32::NAN, 0.5), Frame { left: 0, right: 16384 });
    }
}
