//! Gain and pan conversions.

/// Linear gain used in place of true silence (-80 dB). Exponential ramps
/// cannot reach zero, and a non-zero floor keeps the output clear of denormals.
pub const SILENCE_FLOOR: f32 = 1e-4;

/// Convert decibels to linear gain. `-inf` maps to 0.
pub fn db_to_gain(db: f32) -> f32 {
    if db.is_nan() {
        return 1.0;
    }
    if db == f32::NEG_INFINITY {
        return 0.0;
    }
    libm::powf(10.0, db / 20.0)
}

/// Convert linear gain to decibels. Non-positive gain maps to `-inf`.
pub fn gain_to_db(gain: f32) -> f32 {
    if gain <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * libm::log10f(gain)
    }
}

/// Clamp a pan position into `[-1, 1]`; NaN centers.
pub fn clamp_pan(pan: f32) -> f32 {
    if pan.is_nan() {
        0.0
    } else {
        pan.clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_and_six_db() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_gain(-6.0) - 0.501_187).abs() < 1e-4);
        assert!((db_to_gain(6.0) - 1.995_262).abs() < 1e-4);
    }

    #[test]
    fn neg_infinity_is_zero_gain() {
        assert_eq!(db_to_gain(f32::NEG_INFINITY), 0.0);
        assert_eq!(gain_to_db(0.0), f32::NEG_INFINITY);
    }

    #[test]
    fn db_gain_inverse() {
        for db in [-40.0f32, -12.0, -1.5, 0.0, 3.0] {
            assert!((gain_to_db(db_to_gain(db)) - db).abs() < 1e-3);
        }
    }

    #[test]
    fn silence_floor_is_minus_eighty_db() {
        assert!((gain_to_db(SILENCE_FLOOR) + 80.0).abs() < 1e-3);
    }

    #[test]
    fn pan_is_clamped() {
        assert_eq!(clamp_pan(2.0), 1.0);
        assert_eq!(clamp_pan(-3.0), -1.0);
        assert_eq!(clamp_pan(f32::NAN), 0.0);
        assert_eq!(clamp_pan(0.25), 0.25);
    }
}
