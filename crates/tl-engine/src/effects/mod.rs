//! Insert effects for track and master chains.

mod delay;
mod distortion;
mod eq;
mod gain;
mod lowpass;
mod pitch;
mod reverb;

use core::ops::RangeInclusive;

use tl_ir::{EffectKind, EffectSpec};

use crate::audio_buffer::AudioBuffer;
use crate::error::EffectError;

pub use delay::Delay;
pub use distortion::Distortion;
pub use eq::ThreeBandEq;
pub use gain::Gain;
pub use lowpass::Lowpass;
pub use pitch::PitchShift;
pub use reverb::Reverb;

/// An in-place stereo processor in an effect chain.
///
/// `process` runs on the render path and must not allocate; any delay
/// lines are sized at construction.
pub trait Effect: Send {
    fn name(&self) -> &'static str;
    fn process(&mut self, buffer: &mut AudioBuffer);
    /// Clear internal state (delay lines, filter memory).
    fn reset(&mut self);
}

/// Instantiate an effect spec at `sample_rate`.
///
/// Unknown types and out-of-range parameters are errors; chain builders
/// skip the entry and keep going.
pub fn build_effect(spec: &EffectSpec, sample_rate: u32) -> Result<Box<dyn Effect>, EffectError> {
    let kind = match spec {
        EffectSpec::Typed(kind) => kind.clone(),
        EffectSpec::Opaque(opaque) => opaque
            .resolve()
            .map_err(|_| EffectError::Unsupported(opaque.kind.clone()))?,
    };
    let sr = sample_rate as f32;
    Ok(match kind {
        EffectKind::Reverb(p) => Box::new(Reverb::new(&p, sample_rate)?),
        EffectKind::Delay(p) => Box::new(Delay::new(&p, sample_rate)?),
        EffectKind::Eq(p) => Box::new(ThreeBandEq::new(&p, sr)?),
        EffectKind::Distortion(p) => Box::new(Distortion::new(&p)?),
        EffectKind::Gain(p) => Box::new(Gain::new(&p)?),
        EffectKind::Pitch(p) => Box::new(PitchShift::new(&p, sample_rate)?),
        EffectKind::Lowpass(p) => Box::new(Lowpass::new(&p, sr)?),
    })
}

/// Accept `value` if finite and inside `range`.
pub(crate) fn check(
    effect: &'static str,
    param: &'static str,
    value: f32,
    range: RangeInclusive<f32>,
) -> Result<f32, EffectError> {
    if value.is_finite() && range.contains(&value) {
        Ok(value)
    } else {
        Err(EffectError::InvalidParam { effect, param, value })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tl_ir::{DelayParams, OpaqueEffect};

    #[test]
    fn builds_every_known_kind() {
        let kinds = [
            EffectKind::Reverb(Default::default()),
            EffectKind::Delay(Default::default()),
            EffectKind::Eq(Default::default()),
            EffectKind::Distortion(Default::default()),
            EffectKind::Gain(Default::default()),
            EffectKind::Pitch(Default::default()),
            EffectKind::Lowpass(Default::default()),
        ];
        for kind in kinds {
            let name = kind.type_name();
            let effect = build_effect(&kind.into(), 48_000).unwrap();
            assert_eq!(effect.name(), name);
        }
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let spec = EffectSpec::Opaque(OpaqueEffect {
            kind: "flanger".into(),
            params: serde_json::Value::Null,
        });
        assert_eq!(
            build_effect(&spec, 48_000).err(),
            Some(EffectError::Unsupported("flanger".into()))
        );
    }

    #[test]
    fn opaque_known_type_resolves() {
        let spec = EffectSpec::Opaque(OpaqueEffect {
            kind: "gain".into(),
            params: serde_json::Value::Null,
        });
        assert_eq!(build_effect(&spec, 48_000).unwrap().name(), "gain");
    }

    #[test]
    fn out_of_range_param_is_rejected() {
        let spec = EffectKind::Delay(DelayParams {
            feedback: 1.5,
            ..Default::default()
        });
        assert!(matches!(
            build_effect(&spec.into(), 48_000),
            Err(EffectError::InvalidParam { param: "feedback", .. })
        ));
    }

    #[test]
    fn check_rejects_nan() {
        assert!(check("x", "y", f32::NAN, 0.0..=1.0).is_err());
        assert_eq!(check("x", "y", 0.5, 0.0..=1.0), Ok(0.5));
    }
}
