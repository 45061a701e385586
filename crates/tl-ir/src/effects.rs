//! Effect descriptions for track inserts and the master chain.
//!
//! Wire shape is `{ "type": "<kind>", "params": { ... } }`. Types this
//! crate does not know, or known types whose params fail to parse, are
//! kept as [`OpaqueEffect`] so a single bad entry never fails snapshot
//! parsing; the engine decides what to do with them when building.

use serde::{Deserialize, Serialize};

/// One entry of an effect chain. Order in a chain is signal order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EffectSpec {
    Typed(EffectKind),
    Opaque(OpaqueEffect),
}

impl EffectSpec {
    /// The `type` tag as it appears on the wire.
    pub fn type_name(&self) -> &str {
        match self {
            EffectSpec::Typed(kind) => kind.type_name(),
            EffectSpec::Opaque(opaque) => &opaque.kind,
        }
    }
}

impl From<EffectKind> for EffectSpec {
    fn from(kind: EffectKind) -> Self {
        EffectSpec::Typed(kind)
    }
}

/// An effect entry that did not parse into a known variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpaqueEffect {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl OpaqueEffect {
    /// Re-parse as a known variant. A missing `params` object falls back
    /// to the variant's defaults.
    pub fn resolve(&self) -> Result<EffectKind, serde_json::Error> {
        let params = match &self.params {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(serde_json::json!({ "type": self.kind, "params": params }))
    }
}

/// Known effect types with their parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "lowercase")]
pub enum EffectKind {
    Reverb(ReverbParams),
    Delay(DelayParams),
    Eq(EqParams),
    Distortion(DistortionParams),
    Gain(GainParams),
    Pitch(PitchParams),
    Lowpass(LowpassParams),
}

impl EffectKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EffectKind::Reverb(_) => "reverb",
            EffectKind::Delay(_) => "delay",
            EffectKind::Eq(_) => "eq",
            EffectKind::Distortion(_) => "distortion",
            EffectKind::Gain(_) => "gain",
            EffectKind::Pitch(_) => "pitch",
            EffectKind::Lowpass(_) => "lowpass",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReverbParams {
    pub decay_sec: f32,
    pub pre_delay_ms: f32,
    pub wet: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            decay_sec: 1.5,
            pre_delay_ms: 10.0,
            wet: 0.3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelayParams {
    pub time_ms: f32,
    pub feedback: f32,
    pub wet: f32,
}

impl Default for DelayParams {
    fn default() -> Self {
        Self {
            time_ms: 250.0,
            feedback: 0.35,
            wet: 0.3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EqParams {
    pub low_db: f32,
    pub mid_db: f32,
    pub high_db: f32,
    pub low_freq_hz: f32,
    pub high_freq_hz: f32,
}

impl Default for EqParams {
    fn default() -> Self {
        Self {
            low_db: 0.0,
            mid_db: 0.0,
            high_db: 0.0,
            low_freq_hz: 400.0,
            high_freq_hz: 2500.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DistortionParams {
    pub amount: f32,
    pub wet: f32,
}

impl Default for DistortionParams {
    fn default() -> Self {
        Self { amount: 0.4, wet: 1.0 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GainParams {
    pub db: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PitchParams {
    pub semitones: f32,
    pub window_ms: f32,
    pub wet: f32,
}

impl Default for PitchParams {
    fn default() -> Self {
        Self {
            semitones: 0.0,
            window_ms: 50.0,
            wet: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LowpassParams {
    pub cutoff_hz: f32,
}

impl Default for LowpassParams {
    fn default() -> Self {
        Self { cutoff_hz: 4410.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> EffectSpec {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn known_type_parses_typed() {
        let spec = parse(r#"{ "type": "delay", "params": { "timeMs": 125, "feedback": 0.5 } }"#);
        match spec {
            EffectSpec::Typed(EffectKind::Delay(p)) => {
                assert_eq!(p.time_ms, 125.0);
                assert_eq!(p.feedback, 0.5);
                assert_eq!(p.wet, DelayParams::default().wet);
            }
            other => panic!("expected typed delay, got {:?}", other),
        }
    }

    #[test]
    fn unknown_type_is_opaque() {
        let spec = parse(r#"{ "type": "chorus", "params": { "rate": 2 } }"#);
        assert_eq!(spec.type_name(), "chorus");
        assert!(matches!(spec, EffectSpec::Opaque(_)));
    }

    #[test]
    fn missing_params_resolves_to_defaults() {
        let resolved = match parse(r#"{ "type": "reverb" }"#) {
            EffectSpec::Typed(kind) => kind,
            EffectSpec::Opaque(opaque) => opaque.resolve().unwrap(),
        };
        assert_eq!(resolved, EffectKind::Reverb(ReverbParams::default()));
    }

    #[test]
    fn malformed_known_params_stay_opaque_and_fail_resolve() {
        let spec = parse(r#"{ "type": "gain", "params": { "db": "loud" } }"#);
        let EffectSpec::Opaque(opaque) = spec else {
            panic!("expected opaque");
        };
        assert_eq!(opaque.kind, "gain");
        assert!(opaque.resolve().is_err());
    }

    #[test]
    fn typed_round_trips_wire_shape() {
        let spec = EffectSpec::from(EffectKind::Gain(GainParams { db: -6.0 }));
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["type"], "gain");
        assert_eq!(json["params"]["db"], -6.0);
    }
}
