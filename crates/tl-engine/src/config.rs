//! Engine tuning knobs.

use serde::{Deserialize, Serialize};
use tl_ir::SILENCE_FLOOR;

/// Timing and rendering parameters for [`Engine`](crate::Engine).
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Rate for offline contexts. Device contexts report their own.
    pub sample_rate: u32,
    /// Frames rendered per graph pass
    pub block_size: usize,
    /// Delay between `play()` and the first audible frame
    pub start_lookahead_ms: f64,
    /// Added to seek targets while playing so the jump lands where the
    /// listener will be once the device catches up
    pub seek_latency_ms: f64,
    /// Length of the gain ramp on mute/solo/level changes
    pub mute_ramp_ms: f64,
    /// Linear gain standing in for silence in exponential ramps
    pub silence_floor: f32,
    /// How far ahead of the device `pump()` keeps the queue filled
    pub render_ahead_ms: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 128,
            start_lookahead_ms: 50.0,
            seek_latency_ms: 20.0,
            mute_ramp_ms: 10.0,
            silence_floor: SILENCE_FLOOR,
            render_ahead_ms: 100.0,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Milliseconds to whole frames, rounding to nearest. Negative and NaN map to 0.
pub fn ms_to_frames(ms: f64, sample_rate: u32) -> u64 {
    if !(ms > 0.0) {
        return 0;
    }
    libm::round(ms * sample_rate as f64 / 1000.0) as u64
}

pub fn frames_to_ms(frames: u64, sample_rate: u32) -> f64 {
    frames as f64 * 1000.0 / sample_rate as f64
}
