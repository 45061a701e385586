//! Static gain stage.

use tl_ir::{db_to_gain, GainParams};

use super::{check, Effect};
use crate::audio_buffer::AudioBuffer;
use crate::error::EffectError;

pub struct Gain {
    gain: f32,
}

impl Gain {
    pub fn new(params: &GainParams) -> Result<Self, EffectError> {
        let db = check("gain", "db", params.db, -60.0..=24.0)?;
        Ok(Self { gain: db_to_gain(db) })
    }
}

impl Effect for Gain {
    fn name(&self) -> &'static str {
        "gain"
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        buffer.apply_gain(self.gain);
    }

    fn reset(&mut self) {}
}
