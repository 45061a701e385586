//! Decoded source audio and the bank segments resolve it from.

use std::collections::HashMap;
use std::sync::Arc;

use tl_ir::{gain_to_db, SourceRef};

/// Immutable decoded audio, planar f32. Shared between every player that
/// reads it.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
    frames: usize,
}

/// Summary of a source buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceInfo {
    pub duration_ms: f64,
    pub channels: usize,
    pub sample_rate: u32,
    pub frame_count: usize,
    /// Peak level in dBFS (`-inf` for silence)
    pub peak_dbfs: f32,
}

impl SourceBuffer {
    /// Build from per-channel sample vectors. Channels are truncated to the
    /// shortest one.
    pub fn new(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for ch in &mut channels {
            ch.truncate(frames);
        }
        Self {
            sample_rate: sample_rate.max(1),
            channels,
            frames,
        }
    }

    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self::new(sample_rate, vec![samples])
    }

    pub fn from_interleaved(sample_rate: u32, channels: usize, data: &[f32]) -> Self {
        let channels = channels.max(1);
        let planes = (0..channels)
            .map(|ch| data.iter().skip(ch).step_by(channels).copied().collect())
            .collect();
        Self::new(sample_rate, planes)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn duration_ms(&self) -> f64 {
        self.frames as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Linearly interpolated sample at fractional frame `pos`. Outside the
    /// buffer reads as silence. Channels past the last one reuse it, so a
    /// mono source feeds both sides of a stereo bus.
    pub fn sample(&self, channel: usize, pos: f64) -> f32 {
        let Some(data) = self.channels.get(channel).or_else(|| self.channels.last()) else {
            return 0.0;
        };
        if !(pos >= 0.0) {
            return 0.0;
        }
        let idx = pos as usize;
        if idx >= self.frames {
            return 0.0;
        }
        let frac = (pos - idx as f64) as f32;
        let a = data[idx];
        let b = data.get(idx + 1).copied().unwrap_or(0.0);
        a + (b - a) * frac
    }

    pub fn info(&self) -> SourceInfo {
        let peak = self
            .channels
            .iter()
            .flat_map(|ch| ch.iter())
            .fold(0.0f32, |m, s| m.max(s.abs()));
        SourceInfo {
            duration_ms: self.duration_ms(),
            channels: self.channels.len(),
            sample_rate: self.sample_rate,
            frame_count: self.frames,
            peak_dbfs: gain_to_db(peak),
        }
    }
}

/// Decoded sources keyed by the `sourceRef` segments carry.
#[derive(Clone, Debug, Default)]
pub struct SourceBank {
    sources: HashMap<SourceRef, Arc<SourceBuffer>>,
}

impl SourceBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, returning the one it replaced.
    pub fn insert(&mut self, key: impl Into<SourceRef>, source: SourceBuffer) -> Option<Arc<SourceBuffer>> {
        self.sources.insert(key.into(), Arc::new(source))
    }

    pub fn get(&self, key: &SourceRef) -> Option<&Arc<SourceBuffer>> {
        self.sources.get(key)
    }

    pub fn contains(&self, key: &SourceRef) -> bool {
        self.sources.contains_key(key)
    }

    pub fn remove(&mut self, key: &SourceRef) -> Option<Arc<SourceBuffer>> {
        self.sources.remove(key)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
