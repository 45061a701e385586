//! Segment voice: reads a window of a source buffer in timeline sync.

use std::sync::Arc;

use tl_ir::Segment;

use crate::audio_buffer::AudioBuffer;
use crate::config::ms_to_frames;
use crate::source::SourceBuffer;

/// A source window scheduled on the timeline, in engine frames.
///
/// The player is active for timeline frames `[start, start + duration)`
/// and reads the source at `offset + (t - start) * rate_ratio`, where the
/// offset and ratio are in source frames.
pub struct Player {
    source: Arc<SourceBuffer>,
    start: u64,
    duration: u64,
    offset: f64,
    rate_ratio: f64,
    fade_in: u64,
    fade_out: u64,
}

impl Player {
    pub fn new(source: Arc<SourceBuffer>, segment: &Segment, sample_rate: u32) -> Self {
        let duration = ms_to_frames(segment.duration_ms, sample_rate);
        let source_rate = source.sample_rate() as f64;
        Self {
            start: ms_to_frames(segment.start_on_timeline_ms, sample_rate),
            duration,
            offset: segment.start_in_source_ms.max(0.0) * source_rate / 1000.0,
            rate_ratio: source_rate / sample_rate as f64,
            fade_in: ms_to_frames(segment.fades.in_ms, sample_rate).min(duration),
            fade_out: ms_to_frames(segment.fades.out_ms, sample_rate).min(duration),
            source,
        }
    }

    pub fn start_frame(&self) -> u64 {
        self.start
    }

    pub fn end_frame(&self) -> u64 {
        self.start + self.duration
    }

    pub fn is_active_at(&self, t: u64) -> bool {
        t >= self.start && t < self.end_frame()
    }

    fn envelope(&self, rel: u64) -> f32 {
        let mut env = 1.0f32;
        if rel < self.fade_in {
            env = rel as f32 / self.fade_in as f32;
        }
        let remaining = self.duration - rel;
        if remaining < self.fade_out {
            env = env.min(remaining as f32 / self.fade_out as f32);
        }
        env
    }

    /// Write the frames of this window that fall in `timeline` into `out`.
    pub fn render(&self, timeline: &[Option<u64>], out: &mut AudioBuffer) {
        let (left, right) = out.stereo_mut();
        for (i, t) in timeline.iter().enumerate() {
            let Some(t) = *t else { continue };
            if !self.is_active_at(t) {
                continue;
            }
            let rel = t - self.start;
            let pos = self.offset + rel as f64 * self.rate_ratio;
            let env = self.envelope(rel);
            left[i] = self.source.sample(0, pos) * env;
            right[i] = self.source.sample(1, pos) * env;
        }
    }
}
