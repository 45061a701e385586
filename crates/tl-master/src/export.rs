//! Offline bounce of a project to 16-bit stereo WAV.

use std::io::Write;

use tl_engine::{
    ms_to_frames, AudioBuffer, Engine, EngineConfig, EngineError, Frame, OfflineContext, SourceBank,
};
use tl_ir::{db_to_gain, Project};

use crate::wav::write_wav;
use crate::SessionError;

/// Peak level normalization aims for, in dBFS.
pub const NORMALIZE_PEAK_DB: f32 = -0.1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExportSettings {
    pub sample_rate: u32,
    /// Scale so the loudest sample sits at [`NORMALIZE_PEAK_DB`].
    pub normalize: bool,
    /// Post gain, applied after normalization
    pub gain_db: f32,
    /// Extra render time past the timeline end, for effect tails
    pub tail_ms: f64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            normalize: false,
            gain_db: 0.0,
            tail_ms: 0.0,
        }
    }
}

/// Render `[0, length + tail)` of `project` to interleaved stereo floats.
///
/// Uses the same graph as live playback. The loop region is ignored.
pub fn render_interleaved(
    project: &Project,
    sources: &SourceBank,
    config: &EngineConfig,
    settings: &ExportSettings,
) -> Result<Vec<f32>, EngineError> {
    let config = EngineConfig {
        sample_rate: settings.sample_rate,
        start_lookahead_ms: 0.0,
        ..config.clone()
    };
    let mut engine = Engine::new(config, OfflineContext::new(settings.sample_rate));
    *engine.sources_mut() = sources.clone();

    let mut region = project.loop_region;
    region.enabled = false;
    engine.load(project.with_loop(region))?;
    engine.play()?;

    let length_ms = project.length_ms.unwrap_or_else(|| project.derived_length_ms());
    let total = ms_to_frames(length_ms + settings.tail_ms.max(0.0), settings.sample_rate) as usize;
    log::info!("exporting {} frames at {} Hz", total, settings.sample_rate);

    let mut block = AudioBuffer::stereo(engine.config().block_size.max(1));
    let mut out = Vec::with_capacity(total * 2 + block.frames() * 2);
    while out.len() < total * 2 {
        engine.render_block(&mut block);
        block.append_interleaved(&mut out);
    }
    out.truncate(total * 2);
    engine.dispose();
    Ok(out)
}

/// Apply normalization and post gain, then quantize.
pub fn finish(samples: &[f32], settings: &ExportSettings) -> Vec<Frame> {
    let mut gain = db_to_gain(settings.gain_db);
    if settings.normalize {
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        if peak > 0.0 {
            gain *= db_to_gain(NORMALIZE_PEAK_DB) / peak;
        }
    }
    samples
        .chunks_exact(2)
        .map(|lr| Frame::from_f32(lr[0] * gain, lr[1] * gain))
        .collect()
}

/// Render and encode. Returns the number of frames written.
pub fn export_wav(
    w: &mut impl Write,
    project: &Project,
    sources: &SourceBank,
    config: &EngineConfig,
    settings: &ExportSettings,
) -> Result<usize, SessionError> {
    let samples = render_interleaved(project, sources, config, settings)?;
    let frames = finish(&samples, settings);
    write_wav(w, &frames, settings.sample_rate)?;
    Ok(frames.len())
}
