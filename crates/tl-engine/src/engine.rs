//! Main playback engine.
//!
//! Owns the render graph, the transport and the output context. The host
//! drives it: `poll()` once per UI frame for position reporting and
//! end-of-timeline handling, `pump()` to keep the device fed.

use tl_ir::{db_to_gain, diff, EffectSpec, LoopRegion, Project, SnapshotDiff, TrackId};

use crate::audio_buffer::AudioBuffer;
use crate::builder::{self, track_level, BuiltGraph};
use crate::bus::build_master_bus;
use crate::config::{frames_to_ms, ms_to_frames, EngineConfig};
use crate::context::{AudioContext, ContextState};
use crate::error::{ContextError, EngineError, LoadError};
use crate::graph::{AudioGraph, NodeKey, NodeKind, RenderContext};
use crate::param::AudioParam;
use crate::source::SourceBank;
use crate::transport::{Transport, TransportState};

/// Externally visible engine state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Unloaded,
    Stopped,
    Playing,
    Paused,
}

/// What `update` did with a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Rebuilt,
    Patched,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransportEvent {
    pub playing: bool,
    pub position_ms: f64,
    pub bpm: f64,
}

struct Loaded {
    project: Project,
    built: BuiltGraph,
}

pub struct Engine<C: AudioContext> {
    config: EngineConfig,
    context: C,
    sample_rate: u32,
    sources: SourceBank,
    graph: AudioGraph,
    /// Permanent output node; survives every rebuild
    output: NodeKey,
    loaded: Option<Loaded>,
    transport: Transport,
    /// Master volume in linear gain, carried across rebuilds
    master_level: f32,
    ended: bool,
    /// Context frame of the next block
    now: u64,
    timeline: Vec<Option<u64>>,
    block: AudioBuffer,
    progress_listeners: Vec<Box<dyn FnMut(f64)>>,
    transport_listeners: Vec<Box<dyn FnMut(&TransportEvent)>>,
}

impl<C: AudioContext> Engine<C> {
    pub fn new(config: EngineConfig, context: C) -> Self {
        let block_size = config.block_size.max(1);
        let mut graph = AudioGraph::new(block_size);
        let output = graph.add(NodeKind::Gain(AudioParam::new(1.0)));
        Self {
            sample_rate: context.sample_rate(),
            config,
            context,
            sources: SourceBank::new(),
            graph,
            output,
            loaded: None,
            transport: Transport::new(),
            master_level: 1.0,
            ended: false,
            now: 0,
            timeline: vec![None; block_size],
            block: AudioBuffer::stereo(block_size),
            progress_listeners: Vec::new(),
            transport_listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sources(&self) -> &SourceBank {
        &self.sources
    }

    pub fn sources_mut(&mut self) -> &mut SourceBank {
        &mut self.sources
    }

    pub fn graph(&self) -> &AudioGraph {
        &self.graph
    }

    /// Handles of the live graph, if loaded.
    pub fn built(&self) -> Option<&BuiltGraph> {
        self.loaded.as_ref().map(|l| &l.built)
    }

    pub fn project(&self) -> Option<&Project> {
        self.loaded.as_ref().map(|l| &l.project)
    }

    // --- Lifecycle ---

    /// Dispose the current graph and build one for `project`. Lands
    /// stopped at position 0.
    pub fn load(&mut self, project: Project) -> Result<(), EngineError> {
        self.context.resume()?;
        self.transport.stop();
        self.dispose_graph();

        let built = builder::build(
            &mut self.graph,
            &project,
            &self.sources,
            self.sample_rate,
            self.config.silence_floor,
            self.master_level,
        )?;
        if let Err(e) = self.graph.connect(built.master.output, self.output) {
            for key in built.nodes() {
                let _ = self.graph.dispose(key);
            }
            return Err(LoadError::Graph(e).into());
        }
        self.graph.prepare();

        self.apply_loop(project.loop_region);
        self.ended = false;
        log::info!(
            "loaded project: {} tracks, {} segments, length {:?} ms",
            project.tracks.len(),
            project.segments.len(),
            project.length_ms
        );
        self.loaded = Some(Loaded { project, built });
        Ok(())
    }

    /// Bring the engine in line with `project`, rebuilding only when the
    /// composition changed.
    pub fn update(&mut self, project: Project) -> Result<LoadOutcome, EngineError> {
        let Some(loaded) = &self.loaded else {
            self.load(project)?;
            return Ok(LoadOutcome::Rebuilt);
        };
        let patch = match diff(&loaded.project, &project) {
            SnapshotDiff::Rebuild => {
                log::debug!("composition changed, rebuilding graph");
                self.load(project)?;
                return Ok(LoadOutcome::Rebuilt);
            }
            SnapshotDiff::Patch(patch) => patch,
        };
        log::debug!("patching live graph: {:?}", patch);

        if let Some(loaded) = &mut self.loaded {
            loaded.project = project;
        }
        if !patch.tracks.is_empty() || patch.mute_solo {
            self.apply_mute_solo();
        }
        for track in patch.tracks.iter().filter(|t| t.pan) {
            self.apply_track_pan(&track.id);
        }
        if patch.master_chain {
            let chain = self.project().map(|p| p.master_chain.clone()).unwrap_or_default();
            self.replace_master_chain(&chain);
        }
        if patch.loop_region {
            if let Some(region) = self.project().map(|p| p.loop_region) {
                self.apply_loop(region);
            }
        }
        if patch.timeline {
            self.clear_ended_if_before_end();
        }
        Ok(LoadOutcome::Patched)
    }

    /// Stop, drop the graph and suspend the context.
    pub fn dispose(&mut self) {
        self.transport.stop();
        self.dispose_graph();
        self.ended = false;
        if let Err(e) = self.context.suspend() {
            log::warn!("suspending audio context failed: {}", e);
        }
        log::info!("engine disposed");
    }

    fn dispose_graph(&mut self) {
        let Some(loaded) = self.loaded.take() else {
            return;
        };
        for key in loaded.built.nodes() {
            if let Err(e) = self.graph.dispose(key) {
                log::warn!("disposing node failed: {}", e);
            }
        }
    }

    fn apply_loop(&mut self, region: LoopRegion) {
        let range = region
            .bounds()
            .map(|(s, e)| (ms_to_frames(s, self.sample_rate), ms_to_frames(e, self.sample_rate)));
        self.transport.set_loop(range);
    }

    // --- Transport ---

    pub fn state(&self) -> EngineState {
        if self.loaded.is_none() {
            return EngineState::Unloaded;
        }
        match self.transport.state() {
            TransportState::Stopped => EngineState::Stopped,
            TransportState::Started => EngineState::Playing,
            TransportState::Paused => EngineState::Paused,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state() == EngineState::Playing
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn position_ms(&self) -> f64 {
        frames_to_ms(self.transport.position(), self.sample_rate)
    }

    pub fn length_ms(&self) -> Option<f64> {
        self.project().and_then(|p| p.length_ms)
    }

    fn bpm(&self) -> f64 {
        self.project().map_or(0.0, |p| p.bpm)
    }

    /// Unlock the context and start rolling after the look-ahead. At or
    /// past the end, restarts from 0.
    pub fn play(&mut self) -> Result<(), EngineError> {
        if self.loaded.is_none() {
            return Ok(());
        }
        self.context.resume()?;
        if self.transport.is_started() {
            return Ok(());
        }
        if self.ended || self.at_end() {
            self.transport.seek(0);
            self.ended = false;
        }
        let lookahead = ms_to_frames(self.config.start_lookahead_ms, self.sample_rate);
        self.transport.start(self.now + lookahead);
        log::info!("play from {:.1} ms", self.position_ms());
        self.emit_transport(true);
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.loaded.is_none() {
            return;
        }
        self.transport.pause();
        log::info!("pause at {:.1} ms", self.position_ms());
        self.emit_transport(false);
    }

    pub fn stop(&mut self) {
        if self.loaded.is_none() {
            return;
        }
        self.transport.stop();
        self.ended = false;
        log::info!("stop");
        self.emit_transport(false);
    }

    /// Seek to `ms`, clamped to `[0, length]`. While playing, the target is
    /// pushed forward by the seek latency so audio lines up with the
    /// cursor once the device catches up.
    pub fn seek_ms(&mut self, ms: f64) {
        if self.loaded.is_none() {
            return;
        }
        let length = self.length_ms();
        let clamp = |ms: f64| {
            let ms = if ms.is_nan() { 0.0 } else { ms.max(0.0) };
            length.map_or(ms, |len| ms.min(len))
        };
        let mut target = clamp(ms);
        if self.transport.is_started() {
            target = clamp(target + self.config.seek_latency_ms);
        }
        self.transport.seek(ms_to_frames(target, self.sample_rate));
        self.clear_ended_if_before_end();
    }

    fn clear_ended_if_before_end(&mut self) {
        if !self.at_end() {
            self.ended = false;
        }
    }

    /// Compared in frames so a pinned end position counts for fractional lengths.
    fn at_end(&self) -> bool {
        self.length_ms()
            .is_some_and(|len| self.transport.position() >= ms_to_frames(len, self.sample_rate))
    }

    pub fn set_loop(&mut self, start_ms: f64, end_ms: f64) {
        let Some(loaded) = &mut self.loaded else {
            return;
        };
        let region = LoopRegion::new(start_ms, end_ms);
        loaded.project = loaded.project.with_loop(region);
        self.apply_loop(region);
    }

    pub fn clear_loop(&mut self) {
        let Some(loaded) = &mut self.loaded else {
            return;
        };
        let mut region = loaded.project.loop_region;
        region.enabled = false;
        loaded.project = loaded.project.with_loop(region);
        self.transport.set_loop(None);
    }

    // --- Track and master controls ---

    /// Apply `update` to one track of the live snapshot. Unknown tracks
    /// and an unloaded engine are ignored.
    fn update_track(&mut self, id: &TrackId, update: impl FnOnce(&mut tl_ir::Track)) -> bool {
        let Some(loaded) = &mut self.loaded else {
            return false;
        };
        match loaded.project.with_track(id, update) {
            Some(next) => {
                loaded.project = next;
                true
            }
            None => {
                log::warn!("ignoring control for unknown track {}", id);
                false
            }
        }
    }

    pub fn set_track_mute(&mut self, id: &TrackId, mute: bool) {
        if self.update_track(id, |t| t.mute = mute) {
            self.apply_mute_solo();
        }
    }

    pub fn set_track_solo(&mut self, id: &TrackId, solo: bool) {
        if self.update_track(id, |t| t.solo = solo) {
            self.apply_mute_solo();
        }
    }

    pub fn set_track_gain_db(&mut self, id: &TrackId, db: f32) {
        if self.update_track(id, |t| t.gain_db = db) {
            self.apply_mute_solo();
        }
    }

    pub fn set_track_pan(&mut self, id: &TrackId, pan: f32) {
        if self.update_track(id, |t| t.pan = tl_ir::clamp_pan(pan)) {
            self.apply_track_pan(id);
        }
    }

    /// Ramp every track bus to its effective level. Scheduled ramps are
    /// cancelled first so rapid toggles never stack.
    fn apply_mute_solo(&mut self) {
        let Some(loaded) = &self.loaded else {
            return;
        };
        let any_soloed = loaded.project.any_soloed();
        let end = self.now + ms_to_frames(self.config.mute_ramp_ms, self.sample_rate).max(1);
        for track in &loaded.project.tracks {
            let Some(bus) = loaded.built.tracks.get(&track.id) else {
                continue;
            };
            let target = track_level(track, any_soloed, self.config.silence_floor);
            if let Some(param) = self.graph.param_mut(bus.gain) {
                param.cancel_and_hold(self.now);
                param.exponential_ramp_to(target, end, self.config.silence_floor);
            }
        }
    }

    fn apply_track_pan(&mut self, id: &TrackId) {
        let Some(loaded) = &self.loaded else {
            return;
        };
        let (Some(track), Some(bus)) = (loaded.project.track(id), loaded.built.tracks.get(id)) else {
            return;
        };
        let end = self.now + ms_to_frames(self.config.mute_ramp_ms, self.sample_rate).max(1);
        if let Some(param) = self.graph.param_mut(bus.pan) {
            param.cancel_and_hold(self.now);
            param.linear_ramp_to(tl_ir::clamp_pan(track.pan), end);
        }
    }

    pub fn set_master_effects(&mut self, chain: Vec<EffectSpec>) {
        let Some(loaded) = &mut self.loaded else {
            return;
        };
        loaded.project = loaded.project.with_master_chain(chain.clone());
        self.replace_master_chain(&chain);
    }

    /// Swap in a new master bus built from `chain` at the master volume's
    /// target level, even mid-ramp. Track outputs move to the new bus before the old one
    /// is disposed.
    fn replace_master_chain(&mut self, chain: &[EffectSpec]) {
        let Some(loaded) = &mut self.loaded else {
            return;
        };
        let new = match build_master_bus(&mut self.graph, self.master_level, chain, self.sample_rate) {
            Ok(bus) => bus,
            Err(e) => {
                log::warn!("building master chain failed, keeping the old one: {}", e);
                return;
            }
        };
        for bus in loaded.built.tracks.values() {
            let moved = self
                .graph
                .disconnect(bus.output)
                .and_then(|_| self.graph.connect(bus.output, new.input));
            if let Err(e) = moved {
                log::warn!("rerouting track bus failed: {}", e);
            }
        }
        if let Err(e) = self.graph.connect(new.output, self.output) {
            log::warn!("connecting master bus failed: {}", e);
        }

        let old = core::mem::replace(&mut loaded.built.master, new);
        for key in old.nodes() {
            if let Err(e) = self.graph.dispose(key) {
                log::warn!("disposing old master node failed: {}", e);
            }
        }
        self.graph.prepare();
        log::debug!("master chain replaced ({} effects)", chain.len());
    }

    /// The user's master volume.
    pub fn set_master_gain_db(&mut self, db: f32) {
        self.master_level = db_to_gain(db).max(self.config.silence_floor);
        let Some(loaded) = &self.loaded else {
            return;
        };
        let end = self.now + ms_to_frames(self.config.mute_ramp_ms, self.sample_rate).max(1);
        if let Some(param) = self.graph.param_mut(loaded.built.master.gain) {
            param.cancel_and_hold(self.now);
            param.exponential_ramp_to(self.master_level, end, self.config.silence_floor);
        }
    }

    /// Ramp the final output down to the floor or back to unity.
    pub fn set_output_muted(&mut self, muted: bool) {
        let target = if muted { self.config.silence_floor } else { 1.0 };
        let end = self.now + ms_to_frames(self.config.mute_ramp_ms, self.sample_rate).max(1);
        if let Some(param) = self.graph.param_mut(self.output) {
            param.cancel_and_hold(self.now);
            param.exponential_ramp_to(target, end, self.config.silence_floor);
        }
    }

    // --- Listeners ---

    pub fn on_progress(&mut self, listener: impl FnMut(f64) + 'static) {
        self.progress_listeners.push(Box::new(listener));
    }

    pub fn on_transport(&mut self, listener: impl FnMut(&TransportEvent) + 'static) {
        self.transport_listeners.push(Box::new(listener));
    }

    fn emit_transport(&mut self, playing: bool) {
        self.emit_transport_at(playing, self.position_ms());
    }

    fn emit_transport_at(&mut self, playing: bool, position_ms: f64) {
        let event = TransportEvent {
            playing,
            position_ms,
            bpm: self.bpm(),
        };
        for listener in &mut self.transport_listeners {
            listener(&event);
        }
    }

    // --- Driving ---

    /// One tick of the position loop: report progress, and auto-pause
    /// once when playback reaches the end of the timeline.
    pub fn poll(&mut self) {
        if self.loaded.is_none() {
            return;
        }
        let mut position = self.position_ms();
        if let Some(len) = self.length_ms() {
            if self.transport.is_started() && self.at_end() && !self.ended {
                self.ended = true;
                self.transport.pause();
                self.transport.seek(ms_to_frames(len, self.sample_rate));
                log::info!("reached end of timeline at {:.1} ms", len);
                self.emit_transport_at(false, len);
            }
            if position >= len {
                position = len;
            }
        }
        for listener in &mut self.progress_listeners {
            listener(position);
        }
    }

    /// Render the next block into the engine's own buffer.
    fn render_next(&mut self) {
        let frames = self.timeline.len();
        for (i, slot) in self.timeline.iter_mut().enumerate() {
            *slot = self.transport.tick(self.now + i as u64);
        }
        let ctx = RenderContext {
            now: self.now,
            timeline: &self.timeline,
        };
        self.graph.render(&ctx);
        match self.graph.output(self.output) {
            Some(out) => self.block.copy_from(out),
            None => self.block.silence(),
        }
        self.now += frames as u64;
    }

    /// Render one block and copy it into `out`.
    pub fn render_block(&mut self, out: &mut AudioBuffer) {
        self.render_next();
        out.copy_from(&self.block);
    }

    /// Render ahead until the context holds `render_ahead_ms` of audio.
    /// Returns the number of blocks written.
    pub fn pump(&mut self) -> Result<usize, ContextError> {
        if self.context.state() != ContextState::Running {
            return Ok(0);
        }
        let target = ms_to_frames(self.config.render_ahead_ms, self.sample_rate) as usize;
        let mut blocks = 0;
        while self.context.queued_frames() < target {
            self.render_next();
            self.context.write(&self.block)?;
            blocks += 1;
        }
        Ok(blocks)
    }
}
