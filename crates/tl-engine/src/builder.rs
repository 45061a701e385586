//! Snapshot to graph: one bus per track, one voice per segment.

use std::collections::{HashMap, HashSet};

use tl_ir::{db_to_gain, Project, SegmentId, Track, TrackId};

use crate::bus::{build_master_bus, build_track_bus, Bus};
use crate::error::LoadError;
use crate::graph::{AudioGraph, NodeKey, NodeKind};
use crate::param::AudioParam;
use crate::player::Player;
use crate::source::SourceBank;

/// `player → gain → pan`, feeding a track bus.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentVoice {
    pub player: NodeKey,
    pub gain: NodeKey,
    pub pan: NodeKey,
}

/// Handles of every node built for one snapshot.
#[derive(Debug)]
pub struct BuiltGraph {
    pub master: Bus,
    pub tracks: HashMap<TrackId, Bus>,
    pub voices: HashMap<SegmentId, SegmentVoice>,
}

impl BuiltGraph {
    pub fn nodes(&self) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = self.master.nodes().collect();
        for bus in self.tracks.values() {
            keys.extend(bus.nodes());
        }
        for v in self.voices.values() {
            keys.extend([v.player, v.gain, v.pan]);
        }
        keys
    }
}

/// Linear fader level of a track: the floor when silenced by mute/solo,
/// otherwise its gain, never below the floor.
pub fn track_level(track: &Track, any_soloed: bool, floor: f32) -> f32 {
    if track.is_silent(any_soloed) {
        floor
    } else {
        db_to_gain(track.gain_db).max(floor)
    }
}

/// Check references before touching the graph.
pub fn validate(project: &Project, sources: &SourceBank) -> Result<(), LoadError> {
    let mut track_ids = HashSet::new();
    for track in &project.tracks {
        if !track_ids.insert(&track.id) {
            return Err(LoadError::DuplicateTrack(track.id.clone()));
        }
    }
    let mut segment_ids = HashSet::new();
    for seg in project.segments.iter().filter(|s| s.is_live()) {
        if !segment_ids.insert(&seg.id) {
            return Err(LoadError::DuplicateSegment(seg.id.clone()));
        }
        if !track_ids.contains(&seg.track_id) {
            return Err(LoadError::UnknownTrack {
                segment: seg.id.clone(),
                track: seg.track_id.clone(),
            });
        }
        if !sources.contains(&seg.source) {
            return Err(LoadError::MissingSource {
                segment: seg.id.clone(),
                source_ref: seg.source.clone(),
            });
        }
    }
    Ok(())
}

/// Build the graph for `project`. On error every node created here is
/// disposed again, leaving `graph` as it was.
pub fn build(
    graph: &mut AudioGraph,
    project: &Project,
    sources: &SourceBank,
    sample_rate: u32,
    floor: f32,
    master_level: f32,
) -> Result<BuiltGraph, LoadError> {
    validate(project, sources)?;
    let existing: HashSet<NodeKey> = graph.keys().collect();
    let result = build_nodes(graph, project, sources, sample_rate, floor, master_level);
    if result.is_err() {
        let created: Vec<NodeKey> = graph.keys().filter(|k| !existing.contains(k)).collect();
        for key in created {
            let _ = graph.dispose(key);
        }
    }
    result
}

fn build_nodes(
    graph: &mut AudioGraph,
    project: &Project,
    sources: &SourceBank,
    sample_rate: u32,
    floor: f32,
    master_level: f32,
) -> Result<BuiltGraph, LoadError> {
    let master = build_master_bus(graph, master_level, &project.master_chain, sample_rate)?;

    let any_soloed = project.any_soloed();
    let mut tracks = HashMap::with_capacity(project.tracks.len());
    for track in &project.tracks {
        let level = track_level(track, any_soloed, floor);
        let bus = build_track_bus(graph, level, track.pan, &track.effects, sample_rate, track.id.as_str())?;
        graph.connect(bus.output, master.input)?;
        tracks.insert(track.id.clone(), bus);
    }

    let mut voices = HashMap::with_capacity(project.segments.len());
    for seg in &project.segments {
        if !seg.is_live() {
            log::warn!("skipping segment {} with duration {} ms", seg.id, seg.duration_ms);
            continue;
        }
        // Both lookups were checked by `validate`.
        let (Some(source), Some(bus)) = (sources.get(&seg.source), tracks.get(&seg.track_id)) else {
            continue;
        };
        let player = graph.add(NodeKind::Player(Player::new(source.clone(), seg, sample_rate)));
        let gain = graph.add(NodeKind::Gain(AudioParam::new(db_to_gain(seg.gain_db))));
        let pan = graph.add(NodeKind::Pan(AudioParam::new(0.0)));
        graph.connect(player, gain)?;
        graph.connect(gain, pan)?;
        graph.connect(pan, bus.input)?;
        voices.insert(seg.id.clone(), SegmentVoice { player, gain, pan });
    }

    log::debug!(
        "built graph: {} tracks, {} voices, {} master effects",
        tracks.len(),
        voices.len(),
        master.chain.len()
    );
    Ok(BuiltGraph { master, tracks, voices })
}
