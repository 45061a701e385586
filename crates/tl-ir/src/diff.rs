//! Rebuild-or-patch decision between two snapshots.

use crate::level::clamp_pan;
use crate::project::{Project, TrackId};
use crate::signature::{same_composition, CompositionSignature};

/// How to bring a live graph built from `prev` in line with `next`.
#[derive(Clone, Debug, PartialEq)]
pub enum SnapshotDiff {
    /// Composition changed: dispose the graph and build a new one.
    Rebuild,
    /// Same composition: adjust live parameters only.
    Patch(PatchSet),
}

/// Parameter changes that can be applied to an existing graph.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatchSet {
    /// Tracks whose gain or pan differ
    pub tracks: Vec<TrackPatch>,
    /// Any mute or solo flag differs; levels of every track must be re-resolved
    pub mute_solo: bool,
    pub master_chain: bool,
    pub loop_region: bool,
    /// Tempo or length differ (metadata only, no graph work)
    pub timeline: bool,
}

impl PatchSet {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
            && !self.mute_solo
            && !self.master_chain
            && !self.loop_region
            && !self.timeline
    }
}

/// Per-track parameter change.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackPatch {
    pub id: TrackId,
    pub gain: bool,
    pub pan: bool,
}

/// Compare two snapshots.
pub fn diff(prev: &Project, next: &Project) -> SnapshotDiff {
    let signatures_match = CompositionSignature::of(prev) == CompositionSignature::of(next);
    diff_with(prev, next, signatures_match)
}

fn diff_with(prev: &Project, next: &Project, signatures_match: bool) -> SnapshotDiff {
    // A hash match alone is not proof; confirm before patching.
    if !signatures_match || !same_composition(prev, next) {
        return SnapshotDiff::Rebuild;
    }

    let mut patch = PatchSet::default();
    // Same composition implies the same track ids in the same order.
    for (old, new) in prev.tracks.iter().zip(&next.tracks) {
        if old.mute != new.mute || old.solo != new.solo {
            patch.mute_solo = true;
        }
        let gain = old.gain_db.to_bits() != new.gain_db.to_bits();
        let pan = clamp_pan(old.pan).to_bits() != clamp_pan(new.pan).to_bits();
        if gain || pan {
            patch.tracks.push(TrackPatch {
                id: new.id.clone(),
                gain,
                pan,
            });
        }
    }
    patch.master_chain = prev.master_chain != next.master_chain;
    patch.loop_region = prev.loop_region != next.loop_region;
    patch.timeline = prev.length_ms != next.length_ms
        || prev.bpm.to_bits() != next.bpm.to_bits()
        || prev.time_signature != next.time_signature;

    SnapshotDiff::Patch(patch)
}
