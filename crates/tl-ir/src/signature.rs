//! Composition signature: the part of a snapshot that shapes the graph.
//!
//! Two snapshots with equal signatures can share one audio graph; they
//! differ at most in per-track fader state, the master chain, the loop
//! region, tempo or length, all of which can be patched in place.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::effects::EffectSpec;
use crate::project::{Project, Segment};

/// Fingerprint of track and segment composition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CompositionSignature(u64);

impl CompositionSignature {
    pub fn of(project: &Project) -> Self {
        let mut h = DefaultHasher::new();

        project.tracks.len().hash(&mut h);
        for track in &project.tracks {
            track.id.hash(&mut h);
            hash_chain(&track.effects, &mut h);
        }

        let mut segments: Vec<&Segment> = project.segments.iter().collect();
        segments.sort_by(|a, b| a.id.cmp(&b.id));
        segments.len().hash(&mut h);
        for seg in segments {
            hash_segment(seg, &mut h);
        }

        Self(h.finish())
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Field-by-field check of what the signature covers, to confirm a match.
pub(crate) fn same_composition(a: &Project, b: &Project) -> bool {
    a.tracks.len() == b.tracks.len()
        && a.tracks
            .iter()
            .zip(&b.tracks)
            .all(|(x, y)| x.id == y.id && x.effects == y.effects)
        && same_segments(&a.segments, &b.segments)
}

fn same_segments(a: &[Segment], b: &[Segment]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&Segment> = a.iter().collect();
    let mut b: Vec<&Segment> = b.iter().collect();
    a.sort_by(|x, y| x.id.cmp(&y.id));
    b.sort_by(|x, y| x.id.cmp(&y.id));
    a == b
}

fn hash_segment(seg: &Segment, h: &mut impl Hasher) {
    seg.id.hash(h);
    seg.track_id.hash(h);
    seg.source.hash(h);
    seg.start_on_timeline_ms.to_bits().hash(h);
    seg.start_in_source_ms.to_bits().hash(h);
    seg.duration_ms.to_bits().hash(h);
    seg.gain_db.to_bits().hash(h);
    seg.fades.in_ms.to_bits().hash(h);
    seg.fades.out_ms.to_bits().hash(h);
}

fn hash_chain(chain: &[EffectSpec], h: &mut impl Hasher) {
    chain.len().hash(h);
    for spec in chain {
        // Serialized form is stable for a given spec and covers opaque params.
        match serde_json::to_vec(spec) {
            Ok(bytes) => bytes.hash(h),
            Err(_) => spec.type_name().hash(h),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectKind, GainParams};
    use crate::project::{Segment, Track, TrackId};

    fn project() -> Project {
        let mut p = Project::new();
        p.tracks.push(Track::new("a", "A"));
        p.tracks.push(Track::new("b", "B"));
        p.segments.push(Segment::new("s1", "a", "src1", 0.0, 1000.0));
        p.segments.push(Segment::new("s2", "b", "src2", 250.0, 500.0));
        p
    }

    #[test]
    fn fader_state_does_not_change_signature() {
        let p = project();
        let id = TrackId::from("a");
        let q = p
            .with_track(&id, |t| {
                t.mute = true;
                t.solo = true;
                t.gain_db = -12.0;
                t.pan = 0.5;
                t.name = "renamed".into();
            })
            .unwrap();
        assert_eq!(CompositionSignature::of(&p), CompositionSignature::of(&q));
    }

    #[test]
    fn segment_order_does_not_matter() {
        let p = project();
        let mut q = p.clone();
        q.segments.reverse();
        assert_eq!(CompositionSignature::of(&p), CompositionSignature::of(&q));
    }

    #[test]
    fn moving_a_segment_changes_signature() {
        let p = project();
        let mut q = p.clone();
        q.segments[0].start_on_timeline_ms += 1.0;
        assert_ne!(CompositionSignature::of(&p), CompositionSignature::of(&q));
    }

    #[test]
    fn track_insert_chain_changes_signature() {
        let p = project();
        let q = p
            .with_track(&TrackId::from("b"), |t| {
                t.effects.push(EffectKind::Gain(GainParams { db: -3.0 }).into())
            })
            .unwrap();
        assert_ne!(CompositionSignature::of(&p), CompositionSignature::of(&q));
    }

    #[test]
    fn structural_check_agrees_with_signature() {
        let p = project();
        let mut reordered = p.clone();
        reordered.segments.reverse();
        assert!(same_composition(&p, &reordered));
        let faded = p.with_track(&TrackId::from("b"), |t| t.gain_db = -6.0).unwrap();
        assert!(same_composition(&p, &faded));

        let mut moved = p.clone();
        moved.segments[1].duration_ms += 0.5;
        assert!(!same_composition(&p, &moved));
        let mut renamed = p.clone();
        renamed.tracks[1].id = TrackId::from("c");
        assert!(!same_composition(&p, &renamed));
    }

    #[test]
    fn master_chain_is_not_composition() {
        let p = project();
        let q = p.with_master_chain(vec![EffectKind::Gain(GainParams { db: -3.0 }).into()]);
        assert_eq!(CompositionSignature::of(&p), CompositionSignature::of(&q));
    }
}
