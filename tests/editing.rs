//! Segment editing and snapshot handling through the public IR API.

use tl_ir::{
    apply_cut, apply_trim, diff, edit_track, CompositionSignature, EditError, EditMode, EffectSpec, Project,
    Segment, SegmentEdit, SnapshotDiff, TrackId, UndoStack,
};

const SNAPSHOT: &str = r#"{
    "bpm": 96,
    "timeSignature": [3, 4],
    "tracks": [
        { "id": "vox", "name": "Vocals", "gainDb": -2.5, "pan": 0.25, "mute": false, "solo": false,
          "effects": [
            { "type": "reverb", "params": { "decaySec": 2.0, "wet": 0.4 } },
            { "type": "flanger", "params": { "rate": 3 } }
          ] },
        { "id": "gtr", "name": "Guitar" }
    ],
    "segments": [
        { "id": "v1", "trackId": "vox", "sourceRef": "take-3", "startOnTimelineMs": 0,
          "startInSourceMs": 250, "durationMs": 5000, "fades": { "inMs": 20, "outMs": 40 } },
        { "id": "g1", "trackId": "gtr", "sourceRef": "riff", "startOnTimelineMs": 1000, "durationMs": 2000 }
    ],
    "loop": { "enabled": true, "startMs": 500, "endMs": 1500 },
    "masterChain": [ { "type": "eq", "params": { "lowDb": 3 } } ]
}"#;

fn seg(id: &str, start: f64, duration: f64) -> Segment {
    Segment::new(id, "t", "src", start, duration)
}

#[test]
fn snapshot_json_parses_with_defaults() {
    let p = Project::from_json(SNAPSHOT).unwrap();
    assert_eq!(p.bpm, 96.0);
    assert_eq!(p.time_signature.beats_per_bar(), 3);
    assert_eq!(p.length_ms, None);
    assert_eq!(p.derived_length_ms(), 5000.0);
    assert_eq!(p.loop_region.bounds(), Some((500.0, 1500.0)));

    let vox = &p.tracks[0];
    assert_eq!(vox.gain_db, -2.5);
    assert_eq!(vox.effects.len(), 2);
    assert_eq!(vox.effects[0].type_name(), "reverb");
    assert!(matches!(vox.effects[1], EffectSpec::Opaque(_)));
    assert_eq!(vox.effects[1].type_name(), "flanger");

    let gtr = &p.tracks[1];
    assert_eq!(gtr.gain_db, 0.0);
    assert!(!gtr.mute);

    assert_eq!(p.segments[0].fades.out_ms, 40.0);
    assert_eq!(p.segments[0].source.as_str(), "take-3");
}

#[test]
fn snapshot_survives_a_json_round_trip() {
    let p = Project::from_json(SNAPSHOT).unwrap().with_derived_length();
    let again = Project::from_json(&p.to_json_pretty().unwrap()).unwrap();
    assert_eq!(p, again);
}

#[test]
fn trim_keeps_selection_and_shifts_to_zero() {
    let mut full = seg("a", 0.0, 5000.0);
    full.start_in_source_ms = 0.0;
    let result = apply_trim(&[full], 1000.0, 3000.0).unwrap();

    assert_eq!(result.kept.len(), 1);
    let kept = &result.kept[0];
    assert_eq!(kept.start_on_timeline_ms, 0.0);
    assert_eq!(kept.duration_ms, 2000.0);
    assert_eq!(kept.start_in_source_ms, 1000.0);
}

#[test]
fn cut_leaves_the_gap() {
    let result = apply_cut(&[seg("a", 0.0, 5000.0)], 1000.0, 3000.0);

    let mut kept: Vec<_> = result
        .kept
        .iter()
        .map(|s| (s.start_on_timeline_ms, s.duration_ms, s.start_in_source_ms))
        .collect();
    kept.sort_by(|a, b| a.0.total_cmp(&b.0));
    assert_eq!(kept, vec![(0.0, 1000.0, 0.0), (3000.0, 2000.0, 3000.0)]);

    assert_eq!(result.removed.len(), 1);
    assert_eq!(result.removed[0].start_on_timeline_ms, 1000.0);
    assert_eq!(result.removed[0].duration_ms, 2000.0);
}

#[test]
fn cut_piece_ids_are_unique() {
    let result = apply_cut(&[seg("a", 0.0, 5000.0)], 1000.0, 3000.0);
    let mut ids: Vec<_> = result.kept.iter().chain(&result.removed).map(|s| s.id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[test]
fn trim_outside_every_segment_is_rejected() {
    let segments = [seg("a", 0.0, 1000.0), seg("b", 2000.0, 500.0)];
    assert!(apply_trim(&segments, 1200.0, 1800.0).is_none());

    let mut p = Project::new();
    p.tracks.push(tl_ir::Track::new("t", "T"));
    p.segments.extend(segments);
    assert_eq!(
        edit_track(&p, &TrackId::from("t"), 1200.0, 1800.0, EditMode::Trim).unwrap_err(),
        EditError::EmptyTrim
    );
}

#[test]
fn invalid_selections_are_rejected() {
    let mut p = Project::new();
    p.tracks.push(tl_ir::Track::new("t", "T"));
    p.segments.push(seg("a", 0.0, 1000.0));
    let t = TrackId::from("t");

    for (start, end) in [(500.0, 500.0), (800.0, 200.0), (-1.0, 10.0), (f64::NAN, 10.0)] {
        assert!(matches!(
            edit_track(&p, &t, start, end, EditMode::Cut),
            Err(EditError::InvalidSelection { .. })
        ));
    }
    assert_eq!(
        edit_track(&p, &TrackId::from("nope"), 0.0, 10.0, EditMode::Cut).unwrap_err(),
        EditError::UnknownTrack(TrackId::from("nope"))
    );
}

#[test]
fn edits_only_touch_the_selected_track() {
    let p = Project::from_json(SNAPSHOT).unwrap();
    let (next, _) = edit_track(&p, &TrackId::from("vox"), 0.0, 1000.0, EditMode::Cut).unwrap();

    let gtr_id = TrackId::from("gtr");
    let gtr: Vec<_> = next.segments_on(&gtr_id).collect();
    assert_eq!(gtr.len(), 1);
    assert_eq!(gtr[0], &p.segments[1]);
    assert_eq!(next.length_ms, Some(5000.0));
    assert_eq!(diff(&p, &next), SnapshotDiff::Rebuild);
    assert_ne!(CompositionSignature::of(&p), CompositionSignature::of(&next));
}

#[test]
fn fader_changes_patch_instead_of_rebuilding() {
    let p = Project::from_json(SNAPSHOT).unwrap();
    let next = p
        .with_track(&TrackId::from("gtr"), |t| {
            t.solo = true;
            t.gain_db = 3.0;
        })
        .unwrap();
    match diff(&p, &next) {
        SnapshotDiff::Patch(patch) => {
            assert!(patch.mute_solo);
            assert_eq!(patch.tracks.len(), 1);
            assert!(patch.tracks[0].gain);
            assert!(!patch.tracks[0].pan);
        }
        SnapshotDiff::Rebuild => panic!("fader change rebuilt the graph"),
    }
}

#[test]
fn undo_stack_walks_back_and_forth() {
    let mut history = UndoStack::new();
    let before = vec![seg("a", 0.0, 5000.0)];
    let result = apply_cut(&before, 1000.0, 3000.0);
    history.push(SegmentEdit {
        track_id: TrackId::from("t"),
        before: before.clone(),
        after: result.kept.clone(),
        removed: result.removed.clone(),
    });

    assert_eq!(history.undo().map(|e| e.before.clone()), Some(before));
    assert!(history.undo().is_none());
    assert_eq!(history.redo().map(|e| e.after.len()), Some(2));
    assert!(!history.can_redo());
}
