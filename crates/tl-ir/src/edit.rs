//! Non-destructive trim and cut of one track's segments.
//!
//! Edits only reslice timeline segments; source audio is never touched.
//! Every piece that leaves the track is reported in `removed` so callers
//! can keep it for undo. Slices of zero or negative length are dropped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::project::{Project, Segment, SegmentId, TrackId};

/// Which edit to apply to a selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    /// Keep only the selection, moved to timeline 0.
    Trim,
    /// Erase the selection, leaving a gap.
    Cut,
}

/// Segments after an edit, and the pieces taken out.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EditResult {
    pub kept: Vec<Segment>,
    pub removed: Vec<Segment>,
}

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("invalid selection {start_ms}..{end_ms} ms")]
    InvalidSelection { start_ms: f64, end_ms: f64 },
    #[error("selection does not overlap any segment; trimming would empty the track")]
    EmptyTrim,
    #[error("unknown track {0}")]
    UnknownTrack(TrackId),
}

fn valid_selection(sel_start: f64, sel_end: f64) -> bool {
    sel_start.is_finite() && sel_end.is_finite() && sel_start >= 0.0 && sel_start < sel_end
}

/// Copy the `[from, to)` timeline window of `seg`, placed at `timeline_start`.
///
/// A fade survives only on an edge shared with the original segment.
fn slice(seg: &Segment, from: f64, to: f64, timeline_start: f64, id: SegmentId) -> Option<Segment> {
    let duration = to - from;
    if !(duration > 0.0) {
        return None;
    }
    let mut piece = seg.clone();
    piece.id = id;
    piece.start_on_timeline_ms = timeline_start;
    piece.start_in_source_ms = seg.start_in_source_ms + (from - seg.start_on_timeline_ms);
    piece.duration_ms = duration;
    piece.fades.in_ms = if from <= seg.start_on_timeline_ms {
        seg.fades.in_ms.min(duration)
    } else {
        0.0
    };
    piece.fades.out_ms = if to >= seg.end_on_timeline_ms() {
        seg.fades.out_ms.min(duration)
    } else {
        0.0
    };
    Some(piece)
}

/// Keep only `[sel_start, sel_end)`, re-based so `sel_start` becomes 0.
///
/// Returns `None` when the selection is invalid or nothing would be kept.
pub fn apply_trim(segments: &[Segment], sel_start: f64, sel_end: f64) -> Option<EditResult> {
    if !valid_selection(sel_start, sel_end) {
        return None;
    }

    let mut result = EditResult::default();
    for seg in segments.iter().filter(|s| s.is_live()) {
        let seg_start = seg.start_on_timeline_ms;
        let seg_end = seg.end_on_timeline_ms();
        let inter_start = seg_start.max(sel_start);
        let inter_end = seg_end.min(sel_end);

        if inter_end <= inter_start {
            result.removed.push(seg.clone());
            continue;
        }

        result.kept.extend(slice(seg, inter_start, inter_end, inter_start - sel_start, seg.id.clone()));
        result.removed.extend(slice(seg, seg_start, inter_start, seg_start, seg.id.slice("pre")));
        result.removed.extend(slice(seg, inter_end, seg_end, inter_end, seg.id.slice("post")));
    }

    if result.kept.is_empty() {
        None
    } else {
        Some(result)
    }
}

/// Erase `[sel_start, sel_end)` without shifting later material left.
///
/// An invalid selection leaves every segment in place.
pub fn apply_cut(segments: &[Segment], sel_start: f64, sel_end: f64) -> EditResult {
    let mut result = EditResult::default();
    if !valid_selection(sel_start, sel_end) {
        result.kept = segments.iter().filter(|s| s.is_live()).cloned().collect();
        return result;
    }

    for seg in segments.iter().filter(|s| s.is_live()) {
        let seg_start = seg.start_on_timeline_ms;
        let seg_end = seg.end_on_timeline_ms();

        if seg_end <= sel_start || seg_start >= sel_end {
            result.kept.push(seg.clone());
            continue;
        }

        let left = slice(seg, seg_start, sel_start, seg_start, seg.id.clone());
        // The right piece inherits the original id when there is no left piece.
        let right_id = if left.is_some() { seg.id.slice("r") } else { seg.id.clone() };
        let right = slice(seg, sel_end, seg_end, sel_end, right_id);
        result.kept.extend(left);
        result.kept.extend(right);

        let mid_start = seg_start.max(sel_start);
        let mid_end = seg_end.min(sel_end);
        result.removed.extend(slice(seg, mid_start, mid_end, mid_start, seg.id.slice("mid")));
    }

    result
}

/// Apply `mode` to one track's segments.
pub fn edit(segments: &[Segment], sel_start: f64, sel_end: f64, mode: EditMode) -> Result<EditResult, EditError> {
    if !valid_selection(sel_start, sel_end) {
        return Err(EditError::InvalidSelection {
            start_ms: sel_start,
            end_ms: sel_end,
        });
    }
    match mode {
        EditMode::Trim => apply_trim(segments, sel_start, sel_end).ok_or(EditError::EmptyTrim),
        EditMode::Cut => Ok(apply_cut(segments, sel_start, sel_end)),
    }
}

/// Edit one track of a project, returning the new snapshot (with its
/// length re-derived) and the edit result.
pub fn edit_track(
    project: &Project,
    track: &TrackId,
    sel_start: f64,
    sel_end: f64,
    mode: EditMode,
) -> Result<(Project, EditResult), EditError> {
    if project.track(track).is_none() {
        return Err(EditError::UnknownTrack(track.clone()));
    }
    let segments: Vec<Segment> = project.segments_on(track).cloned().collect();
    let result = edit(&segments, sel_start, sel_end, mode)?;
    let next = project
        .with_track_segments(track, result.kept.clone())
        .with_derived_length();
    Ok((next, result))
}
