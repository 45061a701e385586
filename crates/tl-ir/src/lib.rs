//! Core IR types for tapeline.
//!
//! This crate defines the project snapshot exchanged between the editor
//! and the playback engine, together with the pure timeline algorithms
//! that derive new snapshots from old ones (trim/cut, diffing, history).
//! Nothing here touches an audio runtime.

mod diff;
mod edit;
mod effects;
mod history;
mod level;
mod project;
mod signature;

pub use diff::{diff, PatchSet, SnapshotDiff, TrackPatch};
pub use edit::{apply_cut, apply_trim, edit, edit_track, EditError, EditMode, EditResult};
pub use effects::{
    DelayParams, DistortionParams, EffectKind, EffectSpec, EqParams, GainParams, LowpassParams,
    OpaqueEffect, PitchParams, ReverbParams,
};
pub use history::{SegmentEdit, UndoStack};
pub use level::{clamp_pan, db_to_gain, gain_to_db, SILENCE_FLOOR};
pub use project::{
    Fades, LoopRegion, Project, Segment, SegmentId, SourceRef, TimeSignature, Track, TrackId,
};
pub use signature::CompositionSignature;
