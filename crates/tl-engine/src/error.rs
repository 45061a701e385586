//! Error types for graph construction, effects, devices and the engine.

use thiserror::Error;
use tl_ir::{SegmentId, SourceRef, TrackId};

/// A snapshot that cannot be turned into a playable graph.
#[derive(Debug, Error, PartialEq)]
pub enum LoadError {
    #[error("segment {segment} references unknown track {track}")]
    UnknownTrack { segment: SegmentId, track: TrackId },
    #[error("segment {segment} references missing source {source_ref}")]
    MissingSource { segment: SegmentId, source_ref: SourceRef },
    #[error("duplicate track id {0}")]
    DuplicateTrack(TrackId),
    #[error("duplicate segment id {0}")]
    DuplicateSegment(SegmentId),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// An effect spec that cannot be instantiated.
#[derive(Debug, Error, PartialEq)]
pub enum EffectError {
    #[error("{effect}: parameter {param} out of range ({value})")]
    InvalidParam {
        effect: &'static str,
        param: &'static str,
        value: f32,
    },
    #[error("unsupported effect: {0}")]
    Unsupported(String),
}

/// Arena misuse: a handle that no longer (or never did) name a node.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node handle is stale")]
    StaleNode,
    #[error("connection would create a cycle")]
    Cycle,
}

/// Audio device / context failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("device init error: {0}")]
    DeviceInit(String),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("audio context is closed")]
    Closed,
}

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Context(#[from] ContextError),
}
