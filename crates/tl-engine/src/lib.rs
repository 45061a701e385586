//! Playback engine for tapeline.
//!
//! Turns project snapshots into a node graph of players, buses and
//! effects, and renders it block by block into an [`AudioContext`].

mod audio_buffer;
pub mod builder;
mod bus;
mod config;
mod context;
pub mod effects;
mod engine;
mod error;
mod frame;
mod graph;
mod param;
mod player;
mod scrub;
mod source;
mod transport;

pub use audio_buffer::{AudioBuffer, STEREO};
pub use bus::Bus;
pub use config::{frames_to_ms, ms_to_frames, EngineConfig};
pub use context::{AudioContext, ContextState, OfflineContext};
pub use effects::{build_effect, Effect};
pub use engine::{Engine, EngineState, LoadOutcome, TransportEvent};
pub use error::{ContextError, EffectError, EngineError, GraphError, LoadError};
pub use frame::Frame;
pub use graph::{pan_stereo, AudioGraph, NodeKey, NodeKind, RenderContext};
pub use param::{AudioParam, ParamEvent, MAX_PARAM_EVENTS};
pub use player::Player;
pub use scrub::{ScrubCoordinator, ScrubEnd, ScrubOptions, ScrubStart, ScrubState, Seeker, SubscriptionId};
pub use source::{SourceBank, SourceBuffer, SourceInfo};
pub use transport::{Transport, TransportState};
