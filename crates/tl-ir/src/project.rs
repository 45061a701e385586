//! Project snapshot: tracks, timeline segments, loop region, master chain.
//!
//! A `Project` is produced fresh by the editor on every change and is
//! treated as immutable by the engine. Updates go through the `with_*`
//! helpers, which return a new snapshot instead of mutating a shared one.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::effects::EffectSpec;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.into())
            }
        }
    };
}

string_id! {
    /// Identifier of a track within a project.
    TrackId
}

string_id! {
    /// Identifier of a segment within a project.
    SegmentId
}

string_id! {
    /// Key of a decoded source buffer, resolved by the engine's source bank.
    SourceRef
}

impl SegmentId {
    /// Derive the id of a piece sliced out of this segment.
    pub fn slice(&self, tag: &str) -> Self {
        Self(format!("{}#{}", self.0, tag))
    }
}

/// Musical meter as `(beats per bar, beat unit)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSignature(pub u8, pub u8);

impl Default for TimeSignature {
    fn default() -> Self {
        Self(4, 4)
    }
}

impl TimeSignature {
    pub fn beats_per_bar(&self) -> u8 {
        self.0
    }

    pub fn beat_unit(&self) -> u8 {
        self.1
    }
}

/// A mixer track. Segments refer to it by `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    #[serde(default)]
    pub name: String,
    /// Fader level in dB (0 = unity)
    #[serde(default)]
    pub gain_db: f32,
    /// Stereo position, -1 (left) to 1 (right)
    #[serde(default)]
    pub pan: f32,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub solo: bool,
    #[serde(default)]
    pub color: String,
    /// Insert chain, in signal order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<EffectSpec>,
}

impl Track {
    pub fn new(id: impl Into<String>, name: &str) -> Self {
        Self {
            id: TrackId::new(id),
            name: name.into(),
            gain_db: 0.0,
            pan: 0.0,
            mute: false,
            solo: false,
            color: String::new(),
            effects: Vec::new(),
        }
    }

    /// Effective silence: mute always wins, otherwise a soloed project
    /// silences every non-soloed track.
    pub fn is_silent(&self, any_soloed: bool) -> bool {
        self.mute || (any_soloed && !self.solo)
    }
}

/// Fade lengths applied at a segment's edges.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fades {
    #[serde(default)]
    pub in_ms: f64,
    #[serde(default)]
    pub out_ms: f64,
}

/// A placed, time-bounded window into a source buffer.
///
/// Timeline extent is `[start_on_timeline_ms, start_on_timeline_ms + duration_ms)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: SegmentId,
    pub track_id: TrackId,
    #[serde(rename = "sourceRef")]
    pub source: SourceRef,
    pub start_on_timeline_ms: f64,
    #[serde(default)]
    pub start_in_source_ms: f64,
    pub duration_ms: f64,
    #[serde(default)]
    pub gain_db: f32,
    #[serde(default)]
    pub fades: Fades,
}

impl Segment {
    pub fn new(id: &str, track_id: &str, source: &str, start_ms: f64, duration_ms: f64) -> Self {
        Self {
            id: SegmentId::from(id),
            track_id: TrackId::from(track_id),
            source: SourceRef::from(source),
            start_on_timeline_ms: start_ms,
            start_in_source_ms: 0.0,
            duration_ms,
            gain_db: 0.0,
            fades: Fades::default(),
        }
    }

    pub fn end_on_timeline_ms(&self) -> f64 {
        self.start_on_timeline_ms + self.duration_ms
    }

    /// A segment that may be stored and played: positive, finite extent.
    pub fn is_live(&self) -> bool {
        self.duration_ms > 0.0
            && self.duration_ms.is_finite()
            && self.start_on_timeline_ms >= 0.0
            && self.start_in_source_ms >= 0.0
    }
}

/// Transport loop points. Only honoured when enabled with both ends set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopRegion {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<f64>,
}

impl LoopRegion {
    pub fn new(start_ms: f64, end_ms: f64) -> Self {
        Self {
            enabled: true,
            start_ms: Some(start_ms),
            end_ms: Some(end_ms),
        }
    }

    /// The active `(start, end)` pair, if the loop is usable.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        if !self.enabled {
            return None;
        }
        match (self.start_ms, self.end_ms) {
            (Some(start), Some(end)) if start >= 0.0 && end > start => Some((start, end)),
            _ => None,
        }
    }
}

fn default_bpm() -> f64 {
    120.0
}

/// One complete project state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    #[serde(default)]
    pub time_signature: TimeSignature,
    /// Timeline length; authoritative for end detection and seek clamping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_ms: Option<f64>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// Unordered; algorithms never rely on segment order.
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default, rename = "loop")]
    pub loop_region: LoopRegion,
    #[serde(default)]
    pub master_chain: Vec<EffectSpec>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            bpm: default_bpm(),
            time_signature: TimeSignature::default(),
            length_ms: None,
            tracks: Vec::new(),
            segments: Vec::new(),
            loop_region: LoopRegion::default(),
            master_chain: Vec::new(),
        }
    }
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.id == id)
    }

    pub fn any_soloed(&self) -> bool {
        self.tracks.iter().any(|t| t.solo)
    }

    pub fn segments_on<'a>(&'a self, track: &'a TrackId) -> impl Iterator<Item = &'a Segment> + 'a {
        self.segments.iter().filter(move |s| &s.track_id == track)
    }

    /// Latest segment end across all live segments (0 for an empty timeline).
    pub fn derived_length_ms(&self) -> f64 {
        self.segments
            .iter()
            .filter(|s| s.is_live())
            .map(Segment::end_on_timeline_ms)
            .fold(0.0, f64::max)
    }

    pub fn with_derived_length(mut self) -> Self {
        self.length_ms = Some(self.derived_length_ms());
        self
    }

    /// Milliseconds per beat at the project tempo.
    pub fn ms_per_beat(&self) -> f64 {
        if self.bpm > 0.0 {
            60_000.0 / self.bpm
        } else {
            0.0
        }
    }

    /// A copy of this snapshot with one track modified, or `None` if the
    /// track does not exist.
    pub fn with_track(&self, id: &TrackId, update: impl FnOnce(&mut Track)) -> Option<Self> {
        let mut next = self.clone();
        let track = next.tracks.iter_mut().find(|t| &t.id == id)?;
        update(track);
        Some(next)
    }

    /// A copy of this snapshot where `track`'s segments are replaced.
    /// Segments of other tracks keep their relative order.
    pub fn with_track_segments(&self, track: &TrackId, segments: Vec<Segment>) -> Self {
        let mut next = self.clone();
        next.segments.retain(|s| &s.track_id != track);
        next.segments.extend(segments.into_iter().map(|mut s| {
            s.track_id = track.clone();
            s
        }));
        next
    }

    pub fn with_master_chain(&self, chain: Vec<EffectSpec>) -> Self {
        Self {
            master_chain: chain,
            ..self.clone()
        }
    }

    pub fn with_loop(&self, loop_region: LoopRegion) -> Self {
        Self {
            loop_region,
            ..self.clone()
        }
    }
}
