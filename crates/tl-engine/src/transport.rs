//! Frame-counting transport with look-ahead start and loop wrap.

/// Playback state of the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Started,
    Paused,
}

/// Maps context frames to timeline frames.
///
/// While started, every context frame at or after `start_at` consumes one
/// timeline frame. Frames before `start_at` (the look-ahead) and frames
/// while paused or stopped map to nothing.
#[derive(Clone, Debug)]
pub struct Transport {
    state: TransportState,
    position: u64,
    start_at: u64,
    loop_range: Option<(u64, u64)>,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    pub fn new() -> Self {
        Self {
            state: TransportState::Stopped,
            position: 0,
            start_at: 0,
            loop_range: None,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.state == TransportState::Started
    }

    /// Timeline frame the next rolling frame will play.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Start rolling at context frame `at`. Position is kept.
    pub fn start(&mut self, at: u64) {
        self.state = TransportState::Started;
        self.start_at = at;
    }

    pub fn pause(&mut self) {
        if self.state == TransportState::Started {
            self.state = TransportState::Paused;
        }
    }

    /// Halt and rewind. Cancels a pending start.
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.position = 0;
    }

    pub fn seek(&mut self, frame: u64) {
        self.position = frame;
    }

    /// Loop `[start, end)` in timeline frames; `None` or an empty range
    /// disables looping.
    pub fn set_loop(&mut self, range: Option<(u64, u64)>) {
        self.loop_range = range.filter(|(s, e)| e > s);
    }

    pub fn loop_range(&self) -> Option<(u64, u64)> {
        self.loop_range
    }

    /// Timeline frame for context frame `now`, advancing when rolling.
    pub fn tick(&mut self, now: u64) -> Option<u64> {
        if self.state != TransportState::Started || now < self.start_at {
            return None;
        }
        if let Some((start, end)) = self.loop_range {
            if self.position >= end {
                self.position = start;
            }
        }
        let frame = self.position;
        self.position += 1;
        Some(frame)
    }
}
