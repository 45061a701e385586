//! Sample-accurate parameter automation.
//!
//! An [`AudioParam`] holds an anchor `(time, value)` and a short, time-sorted
//! list of scheduled events. Ramps run from the previous event (or the
//! anchor) to their own end point. Times are in context frames.

use arrayvec::ArrayVec;
use tl_ir::SILENCE_FLOOR;

/// Scheduled events a single parameter can hold at once.
pub const MAX_PARAM_EVENTS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamEvent {
    /// Jump to `value` at frame `at`.
    SetValue { value: f32, at: u64 },
    /// Reach `value` at frame `end`, linearly.
    LinearRamp { value: f32, end: u64 },
    /// Reach `value` at frame `end`, exponentially. Neither end of the
    /// ramp goes below `floor`.
    ExponentialRamp { value: f32, end: u64, floor: f32 },
}

impl ParamEvent {
    pub fn time(&self) -> u64 {
        match *self {
            ParamEvent::SetValue { at, .. } => at,
            ParamEvent::LinearRamp { end, .. } | ParamEvent::ExponentialRamp { end, .. } => end,
        }
    }

    pub fn value(&self) -> f32 {
        match *self {
            ParamEvent::SetValue { value, .. }
            | ParamEvent::LinearRamp { value, .. }
            | ParamEvent::ExponentialRamp { value, .. } => value,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioParam {
    anchor_time: u64,
    anchor_value: f32,
    events: ArrayVec<ParamEvent, MAX_PARAM_EVENTS>,
}

impl AudioParam {
    pub fn new(value: f32) -> Self {
        Self {
            anchor_time: 0,
            anchor_value: value,
            events: ArrayVec::new(),
        }
    }

    /// Value after every event up to the last `advance()`.
    pub fn value(&self) -> f32 {
        self.anchor_value
    }

    pub fn has_automation(&self) -> bool {
        !self.events.is_empty()
    }

    /// Drop all automation and jump to `value`.
    pub fn set_value(&mut self, value: f32) {
        self.events.clear();
        self.anchor_value = value;
    }

    pub fn set_value_at(&mut self, value: f32, at: u64) {
        self.schedule(ParamEvent::SetValue { value, at });
    }

    pub fn linear_ramp_to(&mut self, value: f32, end: u64) {
        self.schedule(ParamEvent::LinearRamp { value, end });
    }

    /// Exponential ramps cannot reach zero; both ends are clamped to
    /// `floor` (positive, [`SILENCE_FLOOR`] when not).
    pub fn exponential_ramp_to(&mut self, value: f32, end: u64, floor: f32) {
        let floor = if floor > 0.0 { floor } else { SILENCE_FLOOR };
        self.schedule(ParamEvent::ExponentialRamp {
            value: value.max(floor),
            end,
            floor,
        });
    }

    /// Freeze the parameter at its value at `at` and drop every event
    /// after it, including a ramp in progress.
    pub fn cancel_and_hold(&mut self, at: u64) {
        let held = self.value_at(at);
        self.events.clear();
        self.anchor_time = self.anchor_time.max(at);
        self.anchor_value = held;
    }

    fn schedule(&mut self, event: ParamEvent) {
        if self.events.is_full() {
            // Fold the earliest event into the anchor to make room.
            let first = self.events.remove(0);
            self.anchor_time = first.time();
            self.anchor_value = first.value();
        }
        let pos = self
            .events
            .iter()
            .position(|e| e.time() > event.time())
            .unwrap_or(self.events.len());
        self.events.insert(pos, event);
    }

    /// Value at frame `t`, without consuming events.
    pub fn value_at(&self, t: u64) -> f32 {
        let mut t0 = self.anchor_time;
        let mut v0 = self.anchor_value;
        for event in &self.events {
            let t1 = event.time();
            if t1 <= t {
                t0 = t1;
                v0 = event.value();
                continue;
            }
            return match *event {
                ParamEvent::SetValue { .. } => v0,
                ParamEvent::LinearRamp { value, end } => {
                    let x = t.saturating_sub(t0) as f32 / end.saturating_sub(t0).max(1) as f32;
                    v0 + (value - v0) * x
                }
                ParamEvent::ExponentialRamp { value, end, floor } => {
                    let v0 = v0.max(floor);
                    let x = t.saturating_sub(t0) as f32 / end.saturating_sub(t0).max(1) as f32;
                    v0 * libm::powf(value / v0, x)
                }
            };
        }
        v0
    }

    /// Consume every event ending at or before `t`.
    pub fn advance(&mut self, t: u64) {
        let done = self.events.iter().take_while(|e| e.time() <= t).count();
        if done == 0 {
            return;
        }
        let last = self.events[done - 1];
        self.anchor_time = last.time();
        self.anchor_value = last.value();
        self.events.drain(..done);
    }
}
