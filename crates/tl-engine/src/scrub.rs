//! Scrub/seek coordination between a timeline UI and the engine.
//!
//! The coordinator holds the displayed position and timeline length,
//! fans position changes out to subscribers, and forwards seeks to a
//! registered seeker. Without a seeker (engine not ready) or while locked
//! (a reload in progress), only the most recent seek is kept and it is
//! delivered once both conditions clear.

/// What subscribers see.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScrubState {
    pub ms: f64,
    /// Timeline length; zero or negative means unknown
    pub length_ms: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrubOptions {
    /// Pause playback for the duration of the drag.
    pub pause_playback: bool,
}

/// Token returned by [`ScrubCoordinator::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Seeker = Box<dyn FnMut(f64)>;
pub type ScrubStart = Box<dyn FnMut(ScrubOptions)>;
pub type ScrubEnd = Box<dyn FnMut()>;

#[derive(Default)]
pub struct ScrubCoordinator {
    state: ScrubState,
    listeners: Vec<(SubscriptionId, Box<dyn FnMut(ScrubState)>)>,
    next_id: u64,
    seeker: Option<Seeker>,
    pending: Option<f64>,
    scrub_start: Option<ScrubStart>,
    scrub_end: Option<ScrubEnd>,
    locked: bool,
    scrubbing: bool,
}

impl ScrubCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScrubState {
        self.state
    }

    /// Update the displayed position. Never touches the engine.
    pub fn set_ms(&mut self, ms: f64) {
        self.state.ms = ms;
        self.notify();
    }

    pub fn set_length_ms(&mut self, length_ms: f64) {
        self.state.length_ms = length_ms;
        self.notify();
    }

    fn notify(&mut self) {
        let state = self.state;
        for (_, listener) in &mut self.listeners {
            listener(state);
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(ScrubState) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    /// Register or clear the engine's seek function. Registering flushes
    /// a pending seek unless locked.
    pub fn set_seeker(&mut self, seeker: Option<Seeker>) {
        self.seeker = seeker;
        self.flush_pending();
    }

    pub fn pending_seek(&self) -> Option<f64> {
        self.pending
    }

    fn clamp(&self, ms: f64) -> f64 {
        let ms = if ms.is_nan() { 0.0 } else { ms.max(0.0) };
        if self.state.length_ms > 0.0 {
            ms.min(self.state.length_ms)
        } else {
            ms
        }
    }

    /// Clamp, show, and seek (or queue the seek).
    pub fn request_seek(&mut self, ms: f64) {
        let target = self.clamp(ms);
        self.set_ms(target);
        match &mut self.seeker {
            Some(seek) if !self.locked => seek(target),
            _ => {
                log::debug!("queueing seek to {:.1} ms", target);
                self.pending = Some(target);
            }
        }
    }

    fn flush_pending(&mut self) {
        if self.locked {
            return;
        }
        if let Some(seek) = &mut self.seeker {
            if let Some(target) = self.pending.take() {
                seek(target);
            }
        }
    }

    pub fn set_scrub_start(&mut self, callback: Option<ScrubStart>) {
        self.scrub_start = callback;
    }

    pub fn set_scrub_end(&mut self, callback: Option<ScrubEnd>) {
        self.scrub_end = callback;
    }

    /// Start a drag. Nested begins are ignored.
    pub fn begin_scrub(&mut self, options: ScrubOptions) {
        if self.scrubbing {
            return;
        }
        self.scrubbing = true;
        if let Some(start) = &mut self.scrub_start {
            start(options);
        }
    }

    pub fn end_scrub(&mut self) {
        if !self.scrubbing {
            return;
        }
        self.scrubbing = false;
        if let Some(end) = &mut self.scrub_end {
            end();
        }
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrubbing
    }

    /// While locked, seeks are queued instead of delivered. Unlocking
    /// delivers the latest one.
    pub fn set_scrub_locked(&mut self, locked: bool) {
        self.locked = locked;
        self.flush_pending();
    }

    pub fn is_scrub_locked(&self) -> bool {
        self.locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_seeker() -> (Seeker, Rc<RefCell<Vec<f64>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        (Box::new(move |ms| sink.borrow_mut().push(ms)), log)
    }

    #[test]
    fn seek_before_seeker_flushes_only_latest() {
        let mut c = ScrubCoordinator::new();
        c.set_length_ms(10_000.0);
        c.request_seek(1000.0);
        c.request_seek(2000.0);
        c.request_seek(3000.0);
        assert_eq!(c.pending_seek(), Some(3000.0));

        let (seeker, log) = recording_seeker();
        c.set_seeker(Some(seeker));
        assert_eq!(*log.borrow(), vec![3000.0]);
        assert_eq!(c.pending_seek(), None);
    }

    #[test]
    fn seek_clamps_and_updates_display() {
        let mut c = ScrubCoordinator::new();
        let (seeker, log) = recording_seeker();
        c.set_seeker(Some(seeker));
        c.set_length_ms(5000.0);

        c.request_seek(-20.0);
        c.request_seek(9000.0);
        assert_eq!(*log.borrow(), vec![0.0, 5000.0]);
        assert_eq!(c.state().ms, 5000.0);
    }

    #[test]
    fn unknown_length_clamps_only_below() {
        let mut c = ScrubCoordinator::new();
        let (seeker, log) = recording_seeker();
        c.set_seeker(Some(seeker));
        c.request_seek(123_456.0);
        assert_eq!(*log.borrow(), vec![123_456.0]);
    }

    #[test]
    fn subscribers_see_every_change_until_unsubscribed() {
        let mut c = ScrubCoordinator::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let id = c.subscribe(move |s| sink.borrow_mut().push(s.ms));

        c.set_ms(10.0);
        c.set_ms(20.0);
        assert!(c.unsubscribe(id));
        assert!(!c.unsubscribe(id));
        c.set_ms(30.0);
        assert_eq!(*seen.borrow(), vec![10.0, 20.0]);
    }

    #[test]
    fn locked_seeks_wait_for_unlock() {
        let mut c = ScrubCoordinator::new();
        let (seeker, log) = recording_seeker();
        c.set_seeker(Some(seeker));

        c.set_scrub_locked(true);
        assert!(c.is_scrub_locked());
        c.request_seek(100.0);
        c.request_seek(200.0);
        assert!(log.borrow().is_empty());
        assert_eq!(c.state().ms, 200.0);

        c.set_scrub_locked(false);
        assert_eq!(*log.borrow(), vec![200.0]);
    }

    #[test]
    fn clearing_seeker_queues_again() {
        let mut c = ScrubCoordinator::new();
        let (seeker, log) = recording_seeker();
        c.set_seeker(Some(seeker));
        c.set_seeker(None);
        c.request_seek(50.0);
        assert!(log.borrow().is_empty());
        assert_eq!(c.pending_seek(), Some(50.0));
    }

    #[test]
    fn scrub_callbacks_fire_once_per_drag() {
        let mut c = ScrubCoordinator::new();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (calls.clone(), calls.clone());
        c.set_scrub_start(Some(Box::new(move |opts| {
            a.borrow_mut().push(format!("start:{}", opts.pause_playback))
        })));
        c.set_scrub_end(Some(Box::new(move || b.borrow_mut().push("end".into()))));

        c.begin_scrub(ScrubOptions { pause_playback: true });
        c.begin_scrub(ScrubOptions::default());
        assert!(c.is_scrubbing());
        c.end_scrub();
        c.end_scrub();
        assert_eq!(*calls.borrow(), vec!["start:true".to_string(), "end".to_string()]);
    }
}
