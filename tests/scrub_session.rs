//! Scrub/seek coordination, alone and wired through a session.

use std::cell::RefCell;
use std::rc::Rc;

use tl_engine::{Engine, EngineConfig, EngineState, OfflineContext, ScrubCoordinator, ScrubOptions, SourceBuffer};
use tl_ir::{EditMode, Project, Segment, Track, TrackId};
use tl_master::{ExportSettings, Session, SessionError};

fn project() -> Project {
    let mut p = Project::new();
    p.tracks.push(Track::new("a", "A"));
    p.tracks.push(Track::new("b", "B"));
    p.segments.push(Segment::new("s1", "a", "tone", 0.0, 2000.0));
    p.segments.push(Segment::new("s2", "b", "tone", 500.0, 1000.0));
    p.with_derived_length()
}

fn session() -> Session<OfflineContext> {
    let config = EngineConfig {
        start_lookahead_ms: 0.0,
        ..Default::default()
    };
    let mut engine = Engine::new(config, OfflineContext::new(48_000));
    engine
        .sources_mut()
        .insert("tone", SourceBuffer::mono(48_000, vec![0.3; 48_000 * 3]));
    Session::new(engine)
}

/// Let the offline device play everything queued, then run one host frame.
fn frame(s: &mut Session<OfflineContext>) {
    let queued = s.engine().context().rendered_frames();
    s.engine_mut().context_mut().consume(queued);
    s.pump().unwrap();
}

#[test]
fn only_the_latest_early_seek_is_delivered() {
    let mut c = ScrubCoordinator::new();
    for ms in [100.0, 250.0, 900.0] {
        c.request_seek(ms);
    }
    let delivered = Rc::new(RefCell::new(Vec::new()));
    let sink = delivered.clone();
    c.set_seeker(Some(Box::new(move |ms| sink.borrow_mut().push(ms))));
    assert_eq!(*delivered.borrow(), vec![900.0]);

    c.request_seek(10.0);
    assert_eq!(*delivered.borrow(), vec![900.0, 10.0]);
}

#[test]
fn subscribers_track_position_and_length() {
    let mut s = session();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    s.coordinator_mut().subscribe(move |state| sink.borrow_mut().push(state));

    s.reload(project()).unwrap();
    s.engine_mut().play().unwrap();
    for _ in 0..5 {
        frame(&mut s);
    }

    let seen = seen.borrow();
    let last = seen.last().copied().unwrap();
    assert_eq!(last.length_ms, 2000.0);
    assert!(last.ms > 0.0);
    assert!(seen.windows(2).all(|w| w[1].ms >= w[0].ms));
}

#[test]
fn drag_does_not_rebuild_or_fight_the_playhead() {
    let mut s = session();
    s.reload(project()).unwrap();
    let player = s.engine().built().unwrap().voices[&tl_ir::SegmentId::from("s1")].player;
    s.engine_mut().play().unwrap();
    frame(&mut s);

    s.coordinator_mut().begin_scrub(ScrubOptions { pause_playback: false });
    for ms in (0..20).map(|i| 100.0 + i as f64 * 50.0) {
        s.coordinator_mut().request_seek(ms);
        frame(&mut s);
        // While dragging, the display follows the pointer, not the engine.
        assert_eq!(s.coordinator().state().ms, ms);
    }
    s.coordinator_mut().end_scrub();
    frame(&mut s);

    assert!(s.engine().graph().contains(player));
    assert!(s.engine().is_playing());
    let pos = s.engine().position_ms();
    assert!(pos >= 1050.0 && pos < 1300.0, "position {}", pos);
}

#[test]
fn paused_drag_resumes_afterwards() {
    let mut s = session();
    s.reload(project()).unwrap();
    s.engine_mut().play().unwrap();
    frame(&mut s);

    s.coordinator_mut().begin_scrub(ScrubOptions { pause_playback: true });
    frame(&mut s);
    assert_eq!(s.engine().state(), EngineState::Paused);

    s.coordinator_mut().request_seek(1500.0);
    s.coordinator_mut().end_scrub();
    frame(&mut s);
    assert!(s.engine().is_playing());
}

#[test]
fn seeks_during_reload_land_after_it() {
    let mut s = session();
    s.reload(project()).unwrap();

    s.coordinator_mut().set_scrub_locked(true);
    s.coordinator_mut().request_seek(300.0);
    s.coordinator_mut().request_seek(700.0);
    assert_eq!(s.coordinator().pending_seek(), Some(700.0));
    s.coordinator_mut().set_scrub_locked(false);

    frame(&mut s);
    assert_eq!(s.engine().position_ms(), 700.0);
}

#[test]
fn edits_reload_and_publish_new_length() {
    let mut s = session();
    s.reload(project()).unwrap();

    s.apply_edit(&TrackId::from("a"), 1500.0, 2000.0, EditMode::Cut).unwrap();
    assert_eq!(s.coordinator().state().length_ms, 1500.0);
    assert_eq!(s.engine().length_ms(), Some(1500.0));

    s.undo().unwrap();
    assert_eq!(s.coordinator().state().length_ms, 2000.0);
}

#[test]
fn export_bounces_the_loaded_project() {
    let mut s = session();
    let mut wav = Vec::new();
    assert!(matches!(s.export(&mut wav, &ExportSettings::default()), Err(SessionError::NotLoaded)));

    s.reload(project()).unwrap();
    let frames = s
        .export(&mut wav, &ExportSettings {
            sample_rate: 24_000,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(frames, 48_000);
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(wav.len(), 44 + frames * 4);
}
