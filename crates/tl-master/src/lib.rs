//! Headless session controller for tapeline.
//!
//! Wires a playback [`Engine`] to a [`ScrubCoordinator`] and an edit
//! history, so a GUI or CLI drives one object per host frame.

pub mod export;
mod wav;

use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

use tl_engine::{AudioContext, Engine, EngineError, LoadOutcome, ScrubCoordinator, ScrubOptions};
use tl_ir::{edit_track, EditError, EditMode, EditResult, Project, Segment, SegmentEdit, TrackId, UndoStack};

pub use export::{export_wav, ExportSettings};
pub use wav::write_wav;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("no project loaded")]
    NotLoaded,
}

/// Requests the coordinator's callbacks post for the session to apply.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SessionCommand {
    Seek(f64),
    BeginScrub(ScrubOptions),
    EndScrub,
}

pub struct Session<C: AudioContext> {
    engine: Engine<C>,
    coordinator: ScrubCoordinator,
    commands: Receiver<SessionCommand>,
    sender: Sender<SessionCommand>,
    history: UndoStack,
    /// Playing when the current drag began
    resume_after_scrub: bool,
}

impl<C: AudioContext> Session<C> {
    pub fn new(engine: Engine<C>) -> Self {
        let (sender, commands) = unbounded();
        let mut coordinator = ScrubCoordinator::new();

        let tx = sender.clone();
        coordinator.set_scrub_start(Some(Box::new(move |opts| {
            let _ = tx.send(SessionCommand::BeginScrub(opts));
        })));
        let tx = sender.clone();
        coordinator.set_scrub_end(Some(Box::new(move || {
            let _ = tx.send(SessionCommand::EndScrub);
        })));

        let mut session = Self {
            engine,
            coordinator,
            commands,
            sender,
            history: UndoStack::new(),
            resume_after_scrub: false,
        };
        if session.engine.project().is_some() {
            session.attach_seeker();
            session.publish_length();
        }
        session
    }

    pub fn engine(&self) -> &Engine<C> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<C> {
        &mut self.engine
    }

    pub fn coordinator(&self) -> &ScrubCoordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut ScrubCoordinator {
        &mut self.coordinator
    }

    pub fn history(&self) -> &UndoStack {
        &self.history
    }

    fn attach_seeker(&mut self) {
        let tx = self.sender.clone();
        self.coordinator.set_seeker(Some(Box::new(move |ms| {
            let _ = tx.send(SessionCommand::Seek(ms));
        })));
    }

    fn publish_length(&mut self) {
        let length = self.engine.length_ms().unwrap_or(0.0);
        self.coordinator.set_length_ms(length);
    }

    /// Bring the engine in line with `project`. Seeks requested while the
    /// engine is busy are held and applied once it is done.
    pub fn reload(&mut self, project: Project) -> Result<LoadOutcome, SessionError> {
        self.coordinator.set_scrub_locked(true);
        let result = self.engine.update(project);
        match &result {
            Ok(outcome) => {
                log::debug!("session reload: {:?}", outcome);
                self.attach_seeker();
                self.publish_length();
            }
            Err(e) => {
                log::warn!("session reload failed: {}", e);
                self.coordinator.set_seeker(None);
            }
        }
        self.coordinator.set_scrub_locked(false);
        let outcome = result?;
        if let Err(e) = self.drain_commands() {
            log::warn!("queued commands after reload failed: {}", e);
        }
        Ok(outcome)
    }

    /// Trim or cut one track and reload. The edit is recorded for undo.
    pub fn apply_edit(
        &mut self,
        track: &TrackId,
        sel_start: f64,
        sel_end: f64,
        mode: EditMode,
    ) -> Result<EditResult, SessionError> {
        let project = self.engine.project().ok_or(SessionError::NotLoaded)?;
        let before: Vec<Segment> = project.segments_on(track).cloned().collect();
        let (next, result) = edit_track(project, track, sel_start, sel_end, mode)?;
        log::info!(
            "{:?} on track {}: {} kept, {} removed",
            mode,
            track,
            result.kept.len(),
            result.removed.len()
        );
        self.reload(next)?;
        self.history.push(SegmentEdit {
            track_id: track.clone(),
            before,
            after: result.kept.clone(),
            removed: result.removed.clone(),
        });
        Ok(result)
    }

    /// Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, SessionError> {
        let Some(edit) = self.history.undo() else {
            return Ok(false);
        };
        let (track, segments) = (edit.track_id.clone(), edit.before.clone());
        self.restore(&track, segments)?;
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool, SessionError> {
        let Some(edit) = self.history.redo() else {
            return Ok(false);
        };
        let (track, segments) = (edit.track_id.clone(), edit.after.clone());
        self.restore(&track, segments)?;
        Ok(true)
    }

    fn restore(&mut self, track: &TrackId, segments: Vec<Segment>) -> Result<(), SessionError> {
        let project = self.engine.project().ok_or(SessionError::NotLoaded)?;
        let next = project.with_track_segments(track, segments).with_derived_length();
        self.reload(next)?;
        Ok(())
    }

    /// One host frame: apply queued commands, render ahead, run the tick
    /// loop and publish the position. Returns the number of blocks rendered.
    pub fn pump(&mut self) -> Result<usize, SessionError> {
        self.drain_commands()?;
        let blocks = self.engine.pump().map_err(EngineError::from)?;
        self.engine.poll();
        if !self.coordinator.is_scrubbing() && self.engine.project().is_some() {
            let position = self.engine.position_ms();
            let ms = self.engine.length_ms().map_or(position, |len| position.min(len));
            self.coordinator.set_ms(ms);
        }
        Ok(blocks)
    }

    fn drain_commands(&mut self) -> Result<(), SessionError> {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                SessionCommand::Seek(ms) => self.engine.seek_ms(ms),
                SessionCommand::BeginScrub(opts) => {
                    self.resume_after_scrub = self.engine.is_playing();
                    self.engine.set_output_muted(true);
                    if opts.pause_playback {
                        self.engine.pause();
                    }
                }
                SessionCommand::EndScrub => {
                    self.engine.set_output_muted(false);
                    if self.resume_after_scrub && !self.engine.is_playing() {
                        self.engine.play()?;
                    }
                    self.resume_after_scrub = false;
                }
            }
        }
        Ok(())
    }

    /// Bounce the loaded project to WAV.
    pub fn export(&self, w: &mut impl std::io::Write, settings: &ExportSettings) -> Result<usize, SessionError> {
        let project = self.engine.project().ok_or(SessionError::NotLoaded)?;
        export_wav(w, project, self.engine.sources(), self.engine.config(), settings)
    }
}
