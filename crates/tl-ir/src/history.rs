//! Undo/redo stack for segment edits.

use crate::project::{Segment, TrackId};

/// One applied edit: a track's segment list before and after, plus the
/// pieces the edit took out.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentEdit {
    pub track_id: TrackId,
    pub before: Vec<Segment>,
    pub after: Vec<Segment>,
    pub removed: Vec<Segment>,
}

/// Linear undo history. Pushing after an undo discards the redo tail.
#[derive(Clone, Debug, Default)]
pub struct UndoStack {
    entries: Vec<SegmentEdit>,
    position: usize,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, edit: SegmentEdit) {
        self.entries.truncate(self.position);
        self.entries.push(edit);
        self.position = self.entries.len();
    }

    /// Step back: the returned entry's `before` is the list to restore.
    pub fn undo(&mut self) -> Option<&SegmentEdit> {
        if self.position == 0 {
            return None;
        }
        self.position -= 1;
        Some(&self.entries[self.position])
    }

    /// Step forward: the returned entry's `after` is the list to restore.
    pub fn redo(&mut self) -> Option<&SegmentEdit> {
        let edit = self.entries.get(self.position)?;
        self.position += 1;
        Some(edit)
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position < self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.position = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(tag: &str) -> SegmentEdit {
        SegmentEdit {
            track_id: TrackId::from("t"),
            before: vec![Segment::new(tag, "t", "src", 0.0, 1000.0)],
            after: Vec::new(),
            removed: Vec::new(),
        }
    }

    #[test]
    fn undo_then_redo_returns_same_entry() {
        let mut stack = UndoStack::new();
        stack.push(edit("a"));
        assert!(stack.can_undo());
        assert_eq!(stack.undo().unwrap().before[0].id.as_str(), "a");
        assert!(stack.can_redo());
        assert_eq!(stack.redo().unwrap().before[0].id.as_str(), "a");
        assert!(!stack.can_redo());
    }

    #[test]
    fn empty_stack_has_nothing_to_step() {
        let mut stack = UndoStack::new();
        assert!(stack.undo().is_none());
        assert!(stack.redo().is_none());
    }

    #[test]
    fn push_after_undo_truncates_redo() {
        let mut stack = UndoStack::new();
        stack.push(edit("a"));
        stack.push(edit("b"));
        stack.undo();
        stack.push(edit("c"));
        assert!(!stack.can_redo());
        assert_eq!(stack.undo().unwrap().before[0].id.as_str(), "c");
        assert_eq!(stack.undo().unwrap().before[0].id.as_str(), "a");
    }
}
