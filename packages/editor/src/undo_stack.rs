//! # Undo/Redo Stack
//!
//! Snapshot history of the serialized document.
//!
//! ## Design
//!
//! - `commit` pushes the current document onto the undo stack and clears redo
//! - The top of the undo stack is always the current state, so undo needs at
//!   least two entries
//! - Undo moves the top snapshot to redo and restores the one beneath it
//! - Redo restores the most recently undone snapshot and pushes it back
//! - The undo stack holds at most `max_levels` snapshots; the oldest goes first
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut stack = UndoStack::new();
//! stack.commit(&doc)?;            // initial state
//! mutation.apply(&mut doc, &mut ctx)?;
//! stack.commit(&doc)?;
//!
//! if let Some(previous) = stack.undo()? {
//!     doc = previous;
//! }
//! ```

use anvil_blocks::{Document, DocumentError};
use std::collections::VecDeque;

/// Snapshots kept by default
pub const DEFAULT_MAX_LEVELS: usize = 50;

/// Serialized document JSON
pub type Snapshot = String;

#[derive(Debug)]
pub struct UndoStack {
    /// Committed states, most recent last
    undo_stack: VecDeque<Snapshot>,

    /// Undone states, most recent last
    redo_stack: Vec<Snapshot>,

    max_levels: usize,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::with_max_levels(DEFAULT_MAX_LEVELS)
    }

    /// Bound the undo stack; anything below 2 would make undo impossible
    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_levels: max_levels.max(2),
        }
    }

    /// Record the current document as a new state
    pub fn commit(&mut self, doc: &Document) -> Result<(), DocumentError> {
        let snapshot = doc.to_json()?;
        self.push_undo(snapshot);
        self.redo_stack.clear();
        Ok(())
    }

    /// Step back one state. `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<Option<Document>, DocumentError> {
        if self.undo_stack.len() < 2 {
            return Ok(None);
        }

        let previous = match self.undo_stack.get(self.undo_stack.len() - 2) {
            Some(snapshot) => Document::from_json(snapshot)?,
            None => return Ok(None),
        };

        if let Some(current) = self.undo_stack.pop_back() {
            self.redo_stack.push(current);
        }

        Ok(Some(previous))
    }

    /// Step forward one undone state. `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Result<Option<Document>, DocumentError> {
        let next = match self.redo_stack.last() {
            Some(snapshot) => Document::from_json(snapshot)?,
            None => return Ok(None),
        };

        if let Some(snapshot) = self.redo_stack.pop() {
            self.push_undo(snapshot);
        }

        Ok(Some(next))
    }

    fn push_undo(&mut self, snapshot: Snapshot) {
        self.undo_stack.push_back(snapshot);

        while self.undo_stack.len() > self.max_levels {
            self.undo_stack.pop_front();
        }
    }

    pub fn can_undo(&self) -> bool {
        self.undo_stack.len() >= 2
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Number of undo steps available
    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len().saturating_sub(1)
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Forget everything and start over from `doc`
    pub fn reset(&mut self, doc: &Document) -> Result<(), DocumentError> {
        self.clear();
        self.commit(doc)
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}
