//! # Anvil Editor
//!
//! Editing engine for Anvil block documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ gesture: click, drag, keystroke, paste      │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ EditorSession                               │
//! │  - Mutations (insert/move/duplicate/...)    │
//! │  - Drop target resolution while dragging    │
//! │  - Inline edit sync into attributes         │
//! │  - Snapshot undo/redo                       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ PersistenceClient: dirty flag, autosave,    │
//! │ save/preview through a Transport            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Mutations are the only writers**: inline sync aside, nothing else
//!    changes the block tree
//! 2. **Stale ids are not errors**: a mutation on a missing block is a no-op
//! 3. **Single editor, last write wins**: no merge, no version token
//!
//! ## Usage
//!
//! ```rust,ignore
//! use anvil_editor::{EditorConfig, EditorSession, InsertTarget, MemoryTransport};
//! use std::sync::Arc;
//!
//! let config = EditorConfig::load(path)?;
//! let mut session = EditorSession::new(config, Arc::new(MemoryTransport::new()))?;
//!
//! let id = session.insert_block("paragraph", InsertTarget::top_level(0))?;
//! session.undo()?;
//! session.save().await?;
//! ```

mod config;
mod drop_target;
mod errors;
mod mutations;
mod persistence;
mod sanitize;
mod session;
mod sync;
mod undo_stack;

pub use config::{
    BoxSides, ConfigError, EditorConfig, Length, LengthUnit, Margin, MarginKeyword, PageSettings,
    DEFAULT_AUTOSAVE_DELAY_MS,
};
pub use drop_target::{
    DragKind, DragSession, DropTarget, Point, Rect, RenderedBlock, RenderedColumn, RenderedLayout,
};
pub use errors::{EditorError, EditorResult};
pub use mutations::{InsertTarget, Mutation, MutationContext, MutationError, MutationResult};
pub use persistence::{
    AutosaveCompletion, AutosaveRequest, AutosaveResponse, AutosaveTimer, MemoryTransport,
    PersistenceClient, PersistenceError, PreviewRequest, PreviewResponse, SaveCompletion,
    SaveRequest, SaveResponse, SaveStatus, Transport, TransportError,
};
pub use sanitize::PasteSanitizer;
pub use session::{EditorSession, MutationOutcome};
pub use sync::{
    content_key, sync_region, FinishedEdit, FocusTarget, InlineEditor, InlineState, RegionInput,
    SyncOutcome, BLUR_GRACE,
};
pub use undo_stack::{UndoStack, DEFAULT_MAX_LEVELS};

// Re-export the document model
pub use anvil_blocks;
