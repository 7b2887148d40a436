//! # Inline Edit Synchronization
//!
//! Copies what the user types into an inline-editable region back into the
//! owning block's attributes, and tracks the focus state of that region.
//!
//! ```text
//!   Idle ──focus/input──▶ Editing ──input──▶ Editing
//!                            │
//!                            └─blur─▶ Editing (blur pending) ──grace elapsed──▶ Idle
//!                                           │
//!                                           └─toolbar/input──▶ Editing
//! ```
//!
//! Blurring towards the formatting toolbar or the link popup never ends the
//! edit. Any other blur ends it once the grace period passes without the
//! toolbar being touched. The caller drives time through [`InlineEditor::poll`].

use anvil_blocks::{BlockTypeRegistry, Document, Value};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// How long a blur waits before ending the edit
pub const BLUR_GRACE: Duration = Duration::from_millis(150);

pub const CONTENT_KEY: &str = "content";
pub const TEXT_KEY: &str = "text";
pub const ALIGN_KEY: &str = "align";

const BUTTON_TYPE: &str = "button";

/// Serialized state of an editable region after an input event
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionInput {
    pub html: String,

    /// Text alignment set on the region, if any
    #[serde(default)]
    pub align: Option<String>,
}

impl RegionInput {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            align: None,
        }
    }

    pub fn with_align(mut self, align: impl Into<String>) -> Self {
        self.align = Some(align.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Written,
    Unchanged,
    BlockMissing,
}

/// Attribute that holds a block's inline content
pub fn content_key(registry: &BlockTypeRegistry, block_type: &str) -> &'static str {
    if block_type == BUTTON_TYPE {
        return TEXT_KEY;
    }

    match registry.get(block_type) {
        Some(def)
            if def.attributes.contains_key(TEXT_KEY)
                && !def.attributes.contains_key(CONTENT_KEY) =>
        {
            TEXT_KEY
        }
        _ => CONTENT_KEY,
    }
}

/// Write region content into the block, wherever it currently lives
pub fn sync_region(
    doc: &mut Document,
    registry: &BlockTypeRegistry,
    block_id: &str,
    input: &RegionInput,
) -> SyncOutcome {
    let Some(block) = doc.find_mut(block_id) else {
        debug!(block_id = %block_id, "Inline input for a block that no longer exists");
        return SyncOutcome::BlockMissing;
    };

    let key = content_key(registry, &block.block_type);
    let mut changed = false;

    let html = Value::from(input.html.as_str());
    if block.attributes.get(key) != Some(&html) {
        block.attributes.insert(key.to_string(), html);
        changed = true;
    }

    if let Some(align) = &input.align {
        let align = Value::from(align.as_str());
        if block.attributes.get(ALIGN_KEY) != Some(&align) {
            block.attributes.insert(ALIGN_KEY.to_string(), align);
            changed = true;
        }
    }

    if changed {
        SyncOutcome::Written
    } else {
        SyncOutcome::Unchanged
    }
}

/// Where focus went when a region blurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    Toolbar,
    LinkPopup,
    Elsewhere,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InlineState {
    Idle,
    Editing {
        block_id: String,
        /// Content was written during this edit
        changed: bool,
        blur_deadline: Option<Instant>,
    },
}

/// An edit that has ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedEdit {
    pub block_id: String,
    pub changed: bool,
}

#[derive(Debug)]
pub struct InlineEditor {
    state: InlineState,
    grace: Duration,
}

impl InlineEditor {
    pub fn new() -> Self {
        Self::with_grace(BLUR_GRACE)
    }

    pub fn with_grace(grace: Duration) -> Self {
        Self {
            state: InlineState::Idle,
            grace,
        }
    }

    pub fn state(&self) -> &InlineState {
        &self.state
    }

    pub fn editing_block(&self) -> Option<&str> {
        match &self.state {
            InlineState::Editing { block_id, .. } => Some(block_id),
            InlineState::Idle => None,
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, InlineState::Editing { .. })
    }

    /// Focus a region. Returns the edit this ends, if focus came from
    /// another block's region.
    pub fn focus(&mut self, block_id: &str) -> Option<FinishedEdit> {
        if let InlineState::Editing {
            block_id: current,
            blur_deadline,
            ..
        } = &mut self.state
        {
            if current.as_str() == block_id {
                *blur_deadline = None;
                return None;
            }
        }

        let finished = self.finish();
        debug!(block_id = %block_id, "Inline edit started");
        self.state = InlineState::Editing {
            block_id: block_id.to_string(),
            changed: false,
            blur_deadline: None,
        };
        finished
    }

    /// Note that content was written for `block_id`
    pub fn input(&mut self, block_id: &str) -> Option<FinishedEdit> {
        let finished = self.focus(block_id);
        if let InlineState::Editing { changed, .. } = &mut self.state {
            *changed = true;
        }
        finished
    }

    pub fn blur(&mut self, focus_moved_to: FocusTarget, now: Instant) {
        let grace = self.grace;
        if let InlineState::Editing { blur_deadline, .. } = &mut self.state {
            match focus_moved_to {
                FocusTarget::Toolbar | FocusTarget::LinkPopup => *blur_deadline = None,
                FocusTarget::Elsewhere => *blur_deadline = Some(now + grace),
            }
        }
    }

    /// The formatting toolbar was used; a pending blur no longer applies
    pub fn toolbar_interaction(&mut self) {
        if let InlineState::Editing { blur_deadline, .. } = &mut self.state {
            *blur_deadline = None;
        }
    }

    /// Deadline of a pending blur
    pub fn blur_deadline(&self) -> Option<Instant> {
        match &self.state {
            InlineState::Editing { blur_deadline, .. } => *blur_deadline,
            InlineState::Idle => None,
        }
    }

    /// End the edit if its blur grace period has passed
    pub fn poll(&mut self, now: Instant) -> Option<FinishedEdit> {
        match self.blur_deadline() {
            Some(deadline) if now >= deadline => self.finish(),
            _ => None,
        }
    }

    /// Whether the current edit has written content since the last call.
    /// The edit itself continues.
    pub fn take_changes(&mut self) -> bool {
        match &mut self.state {
            InlineState::Editing { changed, .. } => std::mem::take(changed),
            InlineState::Idle => false,
        }
    }

    /// End the current edit immediately
    pub fn finish(&mut self) -> Option<FinishedEdit> {
        match std::mem::replace(&mut self.state, InlineState::Idle) {
            InlineState::Editing {
                block_id, changed, ..
            } => {
                debug!(block_id = %block_id, changed, "Inline edit finished");
                Some(FinishedEdit { block_id, changed })
            }
            InlineState::Idle => None,
        }
    }
}

impl Default for InlineEditor {
    fn default() -> Self {
        Self::new()
    }
}
