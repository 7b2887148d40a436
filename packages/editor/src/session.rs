//! # Editor Session
//!
//! All state of one editing session in one place: the document, history,
//! selection, the active drag, the inline editor and the persistence client.
//! Every user gesture goes through a method here.
//!
//! Each applied mutation is committed to history and marks the document
//! dirty. Inline edits mark the document dirty on every write but are
//! committed to history once, when the edit ends (or when a discrete action
//! interrupts it).

use crate::config::{EditorConfig, PageSettings};
use crate::drop_target::{DragSession, DropTarget, Point, RenderedLayout};
use crate::errors::EditorResult;
use crate::mutations::{InsertTarget, Mutation, MutationContext, MutationError, MutationResult};
use crate::persistence::{
    PersistenceClient, PreviewResponse, SaveCompletion, SaveStatus, Transport,
};
use crate::sanitize::PasteSanitizer;
use crate::sync::{sync_region, FinishedEdit, FocusTarget, InlineEditor, RegionInput, SyncOutcome};
use crate::undo_stack::UndoStack;
use anvil_blocks::{Block, BlockTypeRegistry, Document, IdGenerator, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// What a mutation request ended up doing
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Applied(MutationResult),
    /// Nothing changed. Stale ids land here.
    Noop { reason: MutationError },
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied(_))
    }

    /// Id of the block the mutation created
    pub fn created(&self) -> Option<&str> {
        match self {
            MutationOutcome::Applied(result) => result.created.as_deref(),
            MutationOutcome::Noop { .. } => None,
        }
    }
}

pub struct EditorSession {
    post_id: i64,
    title: String,
    page_settings: PageSettings,
    registry: BlockTypeRegistry,
    document: Document,
    ids: IdGenerator,
    history: UndoStack,
    selection: Option<String>,
    drag: Option<DragSession>,
    inline: InlineEditor,
    sanitizer: PasteSanitizer,
    persistence: PersistenceClient,
    converted_from_legacy: bool,
}

impl EditorSession {
    pub fn new(config: EditorConfig, transport: Arc<dyn Transport>) -> EditorResult<Self> {
        Self::with_id_generator(config, transport, IdGenerator::random())
    }

    pub fn with_id_generator(
        config: EditorConfig,
        transport: Arc<dyn Transport>,
        mut ids: IdGenerator,
    ) -> EditorResult<Self> {
        config.validate()?;

        let loaded = config.initial_document(&mut ids);
        let mut history = UndoStack::new();
        history.commit(&loaded.document)?;

        let mut persistence =
            PersistenceClient::new(transport, config.post_id, config.autosave_delay());

        if loaded.converted_from_legacy {
            info!(post_id = config.post_id, "Converted legacy content into a single html block");
            persistence.mark_dirty(Instant::now());
        }

        debug!(
            post_id = config.post_id,
            blocks = loaded.document.block_count(),
            "Editor session started"
        );

        Ok(Self {
            post_id: config.post_id,
            title: config.post_title,
            page_settings: config.page_settings,
            registry: config.registry,
            document: loaded.document,
            ids,
            history,
            selection: None,
            drag: None,
            inline: InlineEditor::new(),
            sanitizer: PasteSanitizer::new()?,
            persistence,
            converted_from_legacy: loaded.converted_from_legacy,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn registry(&self) -> &BlockTypeRegistry {
        &self.registry
    }

    pub fn history(&self) -> &UndoStack {
        &self.history
    }

    pub fn post_id(&self) -> i64 {
        self.post_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn page_settings(&self) -> &PageSettings {
        &self.page_settings
    }

    /// Stored content was not a block tree and was wrapped on load
    pub fn converted_from_legacy(&self) -> bool {
        self.converted_from_legacy
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.persistence.mark_dirty(Instant::now());
    }

    pub fn set_page_settings(&mut self, page_settings: PageSettings) {
        self.page_settings = page_settings;
        self.persistence.mark_dirty(Instant::now());
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Apply one mutation, commit it to history and mark the document dirty
    pub fn apply(&mut self, mutation: Mutation) -> EditorResult<MutationOutcome> {
        self.commit_inline_changes()?;

        let mut ctx = MutationContext {
            registry: &self.registry,
            ids: &mut self.ids,
        };

        let result = match mutation.apply(&mut self.document, &mut ctx) {
            Ok(result) => result,
            Err(reason) => {
                warn!(mutation = mutation.name(), reason = %reason, "Mutation ignored");
                return Ok(MutationOutcome::Noop { reason });
            }
        };

        self.history.commit(&self.document)?;
        self.persistence.mark_dirty(Instant::now());
        self.revalidate_selection();

        Ok(MutationOutcome::Applied(result))
    }

    /// Insert a new block. Returns its id.
    pub fn insert_block(
        &mut self,
        block_type: &str,
        target: InsertTarget,
    ) -> EditorResult<Option<String>> {
        let outcome = self.apply(Mutation::InsertBlock {
            block_type: block_type.to_string(),
            target,
        })?;
        Ok(outcome.created().map(str::to_string))
    }

    pub fn move_block(&mut self, block_id: &str, target: InsertTarget) -> EditorResult<MutationOutcome> {
        self.apply(Mutation::MoveBlock {
            block_id: block_id.to_string(),
            target,
        })
    }

    /// Duplicate a block. Returns the copy's id.
    pub fn duplicate_block(&mut self, block_id: &str) -> EditorResult<Option<String>> {
        let outcome = self.apply(Mutation::DuplicateBlock {
            block_id: block_id.to_string(),
        })?;
        Ok(outcome.created().map(str::to_string))
    }

    pub fn delete_block(&mut self, block_id: &str) -> EditorResult<MutationOutcome> {
        self.apply(Mutation::DeleteBlock {
            block_id: block_id.to_string(),
        })
    }

    pub fn update_attribute(
        &mut self,
        block_id: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> EditorResult<MutationOutcome> {
        self.apply(Mutation::UpdateAttribute {
            block_id: block_id.to_string(),
            key: key.to_string(),
            value: value.into(),
        })
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn undo(&mut self) -> EditorResult<bool> {
        self.commit_inline_changes()?;
        let Some(document) = self.history.undo()? else {
            return Ok(false);
        };
        self.restore(document);
        Ok(true)
    }

    pub fn redo(&mut self) -> EditorResult<bool> {
        self.commit_inline_changes()?;
        let Some(document) = self.history.redo()? else {
            return Ok(false);
        };
        self.restore(document);
        Ok(true)
    }

    fn restore(&mut self, document: Document) {
        self.document = document;
        self.persistence.mark_dirty(Instant::now());
        self.revalidate_selection();

        if let Some(block_id) = self.inline.editing_block() {
            if !self.document.contains(block_id) {
                self.inline.finish();
            }
        }
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Select a block. Stale ids leave the selection unchanged.
    pub fn select(&mut self, block_id: &str) -> bool {
        if !self.document.contains(block_id) {
            return false;
        }
        self.selection = Some(block_id.to_string());
        true
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn selected_block(&self) -> Option<&Block> {
        self.selection.as_deref().and_then(|id| self.document.find(id))
    }

    fn revalidate_selection(&mut self) {
        if let Some(id) = &self.selection {
            if !self.document.contains(id) {
                debug!(block_id = %id, "Selected block is gone; clearing selection");
                self.selection = None;
            }
        }
    }

    // ------------------------------------------------------------------
    // Drag and drop
    // ------------------------------------------------------------------

    pub fn start_drag_new(&mut self, block_type: &str) {
        self.drag = Some(DragSession::new_block(block_type));
    }

    /// Start dragging an existing block. False when the id is stale.
    pub fn start_drag_move(&mut self, block_id: &str) -> bool {
        self.drag = DragSession::move_block(&self.document, block_id);
        self.drag.is_some()
    }

    pub fn drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    pub fn drag_pointer(&mut self, layout: &RenderedLayout, pointer: Point) -> Option<&DropTarget> {
        self.drag.as_mut()?.pointer_moved(layout, pointer)
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    /// Release the pointer. `None` when no drag was active or the drop was
    /// abandoned.
    pub fn end_drag(&mut self, layout: &RenderedLayout) -> EditorResult<Option<MutationOutcome>> {
        let Some(mutation) = self.drag.take().and_then(|drag| drag.release(layout)) else {
            return Ok(None);
        };
        self.apply(mutation).map(Some)
    }

    // ------------------------------------------------------------------
    // Inline editing
    // ------------------------------------------------------------------

    /// Focus the inline region of a block; selects the block
    pub fn inline_focus(&mut self, block_id: &str) -> EditorResult<bool> {
        if !self.select(block_id) {
            return Ok(false);
        }
        let finished = self.inline.focus(block_id);
        self.commit_finished(finished)?;
        Ok(true)
    }

    /// An input event in a block's inline region
    pub fn inline_input(&mut self, block_id: &str, input: &RegionInput) -> EditorResult<SyncOutcome> {
        let outcome = sync_region(&mut self.document, &self.registry, block_id, input);

        match outcome {
            SyncOutcome::BlockMissing => {}
            SyncOutcome::Unchanged => {
                let finished = self.inline.focus(block_id);
                self.commit_finished(finished)?;
            }
            SyncOutcome::Written => {
                let finished = self.inline.input(block_id);
                self.commit_finished(finished)?;
                self.persistence.mark_dirty(Instant::now());
            }
        }

        Ok(outcome)
    }

    pub fn inline_blur(&mut self, focus_moved_to: FocusTarget) {
        self.inline.blur(focus_moved_to, Instant::now());
    }

    pub fn toolbar_interaction(&mut self) {
        self.inline.toolbar_interaction();
    }

    pub fn inline_editor(&self) -> &InlineEditor {
        &self.inline
    }

    /// Clean pasted markup before it is inserted into a region
    pub fn sanitize_paste(&self, html: &str) -> String {
        self.sanitizer.sanitize(html)
    }

    fn commit_finished(&mut self, finished: Option<FinishedEdit>) -> EditorResult<()> {
        if let Some(edit) = finished {
            if edit.changed {
                debug!(block_id = %edit.block_id, "Committing inline edit");
                self.history.commit(&self.document)?;
            }
        }
        Ok(())
    }

    fn commit_inline_changes(&mut self) -> EditorResult<()> {
        if self.inline.take_changes() {
            self.history.commit(&self.document)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Earliest pending deadline: inline blur grace or autosave debounce
    pub fn next_deadline(&self) -> Option<Instant> {
        let autosave = if self.persistence.is_dirty() {
            self.persistence.autosave_deadline()
        } else {
            None
        };

        match (self.inline.blur_deadline(), autosave) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Finish an inline edit whose blur grace period has passed
    pub fn poll_inline(&mut self, now: Instant) -> EditorResult<Option<FinishedEdit>> {
        let finished = self.inline.poll(now);
        self.commit_finished(finished.clone())?;
        Ok(finished)
    }

    /// Run whatever is due: pending blurs, then autosave
    pub async fn tick(&mut self) -> EditorResult<Option<String>> {
        let now = Instant::now();
        self.poll_inline(now)?;

        if self.persistence.autosave_due(now) {
            return Ok(self.autosave().await);
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    pub fn is_dirty(&self) -> bool {
        self.persistence.is_dirty()
    }

    pub fn should_warn_before_leaving(&self) -> bool {
        self.persistence.should_warn_before_leaving()
    }

    pub fn save_status(&self) -> &SaveStatus {
        self.persistence.status()
    }

    pub fn persistence(&self) -> &PersistenceClient {
        &self.persistence
    }

    /// Save the canonical document. Returns the server timestamp.
    #[instrument(skip(self), fields(post_id = self.post_id))]
    pub async fn save(&mut self) -> EditorResult<String> {
        self.commit_inline_changes()?;
        let title = Some(self.title.clone());
        let page_settings = Some(self.page_settings.clone());
        Ok(self
            .persistence
            .save(&self.document, title, page_settings)
            .await?)
    }

    /// Start a save without holding the session; finish it with
    /// [`EditorSession::complete_save`]
    pub fn begin_save(&mut self) -> EditorResult<impl Future<Output = SaveCompletion> + Send + 'static> {
        self.commit_inline_changes()?;
        Ok(self.persistence.begin_save(
            &self.document,
            Some(self.title.clone()),
            Some(self.page_settings.clone()),
        ))
    }

    pub fn complete_save(&mut self, completion: SaveCompletion) -> EditorResult<String> {
        Ok(self.persistence.complete_save(completion)?)
    }

    /// Send the recovery copy if dirty. Failures are logged, not returned.
    #[instrument(skip(self), fields(post_id = self.post_id))]
    pub async fn autosave(&mut self) -> Option<String> {
        self.persistence.autosave(&self.document).await
    }

    /// Ask the server to render one block. `None` when the id is stale.
    #[instrument(skip(self), fields(post_id = self.post_id))]
    pub async fn preview(&self, block_id: &str) -> EditorResult<Option<PreviewResponse>> {
        let Some(block) = self.document.find(block_id) else {
            return Ok(None);
        };
        Ok(Some(self.persistence.preview(block).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryTransport;

    fn session() -> EditorSession {
        let config = EditorConfig::from_json(
            r#"{
                "postId": 5,
                "postTitle": "Home",
                "registry": {"paragraph": {"label": "Paragraph", "icon": "p", "attributes": {"content": {"default": ""}}}},
                "blocks": [
                    {"id": "a", "type": "paragraph", "attributes": {"content": "A"}},
                    {"id": "b", "type": "paragraph", "attributes": {"content": "B"}}
                ]
            }"#,
        )
        .unwrap();
        EditorSession::with_id_generator(
            config,
            Arc::new(MemoryTransport::new()),
            IdGenerator::sequential("t"),
        )
        .unwrap()
    }

    fn ids(session: &EditorSession) -> Vec<&str> {
        session.document().blocks().iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn test_session_creation() {
        let session = session();
        assert_eq!(ids(&session), vec!["a", "b"]);
        assert!(!session.is_dirty());
        assert!(session.selection().is_none());
        assert!(!session.history().can_undo());
    }

    #[test]
    fn test_mutation_marks_dirty_and_commits() {
        let mut session = session();
        let id = session.insert_block("paragraph", InsertTarget::top_level(1)).unwrap();

        assert_eq!(id.as_deref(), Some("t-1"));
        assert!(session.is_dirty());
        assert_eq!(session.history().undo_levels(), 1);
    }

    #[test]
    fn test_stale_id_is_noop() {
        let mut session = session();
        let outcome = session.delete_block("ghost").unwrap();

        assert!(!outcome.is_applied());
        assert!(!session.is_dirty());
        assert_eq!(session.history().undo_levels(), 0);
    }

    #[test]
    fn test_delete_clears_selection() {
        let mut session = session();
        assert!(session.select("a"));
        session.delete_block("a").unwrap();
        assert!(session.selection().is_none());
    }

    #[test]
    fn test_inline_edit_commits_once() {
        let mut session = session();
        session.inline_focus("a").unwrap();
        for text in ["H", "He", "Hel"] {
            session.inline_input("a", &RegionInput::new(text)).unwrap();
        }

        assert!(session.is_dirty());
        assert_eq!(session.history().undo_levels(), 0);

        session.inline_focus("b").unwrap();
        assert_eq!(session.history().undo_levels(), 1);

        session.undo().unwrap();
        assert_eq!(
            session.document().find("a").unwrap().attribute("content"),
            Some(&Value::from("A"))
        );
    }

    #[test]
    fn test_sanitize_paste() {
        let session = session();
        assert_eq!(
            session.sanitize_paste("<p style=\"x\">hi<script>x()</script></p>"),
            "<p>hi</p>"
        );
    }
}
