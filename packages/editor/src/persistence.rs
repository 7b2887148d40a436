//! # Persistence Client
//!
//! Tracks unsaved changes and talks to the server through a [`Transport`].
//!
//! - `save` sends the canonical document, title and page settings
//! - `autosave` sends a separate recovery copy; it never touches the
//!   canonical document and never clears the dirty flag
//! - `preview` asks the server to render a single block
//!
//! Every dirtying action bumps a revision counter and restarts the autosave
//! debounce. A successful save clears the dirty flag only if no dirtying
//! happened after its request was built. Responses are applied in the order
//! they arrive, and the server keeps whichever save it processed last.

use crate::config::PageSettings;
use anvil_blocks::{escape_html, Block, Document, IdGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Server rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    #[serde(rename = "post_id")]
    pub post_id: i64,

    pub blocks: Document,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_settings: Option<PageSettings>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutosaveRequest {
    pub post_id: i64,
    pub blocks: Document,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AutosaveResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// The block as rendered, with any missing id filled in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Block>,
}

/// Server side of persistence. Implementations own authentication and
/// timeouts.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn save(&self, request: SaveRequest) -> Result<SaveResponse, TransportError>;

    async fn autosave(&self, request: AutosaveRequest) -> Result<AutosaveResponse, TransportError>;

    async fn preview(&self, request: PreviewRequest) -> Result<PreviewResponse, TransportError>;
}

/// Status shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved {
        timestamp: String,
    },
    Failed {
        message: String,
    },
}

/// Debounce timer for autosave
#[derive(Debug, Clone)]
pub struct AutosaveTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl AutosaveTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn restart(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }
}

/// Result of an in-flight save, handed back to [`PersistenceClient::complete_save`]
#[derive(Debug)]
pub struct SaveCompletion {
    revision: u64,
    result: Result<SaveResponse, TransportError>,
}

#[derive(Debug)]
pub struct AutosaveCompletion {
    result: Result<AutosaveResponse, TransportError>,
}

pub struct PersistenceClient {
    transport: Arc<dyn Transport>,
    post_id: i64,
    dirty: bool,
    revision: u64,
    status: SaveStatus,
    autosave: AutosaveTimer,
    last_autosave: Option<String>,
}

impl PersistenceClient {
    pub fn new(transport: Arc<dyn Transport>, post_id: i64, autosave_delay: Duration) -> Self {
        Self {
            transport,
            post_id,
            dirty: false,
            revision: 0,
            status: SaveStatus::Idle,
            autosave: AutosaveTimer::new(autosave_delay),
            last_autosave: None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The page should confirm before navigating away
    pub fn should_warn_before_leaving(&self) -> bool {
        self.dirty
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn autosave_deadline(&self) -> Option<Instant> {
        self.autosave.deadline()
    }

    /// Timestamp of the last successful autosave
    pub fn last_autosave(&self) -> Option<&str> {
        self.last_autosave.as_deref()
    }

    /// Record a local change and restart the autosave debounce
    pub fn mark_dirty(&mut self, now: Instant) {
        self.dirty = true;
        self.revision += 1;
        self.autosave.restart(now);
    }

    /// Start a canonical save. The returned future does not borrow the
    /// client, so editing can continue while it runs.
    pub fn begin_save(
        &mut self,
        doc: &Document,
        title: Option<String>,
        page_settings: Option<PageSettings>,
    ) -> impl Future<Output = SaveCompletion> + Send + 'static {
        let request = SaveRequest {
            post_id: self.post_id,
            blocks: doc.clone(),
            title,
            page_settings,
        };
        let revision = self.revision;
        let transport = Arc::clone(&self.transport);

        self.status = SaveStatus::Saving;
        debug!(post_id = self.post_id, revision, blocks = doc.block_count(), "Save started");

        async move {
            SaveCompletion {
                revision,
                result: transport.save(request).await,
            }
        }
    }

    /// Apply a save response. Returns the server timestamp on success.
    pub fn complete_save(&mut self, completion: SaveCompletion) -> Result<String, PersistenceError> {
        let response = match completion.result {
            Ok(response) => response,
            Err(e) => {
                warn!(post_id = self.post_id, error = %e, "Save failed");
                self.status = SaveStatus::Failed {
                    message: e.to_string(),
                };
                return Err(e.into());
            }
        };

        if !response.success {
            let message = response
                .error
                .or(response.message)
                .unwrap_or_else(|| "Save failed".to_string());
            warn!(post_id = self.post_id, message = %message, "Save rejected");
            self.status = SaveStatus::Failed {
                message: message.clone(),
            };
            return Err(PersistenceError::Rejected(message));
        }

        let timestamp = response
            .timestamp
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

        if completion.revision == self.revision {
            self.dirty = false;
            self.autosave.cancel();
        } else {
            debug!(
                saved_revision = completion.revision,
                current_revision = self.revision,
                "Edits made during save; still dirty"
            );
        }

        info!(post_id = self.post_id, timestamp = %timestamp, "Saved");
        self.status = SaveStatus::Saved {
            timestamp: timestamp.clone(),
        };
        Ok(timestamp)
    }

    pub async fn save(
        &mut self,
        doc: &Document,
        title: Option<String>,
        page_settings: Option<PageSettings>,
    ) -> Result<String, PersistenceError> {
        let completion = self.begin_save(doc, title, page_settings).await;
        self.complete_save(completion)
    }

    /// Dirty and quiet for the whole debounce delay
    pub fn autosave_due(&self, now: Instant) -> bool {
        self.dirty && self.autosave.is_due(now)
    }

    /// Start an autosave if there is anything to save
    pub fn begin_autosave(
        &mut self,
        doc: &Document,
    ) -> Option<impl Future<Output = AutosaveCompletion> + Send + 'static> {
        if !self.dirty {
            return None;
        }

        self.autosave.cancel();
        let request = AutosaveRequest {
            post_id: self.post_id,
            blocks: doc.clone(),
        };
        let transport = Arc::clone(&self.transport);
        debug!(post_id = self.post_id, "Autosave started");

        Some(async move {
            AutosaveCompletion {
                result: transport.autosave(request).await,
            }
        })
    }

    /// Apply an autosave response. Failures are logged and otherwise
    /// ignored; the dirty flag is untouched either way.
    pub fn complete_autosave(&mut self, completion: AutosaveCompletion) -> Option<String> {
        match completion.result {
            Ok(AutosaveResponse {
                success: true,
                timestamp,
            }) => {
                let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
                debug!(post_id = self.post_id, timestamp = %timestamp, "Autosaved");
                self.last_autosave = Some(timestamp.clone());
                Some(timestamp)
            }
            Ok(_) => {
                warn!(post_id = self.post_id, "Autosave rejected");
                None
            }
            Err(e) => {
                warn!(post_id = self.post_id, error = %e, "Autosave failed");
                None
            }
        }
    }

    /// Autosave now if dirty. Returns the autosave timestamp on success.
    pub async fn autosave(&mut self, doc: &Document) -> Option<String> {
        let completion = self.begin_autosave(doc)?.await;
        self.complete_autosave(completion)
    }

    pub async fn preview(&self, block: &Block) -> Result<PreviewResponse, PersistenceError> {
        let response = self
            .transport
            .preview(PreviewRequest {
                block: block.clone(),
            })
            .await?;

        if !response.success {
            return Err(PersistenceError::Rejected(format!(
                "preview of {} failed",
                block.block_type
            )));
        }
        Ok(response)
    }
}

/// In-process transport. Keeps the canonical save and the autosave copy in
/// separate slots.
#[derive(Debug)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
}

#[derive(Debug)]
struct MemoryState {
    canonical: Option<SaveRequest>,
    autosave: Option<AutosaveRequest>,
    saves: usize,
    autosaves: usize,
    failure: Option<String>,
    ids: IdGenerator,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                canonical: None,
                autosave: None,
                saves: 0,
                autosaves: 0,
                failure: None,
                ids: IdGenerator::random(),
            }),
        }
    }

    /// Make every request fail with `message`, or succeed again with `None`
    pub async fn set_failure(&self, message: Option<&str>) {
        self.state.lock().await.failure = message.map(str::to_string);
    }

    pub async fn canonical(&self) -> Option<SaveRequest> {
        self.state.lock().await.canonical.clone()
    }

    pub async fn autosaved(&self) -> Option<AutosaveRequest> {
        self.state.lock().await.autosave.clone()
    }

    pub async fn save_count(&self) -> usize {
        self.state.lock().await.saves
    }

    pub async fn autosave_count(&self) -> usize {
        self.state.lock().await.autosaves
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn save(&self, request: SaveRequest) -> Result<SaveResponse, TransportError> {
        let mut state = self.state.lock().await;
        if let Some(message) = &state.failure {
            return Err(TransportError::Unavailable(message.clone()));
        }

        state.canonical = Some(request);
        state.saves += 1;
        Ok(SaveResponse {
            success: true,
            message: Some("Saved".to_string()),
            error: None,
            timestamp: Some(now_timestamp()),
        })
    }

    async fn autosave(&self, request: AutosaveRequest) -> Result<AutosaveResponse, TransportError> {
        let mut state = self.state.lock().await;
        if let Some(message) = &state.failure {
            return Err(TransportError::Unavailable(message.clone()));
        }

        state.autosave = Some(request);
        state.autosaves += 1;
        Ok(AutosaveResponse {
            success: true,
            timestamp: Some(now_timestamp()),
        })
    }

    async fn preview(&self, request: PreviewRequest) -> Result<PreviewResponse, TransportError> {
        let mut state = self.state.lock().await;
        if let Some(message) = &state.failure {
            return Err(TransportError::Unavailable(message.clone()));
        }

        let mut block = request.block;
        if block.id.is_empty() {
            block.id = state.ids.new_id();
        }

        let html = format!(
            r#"<div class="anvil-block anvil-block-{}" data-block-id="{}"></div>"#,
            escape_html(&block.block_type),
            escape_html(&block.id)
        );

        Ok(PreviewResponse {
            success: true,
            html: Some(html),
            block: Some(block),
        })
    }
}
