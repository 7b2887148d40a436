//! # Startup Configuration
//!
//! Everything the host page hands the editor when it boots: which post is
//! being edited, where the API lives, the block type registry, the initial
//! block tree, and page layout settings.

use anvil_blocks::{BlockTypeRegistry, Document, IdGenerator, LoadedDocument};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Debounce before an autosave fires
pub const DEFAULT_AUTOSAVE_DELAY_MS: u64 = 30_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    pub post_id: i64,

    #[serde(default = "default_post_type")]
    pub post_type: String,

    #[serde(default)]
    pub post_title: String,

    /// Credential attached to every transport request
    #[serde(default)]
    pub auth_token: String,

    #[serde(default)]
    pub api_url: String,

    #[serde(default)]
    pub site_url: String,

    #[serde(default)]
    pub admin_url: String,

    #[serde(default)]
    pub registry: BlockTypeRegistry,

    /// Initial tree: a block array, a string holding stored content (block
    /// JSON or legacy HTML), or nothing
    #[serde(default)]
    pub blocks: serde_json::Value,

    #[serde(default)]
    pub page_settings: PageSettings,

    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,
}

fn default_post_type() -> String {
    "page".to_string()
}

fn default_autosave_delay_ms() -> u64 {
    DEFAULT_AUTOSAVE_DELAY_MS
}

impl EditorConfig {
    /// Minimal configuration for a post with an empty document
    pub fn new(post_id: i64) -> Self {
        Self {
            post_id,
            post_type: default_post_type(),
            post_title: String::new(),
            auth_token: String::new(),
            api_url: String::new(),
            site_url: String::new(),
            admin_url: String::new(),
            registry: BlockTypeRegistry::default(),
            blocks: serde_json::Value::Null,
            page_settings: PageSettings::default(),
            autosave_delay_ms: DEFAULT_AUTOSAVE_DELAY_MS,
        }
    }

    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        let config: EditorConfig = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.post_id <= 0 {
            return Err(ConfigError::Invalid(format!(
                "postId must be positive, got {}",
                self.post_id
            )));
        }
        Ok(())
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    /// Build the starting document from `blocks`. Columns containers that
    /// disagree with their `columnCount` are repaired before editing starts.
    pub fn initial_document(&self, ids: &mut IdGenerator) -> LoadedDocument {
        let mut loaded = self.stored_document(ids);
        loaded.document.normalize();
        loaded
    }

    fn stored_document(&self, ids: &mut IdGenerator) -> LoadedDocument {
        match &self.blocks {
            serde_json::Value::Null => LoadedDocument {
                document: Document::new(),
                converted_from_legacy: false,
            },
            serde_json::Value::String(raw) => Document::from_stored(raw, ids),
            serde_json::Value::Array(_) => match Document::from_json_value(self.blocks.clone()) {
                Ok(mut document) => {
                    document.fill_missing_ids(ids);
                    LoadedDocument {
                        document,
                        converted_from_legacy: false,
                    }
                }
                Err(_) => Document::from_stored(&self.blocks.to_string(), ids),
            },
            other => Document::from_stored(&other.to_string(), ids),
        }
    }
}

impl fmt::Debug for EditorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorConfig")
            .field("post_id", &self.post_id)
            .field("post_type", &self.post_type)
            .field("post_title", &self.post_title)
            .field("auth_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("site_url", &self.site_url)
            .field("admin_url", &self.admin_url)
            .field("registry_types", &self.registry.types().count())
            .field("page_settings", &self.page_settings)
            .field("autosave_delay_ms", &self.autosave_delay_ms)
            .finish()
    }
}

/// Page layout settings saved alongside the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSettings {
    #[serde(default = "default_content_width")]
    pub content_width: Length,

    #[serde(default)]
    pub padding: BoxSides<Length>,

    #[serde(default = "default_margin")]
    pub margin: BoxSides<Margin>,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            content_width: default_content_width(),
            padding: BoxSides::default(),
            margin: default_margin(),
        }
    }
}

fn default_content_width() -> Length {
    Length::new(1200.0, LengthUnit::Px)
}

fn default_margin() -> BoxSides<Margin> {
    BoxSides {
        top: Margin::Length(Length::default()),
        right: Margin::auto(),
        bottom: Margin::Length(Length::default()),
        left: Margin::auto(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LengthUnit {
    #[default]
    #[serde(rename = "px")]
    Px,
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "em")]
    Em,
    #[serde(rename = "rem")]
    Rem,
    #[serde(rename = "vw")]
    Vw,
    #[serde(rename = "vh")]
    Vh,
}

impl LengthUnit {
    pub fn as_css(self) -> &'static str {
        match self {
            LengthUnit::Px => "px",
            LengthUnit::Percent => "%",
            LengthUnit::Em => "em",
            LengthUnit::Rem => "rem",
            LengthUnit::Vw => "vw",
            LengthUnit::Vh => "vh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Length {
    pub value: f64,
    #[serde(default)]
    pub unit: LengthUnit,
}

impl Length {
    pub fn new(value: f64, unit: LengthUnit) -> Self {
        Self { value, unit }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.as_css())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginKeyword {
    Auto,
}

/// A margin is either a length or `"auto"`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Margin {
    Keyword(MarginKeyword),
    Length(Length),
}

impl Margin {
    pub fn auto() -> Self {
        Margin::Keyword(MarginKeyword::Auto)
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Margin::Keyword(MarginKeyword::Auto))
    }
}

impl Default for Margin {
    fn default() -> Self {
        Margin::Length(Length::default())
    }
}

impl fmt::Display for Margin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Margin::Keyword(MarginKeyword::Auto) => write!(f, "auto"),
            Margin::Length(length) => write!(f, "{}", length),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoxSides<T> {
    #[serde(default)]
    pub top: T,
    #[serde(default)]
    pub right: T,
    #[serde(default)]
    pub bottom: T,
    #[serde(default)]
    pub left: T,
}

impl<T: fmt::Display> BoxSides<T> {
    /// CSS shorthand, `top right bottom left`
    pub fn to_css(&self) -> String {
        format!("{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}
