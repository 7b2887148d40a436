//! # Block Type Registry
//!
//! Maps a block type name to its label, icon, and attribute schema. The
//! editor reads it to seed new blocks with defaults, to pick a settings
//! control per attribute, and to check attribute values against their
//! declared kind. Which types exist, and how each renders, is decided by the
//! host; an unknown type is still a valid tree member and renders as an inert
//! placeholder.
//!
//! Registry data arrives as JSON:
//!
//! ```json
//! {
//!   "heading": {
//!     "label": "Heading",
//!     "icon": "heading",
//!     "attributes": {
//!       "content": { "default": "" },
//!       "level": { "default": 2, "type": "integer", "options": [1, 2, 3, 4, 5, 6] }
//!     }
//!   }
//! }
//! ```

use crate::block::{Attributes, Block, COLUMNS_KEY, COLUMNS_TYPE, COLUMN_COUNT_KEY, DEFAULT_COLUMNS};
use crate::error::RegistryError;
use crate::location::Location;
use crate::value::Value;
use crate::visitor::{walk_block, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Declared kind of an attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttributeKind {
    Boolean,
    Number,
    Integer,
    String,
    /// Any other hint; values are not checked
    Other(String),
}

impl From<String> for AttributeKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "boolean" => AttributeKind::Boolean,
            "number" => AttributeKind::Number,
            "integer" => AttributeKind::Integer,
            "string" => AttributeKind::String,
            _ => AttributeKind::Other(name),
        }
    }
}

impl From<AttributeKind> for String {
    fn from(kind: AttributeKind) -> Self {
        match kind {
            AttributeKind::Boolean => "boolean".to_string(),
            AttributeKind::Number => "number".to_string(),
            AttributeKind::Integer => "integer".to_string(),
            AttributeKind::String => "string".to_string(),
            AttributeKind::Other(name) => name,
        }
    }
}

impl AttributeKind {
    /// Whether `value` fits this kind. `null` fits every kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (AttributeKind::Boolean, Value::Bool(_)) => true,
            (AttributeKind::Number, Value::Integer(_) | Value::UInt(_) | Value::Float(_)) => true,
            (AttributeKind::Integer, Value::Integer(_) | Value::UInt(_)) => true,
            (AttributeKind::Integer, Value::Float(f)) => f.fract() == 0.0,
            (AttributeKind::String, Value::String(_)) => true,
            (AttributeKind::Other(_), _) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeSchema {
    #[serde(default)]
    pub default: Value,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AttributeKind>,

    /// Allowed values; presence turns the settings control into a select
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockTypeDefinition {
    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub icon: String,

    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeSchema>,
}

/// Settings-panel control chosen for an attribute
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsControl {
    Checkbox,
    Select(Vec<Value>),
    NumberInput,
    TextInput,
}

/// Attribute value that does not match its declared kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaViolation {
    pub block_id: String,
    pub block_type: String,
    /// `None` when the whole block type is unknown
    pub attribute: Option<String>,
    pub expected: Option<String>,
    pub found: Option<&'static str>,
}

impl SchemaViolation {
    /// Unknown block types are informational, not corruption
    pub fn is_unknown_type(&self) -> bool {
        self.attribute.is_none()
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.attribute, &self.expected, self.found) {
            (Some(attribute), Some(expected), Some(found)) => write!(
                f,
                "block {:?} ({}): attribute {:?} should be {} but is {}",
                self.block_id, self.block_type, attribute, expected, found
            ),
            _ => write!(
                f,
                "block {:?} has unknown type {:?}",
                self.block_id, self.block_type
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockTypeRegistry {
    types: BTreeMap<String, BlockTypeDefinition>,
}

impl BlockTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(source: &str) -> Result<Self, RegistryError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn register(&mut self, name: impl Into<String>, definition: BlockTypeDefinition) {
        self.types.insert(name.into(), definition);
    }

    pub fn get(&self, block_type: &str) -> Option<&BlockTypeDefinition> {
        self.types.get(block_type)
    }

    pub fn contains(&self, block_type: &str) -> bool {
        self.types.contains_key(block_type)
    }

    pub fn types(&self) -> impl Iterator<Item = (&str, &BlockTypeDefinition)> {
        self.types.iter().map(|(name, def)| (name.as_str(), def))
    }

    pub fn label(&self, block_type: &str) -> Option<&str> {
        self.get(block_type).map(|def| def.label.as_str())
    }

    /// Attribute defaults for a new block of `block_type`. Every key in the
    /// schema is present. Unknown types get an empty map.
    pub fn defaults_for(&self, block_type: &str) -> Attributes {
        let mut attributes: Attributes = self
            .get(block_type)
            .map(|def| {
                def.attributes
                    .iter()
                    .filter(|(key, _)| key.as_str() != COLUMNS_KEY)
                    .map(|(key, schema)| (key.clone(), schema.default.clone()))
                    .collect()
            })
            .unwrap_or_default();

        if block_type == COLUMNS_TYPE {
            attributes.insert(
                COLUMN_COUNT_KEY.to_string(),
                Value::from(self.default_column_count()),
            );
        }

        attributes
    }

    /// `columnCount` default declared for the columns type, or 2
    pub fn default_column_count(&self) -> i64 {
        self.get(COLUMNS_TYPE)
            .and_then(|def| def.attributes.get(COLUMN_COUNT_KEY))
            .and_then(|schema| schema.default.as_integer())
            .unwrap_or(DEFAULT_COLUMNS as i64)
    }

    /// Settings-panel control for one attribute
    pub fn settings_control(&self, block_type: &str, attribute: &str) -> Option<SettingsControl> {
        let schema = self.get(block_type)?.attributes.get(attribute)?;

        if !schema.options.is_empty() {
            return Some(SettingsControl::Select(schema.options.clone()));
        }

        let control = match &schema.kind {
            Some(AttributeKind::Boolean) => SettingsControl::Checkbox,
            Some(AttributeKind::Number | AttributeKind::Integer) => SettingsControl::NumberInput,
            Some(_) => SettingsControl::TextInput,
            None => match schema.default {
                Value::Bool(_) => SettingsControl::Checkbox,
                Value::Integer(_) | Value::UInt(_) | Value::Float(_) => SettingsControl::NumberInput,
                _ => SettingsControl::TextInput,
            },
        };
        Some(control)
    }

    /// Check one block (and anything nested under it) against the schema
    pub fn validate_block(&self, block: &Block) -> Vec<SchemaViolation> {
        let mut validator = SchemaValidator {
            registry: self,
            violations: Vec::new(),
        };
        validator.check(block);
        walk_block(&mut validator, block);
        validator.violations
    }

    /// Check every block of a document against the schema
    pub fn validate_document(&self, doc: &crate::Document) -> Vec<SchemaViolation> {
        let mut validator = SchemaValidator {
            registry: self,
            violations: Vec::new(),
        };
        validator.visit_document(doc);
        validator.violations
    }

    /// Inert markup shown for a block type the registry does not know
    pub fn render_placeholder(&self, block_type: &str) -> String {
        let name = escape_html(block_type);
        format!(
            r#"<div class="anvil-block-unknown" data-block-type="{name}">Unknown block type: {name}</div>"#
        )
    }
}

struct SchemaValidator<'a> {
    registry: &'a BlockTypeRegistry,
    violations: Vec<SchemaViolation>,
}

impl SchemaValidator<'_> {
    fn check(&mut self, block: &Block) {
        let Some(definition) = self.registry.get(&block.block_type) else {
            self.violations.push(SchemaViolation {
                block_id: block.id.clone(),
                block_type: block.block_type.clone(),
                attribute: None,
                expected: None,
                found: None,
            });
            return;
        };

        for (key, value) in &block.attributes {
            let Some(kind) = definition.attributes.get(key).and_then(|s| s.kind.as_ref()) else {
                continue;
            };
            if !kind.accepts(value) {
                self.violations.push(SchemaViolation {
                    block_id: block.id.clone(),
                    block_type: block.block_type.clone(),
                    attribute: Some(key.clone()),
                    expected: Some(String::from(kind.clone())),
                    found: Some(value.kind_name()),
                });
            }
        }
    }
}

impl Visitor for SchemaValidator<'_> {
    fn visit_block(&mut self, block: &Block, _location: &Location) {
        self.check(block);
        walk_block(self, block);
    }
}

/// Escape text for HTML content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
