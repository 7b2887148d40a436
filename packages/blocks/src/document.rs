//! # Block Document
//!
//! The in-memory document: an ordered sequence of top-level blocks. Display
//! order is insertion order; there is no separate ordering key.
//!
//! ## Lifecycle
//!
//! ```text
//! stored JSON / legacy HTML → Document → mutations → JSON snapshot → storage
//! ```

use crate::block::{Block, COLUMN_COUNT_KEY, MAX_COLUMNS, MIN_COLUMNS};
use crate::error::DocumentError;
use crate::id_generator::IdGenerator;
use crate::location::Location;
use crate::value::Value;
use crate::visitor::{walk_block, walk_block_mut, Visitor, VisitorMut};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

/// Block type used to wrap legacy HTML content
pub const LEGACY_BLOCK_TYPE: &str = "html";

/// Attribute holding the wrapped legacy markup
pub const LEGACY_CONTENT_KEY: &str = "content";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    blocks: Vec<Block>,
}

/// Result of loading stored content
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub document: Document,
    /// True when the stored content was not a block tree and was wrapped
    pub converted_from_legacy: bool,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Top-level blocks in display order
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    /// Number of top-level blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Every block in the document, nested ones included
    pub fn block_count(&self) -> usize {
        self.blocks.iter().map(Block::block_count).sum()
    }

    /// Parse a JSON array of blocks
    pub fn from_json(source: &str) -> Result<Self, DocumentError> {
        let value: serde_json::Value = serde_json::from_str(source)?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, DocumentError> {
        if !value.is_array() {
            return Err(DocumentError::NotAnArray {
                found: json_kind(&value),
            });
        }

        let blocks: Vec<Block> = serde_json::from_value(value)?;
        Ok(Self { blocks })
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(&self.blocks)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(&self.blocks)?)
    }

    /// Load stored content that may predate the block format.
    ///
    /// A JSON array of blocks loads as-is. Anything else that is not blank
    /// (legacy HTML, or block data too damaged to read) is kept by wrapping it
    /// in a single `"html"` block. Blank input gives an empty document.
    /// Blocks stored without an id get a fresh one.
    pub fn from_stored(raw: &str, ids: &mut IdGenerator) -> LoadedDocument {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return LoadedDocument {
                document: Document::new(),
                converted_from_legacy: false,
            };
        }

        match Self::from_json(trimmed) {
            Ok(mut document) => {
                document.fill_missing_ids(ids);
                LoadedDocument {
                    document,
                    converted_from_legacy: false,
                }
            }
            Err(err) => {
                if trimmed.starts_with('[') {
                    warn!(error = %err, "Stored block data is unreadable, wrapping it as HTML");
                } else {
                    debug!(error = %err, "Stored content is not a block tree, converting legacy HTML");
                }

                let block = Block::new(
                    ids.new_id(),
                    LEGACY_BLOCK_TYPE,
                    [(LEGACY_CONTENT_KEY.to_string(), Value::from(raw))].into(),
                );
                LoadedDocument {
                    document: Document::from_blocks(vec![block]),
                    converted_from_legacy: true,
                }
            }
        }
    }

    /// Give every block with an empty id a freshly minted one, skipping
    /// any minted id the document already uses.
    /// Returns how many ids were assigned.
    pub fn fill_missing_ids(&mut self, ids: &mut IdGenerator) -> usize {
        let mut collector = IdCollector::default();
        collector.visit_document(self);

        let mut filler = MissingIdFiller {
            ids,
            taken: collector.ids,
            filled: 0,
        };
        for block in &mut self.blocks {
            filler.visit_block_mut(block);
        }
        filler.filled
    }

    /// Bring every columns container back in line with its `columnCount`
    /// (see [`Block::normalize_columns`]). Returns how many blocks were moved
    /// out of surplus slots.
    pub fn normalize(&mut self) -> usize {
        let mut normalizer = ColumnNormalizer::default();
        for block in &mut self.blocks {
            normalizer.visit_block_mut(block);
        }

        if normalizer.repaired > 0 {
            warn!(
                repaired = normalizer.repaired,
                relocated = normalizer.relocated,
                "Column containers did not match their columnCount and were repaired"
            );
        }
        normalizer.relocated
    }

    /// Check the structural invariants of the tree
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut checker = InvariantChecker::default();
        checker.visit_document(self);
        checker.violations
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[derive(Default)]
struct IdCollector {
    ids: HashSet<String>,
}

impl Visitor for IdCollector {
    fn visit_block(&mut self, block: &Block, _location: &Location) {
        if !block.id.is_empty() {
            self.ids.insert(block.id.clone());
        }
        walk_block(self, block);
    }
}

struct MissingIdFiller<'a> {
    ids: &'a mut IdGenerator,
    taken: HashSet<String>,
    filled: usize,
}

impl MissingIdFiller<'_> {
    fn next_free_id(&mut self) -> String {
        loop {
            let id = self.ids.new_id();
            if self.taken.insert(id.clone()) {
                return id;
            }
            debug!(id = %id, "Generated id is already in use, trying the next one");
        }
    }
}

impl VisitorMut for MissingIdFiller<'_> {
    fn visit_block_mut(&mut self, block: &mut Block) {
        if block.id.is_empty() {
            block.id = self.next_free_id();
            self.filled += 1;
        }
        walk_block_mut(self, block);
    }
}

#[derive(Default)]
struct ColumnNormalizer {
    repaired: usize,
    relocated: usize,
}

impl VisitorMut for ColumnNormalizer {
    fn visit_block_mut(&mut self, block: &mut Block) {
        if block.is_columns() {
            let before = (block.attribute(COLUMN_COUNT_KEY).cloned(), block.column_count());
            self.relocated += block.normalize_columns();
            if before != (block.attribute(COLUMN_COUNT_KEY).cloned(), block.column_count()) {
                self.repaired += 1;
            }
        }
        walk_block_mut(self, block);
    }
}

/// A broken tree invariant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum InvariantViolation {
    #[serde(rename_all = "camelCase")]
    DuplicateId { id: String },
    #[serde(rename_all = "camelCase")]
    MissingId { location: Location },
    #[serde(rename_all = "camelCase")]
    ColumnCountMismatch {
        id: String,
        declared: Option<i64>,
        slots: usize,
    },
    #[serde(rename_all = "camelCase")]
    ColumnCountOutOfRange { id: String, count: i64 },
    #[serde(rename_all = "camelCase")]
    NestedColumns { id: String, parent_id: String },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::DuplicateId { id } => write!(f, "block id {:?} is used more than once", id),
            InvariantViolation::MissingId { location } => write!(f, "block at {:?} has no id", location),
            InvariantViolation::ColumnCountMismatch { id, declared, slots } => match declared {
                Some(n) => write!(f, "columns block {:?} declares {} columns but has {} slots", id, n, slots),
                None => write!(f, "columns block {:?} has no columnCount ({} slots)", id, slots),
            },
            InvariantViolation::ColumnCountOutOfRange { id, count } => write!(
                f,
                "columns block {:?} has columnCount {} (allowed {}-{})",
                id, count, MIN_COLUMNS, MAX_COLUMNS
            ),
            InvariantViolation::NestedColumns { id, parent_id } => write!(
                f,
                "columns block {:?} is nested inside columns block {:?}",
                id, parent_id
            ),
        }
    }
}

#[derive(Default)]
struct InvariantChecker {
    seen: HashSet<String>,
    violations: Vec<InvariantViolation>,
}

impl Visitor for InvariantChecker {
    fn visit_block(&mut self, block: &Block, location: &Location) {
        if block.id.is_empty() {
            self.violations.push(InvariantViolation::MissingId {
                location: location.clone(),
            });
        } else if !self.seen.insert(block.id.clone()) {
            self.violations.push(InvariantViolation::DuplicateId {
                id: block.id.clone(),
            });
        }

        if block.is_columns() {
            if let Location::InColumn { parent_id, .. } = location {
                self.violations.push(InvariantViolation::NestedColumns {
                    id: block.id.clone(),
                    parent_id: parent_id.clone(),
                });
            }

            let declared = block.attribute(COLUMN_COUNT_KEY).and_then(Value::as_integer);
            let slots = block.column_count();

            if let Some(count) = declared {
                if count < MIN_COLUMNS as i64 || count > MAX_COLUMNS as i64 {
                    self.violations.push(InvariantViolation::ColumnCountOutOfRange {
                        id: block.id.clone(),
                        count,
                    });
                }
            }

            if declared != i64::try_from(slots).ok() {
                self.violations.push(InvariantViolation::ColumnCountMismatch {
                    id: block.id.clone(),
                    declared,
                    slots,
                });
            }
        }

        walk_block(self, block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Attributes, COLUMNS_TYPE};

    fn block(id: &str) -> Block {
        Block::new(id, "paragraph", Attributes::new())
    }

    #[test]
    fn test_parse_document() {
        let json = r#"[
            {"id": "a", "type": "heading", "attributes": {"level": 2, "content": "Hi"}},
            {"id": "b", "type": "columns", "attributes": {"columnCount": 2, "columns": [
                [{"id": "c", "type": "paragraph", "attributes": {"content": "left"}}],
                []
            ]}}
        ]"#;

        let doc = Document::from_json(json).unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.block_count(), 3);
        assert!(doc.check_invariants().is_empty());
    }

    #[test]
    fn test_round_trip_is_structurally_identical() {
        let mut columns = Block::new("cols", COLUMNS_TYPE, [("columnCount".to_string(), Value::Integer(3))].into());
        columns.column_mut(2).unwrap().push(Block::new(
            "nested",
            "image",
            [
                ("url".to_string(), Value::from("/a.png")),
                ("width".to_string(), Value::Float(50.5)),
                ("rounded".to_string(), Value::Bool(true)),
            ]
            .into(),
        ));
        let doc = Document::from_blocks(vec![block("a"), columns, block("z")]);

        let json = doc.to_json().unwrap();
        let parsed = Document::from_json(&json).unwrap();

        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_non_array_is_rejected() {
        let err = Document::from_json(r#"{"id": "a"}"#).unwrap_err();
        assert!(matches!(err, DocumentError::NotAnArray { found: "an object" }));
    }

    #[test]
    fn test_from_stored_converts_legacy_html() {
        let mut ids = IdGenerator::sequential("legacy");
        let loaded = Document::from_stored("<p>Old <b>post</b></p>", &mut ids);

        assert!(loaded.converted_from_legacy);
        assert_eq!(loaded.document.len(), 1);
        let wrapped = &loaded.document.blocks()[0];
        assert_eq!(wrapped.block_type, LEGACY_BLOCK_TYPE);
        assert_eq!(wrapped.id, "legacy-1");
        assert_eq!(
            wrapped.attribute(LEGACY_CONTENT_KEY),
            Some(&Value::from("<p>Old <b>post</b></p>"))
        );
    }

    #[test]
    fn test_from_stored_blank_is_empty() {
        let mut ids = IdGenerator::sequential("x");
        let loaded = Document::from_stored("   \n", &mut ids);
        assert!(loaded.document.is_empty());
        assert!(!loaded.converted_from_legacy);
    }

    #[test]
    fn test_from_stored_fills_missing_ids() {
        let mut ids = IdGenerator::sequential("fill");
        let loaded = Document::from_stored(
            r#"[{"type": "paragraph", "attributes": {}}, {"id": "keep", "type": "paragraph"}]"#,
            &mut ids,
        );

        assert!(!loaded.converted_from_legacy);
        assert_eq!(loaded.document.blocks()[0].id, "fill-1");
        assert_eq!(loaded.document.blocks()[1].id, "keep");
    }

    #[test]
    fn test_fill_missing_ids_skips_ids_in_use() {
        let mut ids = IdGenerator::sequential("conv");
        let mut doc = Document::from_blocks(vec![block("conv-1"), block("")]);

        assert_eq!(doc.fill_missing_ids(&mut ids), 1);
        assert_eq!(doc.blocks()[1].id, "conv-2");
        assert!(doc.check_invariants().is_empty());
    }

    #[test]
    fn test_fill_missing_ids_skips_nested_ids_in_use() {
        let mut ids = IdGenerator::sequential("n");
        let mut columns = Block::new("cols", COLUMNS_TYPE, Attributes::new());
        columns.column_mut(1).unwrap().push(block("n-1"));
        columns.column_mut(1).unwrap().push(block("n-2"));
        let mut doc = Document::from_blocks(vec![block(""), columns, block("")]);

        assert_eq!(doc.fill_missing_ids(&mut ids), 2);
        assert_eq!(doc.blocks()[0].id, "n-3");
        assert_eq!(doc.blocks()[2].id, "n-4");
    }

    #[test]
    fn test_parsed_tree_reports_column_violations() {
        let doc = Document::from_json(
            r#"[
                {"id": "c", "type": "columns", "attributes": {"columnCount": 9, "columns": [[], []]}},
                {"id": "d", "type": "columns", "attributes": {"columnCount": 2, "columns": [[], [],
                    [{"id": "x", "type": "paragraph", "attributes": {}}]]}}
            ]"#,
        )
        .unwrap();

        let violations = doc.check_invariants();
        assert!(violations.contains(&InvariantViolation::ColumnCountOutOfRange {
            id: "c".to_string(),
            count: 9,
        }));
        assert!(violations.contains(&InvariantViolation::ColumnCountMismatch {
            id: "d".to_string(),
            declared: Some(2),
            slots: 3,
        }));
    }

    #[test]
    fn test_normalize_repairs_columns() {
        let mut doc = Document::from_json(
            r#"[
                {"id": "c", "type": "columns", "attributes": {"columnCount": 9, "columns": [[], []]}},
                {"id": "d", "type": "columns", "attributes": {"columnCount": 2, "columns": [
                    [], [{"id": "y", "type": "paragraph", "attributes": {}}],
                    [{"id": "x", "type": "paragraph", "attributes": {}}]]}}
            ]"#,
        )
        .unwrap();

        assert_eq!(doc.normalize(), 1);
        assert!(doc.check_invariants().is_empty());
        assert_eq!(doc.find("c").unwrap().column_count(), 6);

        let d = doc.find("d").unwrap();
        let ids: Vec<_> = d.column(1).unwrap().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["y", "x"]);

        assert_eq!(doc.normalize(), 0);
    }

    #[test]
    fn test_detects_duplicate_ids() {
        let mut columns = Block::new("cols", COLUMNS_TYPE, Attributes::new());
        columns.column_mut(0).unwrap().push(block("a"));
        let doc = Document::from_blocks(vec![block("a"), columns]);

        assert_eq!(
            doc.check_invariants(),
            vec![InvariantViolation::DuplicateId { id: "a".to_string() }]
        );
    }

    #[test]
    fn test_detects_nested_columns_and_count_mismatch() {
        let inner = Block::new("inner", COLUMNS_TYPE, Attributes::new());
        let mut outer = Block::new("outer", COLUMNS_TYPE, Attributes::new());
        outer.column_mut(0).unwrap().push(inner);
        outer.columns.as_mut().unwrap().push(Vec::new());
        let doc = Document::from_blocks(vec![outer]);

        let violations = doc.check_invariants();
        assert!(violations.contains(&InvariantViolation::NestedColumns {
            id: "inner".to_string(),
            parent_id: "outer".to_string(),
        }));
        assert!(violations.contains(&InvariantViolation::ColumnCountMismatch {
            id: "outer".to_string(),
            declared: Some(2),
            slots: 3,
        }));
    }
}
