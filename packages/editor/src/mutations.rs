//! # Block Mutations
//!
//! The only operations that change the block tree.
//!
//! ## Mutation Semantics
//!
//! ### Insert
//! - Builds a block from registry defaults with a fresh id
//! - Top-level targets insert before `index`, appending when the index is
//!   missing or out of range; column targets append to the slot
//!
//! ### Move
//! - Atomic remove-then-insert; the block is never in two places
//! - A top-level `index` names the block the moved one lands above, counted
//!   before removal. When the block came from an earlier top-level index, the
//!   removal shifts everything after it left by one, so the insertion index is
//!   `index - 1`
//!
//! ### Duplicate
//! - Deep copy placed right after the original, in the same sequence
//! - The copy and everything nested in it get fresh ids
//!
//! ### Delete
//! - Removes the block and everything nested under it
//!
//! ### UpdateAttribute
//! - Sets one attribute
//! - `columnCount` on a columns block resizes its slots. Shrinking moves the
//!   blocks of dropped slots onto the end of the last kept slot
//!
//! Every failed mutation leaves the tree untouched.

use anvil_blocks::visitor::{walk_block_mut, VisitorMut};
use anvil_blocks::{
    clamp_column_count, resize_slots, Block, BlockTypeRegistry, Document, IdGenerator, Location,
    Value, COLUMNS_KEY, COLUMNS_TYPE, COLUMN_COUNT_KEY,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Where a new or moved block goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InsertTarget {
    /// Before the top-level block at `index`; `None` appends
    TopLevel {
        #[serde(default)]
        index: Option<usize>,
    },
    /// Appended to a column slot of a top-level columns block
    #[serde(rename_all = "camelCase")]
    Column {
        parent_id: String,
        column_index: usize,
    },
}

impl InsertTarget {
    pub fn top_level(index: usize) -> Self {
        InsertTarget::TopLevel { index: Some(index) }
    }

    pub fn append() -> Self {
        InsertTarget::TopLevel { index: None }
    }

    pub fn column(parent_id: impl Into<String>, column_index: usize) -> Self {
        InsertTarget::Column {
            parent_id: parent_id.into(),
            column_index,
        }
    }
}

/// Semantic mutations on the block tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Mutation {
    #[serde(rename_all = "camelCase")]
    InsertBlock {
        block_type: String,
        target: InsertTarget,
    },

    #[serde(rename_all = "camelCase")]
    MoveBlock {
        block_id: String,
        target: InsertTarget,
    },

    #[serde(rename_all = "camelCase")]
    DuplicateBlock { block_id: String },

    #[serde(rename_all = "camelCase")]
    DeleteBlock { block_id: String },

    #[serde(rename_all = "camelCase")]
    UpdateAttribute {
        block_id: String,
        key: String,
        value: Value,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MutationError {
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("Column {column_index} of block {parent_id} not found")]
    ColumnNotFound {
        parent_id: String,
        column_index: usize,
    },

    #[error("Columns blocks cannot be placed inside a column")]
    NestedColumns,

    #[error("Attribute {0:?} is reserved")]
    ReservedAttribute(String),

    #[error("Invalid column count: {0}")]
    InvalidColumnCount(String),
}

/// What an applied mutation did
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MutationResult {
    /// Id of the block the mutation created (insert, duplicate)
    pub created: Option<String>,

    /// Where the affected block ended up
    pub location: Option<Location>,

    /// Blocks removed from the tree (delete), nested ones included
    pub removed: usize,

    /// Nested blocks relocated by a column shrink
    pub relocated: usize,
}

/// Collaborators a mutation needs besides the tree
pub struct MutationContext<'a> {
    pub registry: &'a BlockTypeRegistry,
    pub ids: &'a mut IdGenerator,
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::InsertBlock { .. } => "insert",
            Mutation::MoveBlock { .. } => "move",
            Mutation::DuplicateBlock { .. } => "duplicate",
            Mutation::DeleteBlock { .. } => "delete",
            Mutation::UpdateAttribute { .. } => "update_attribute",
        }
    }

    /// Apply to the tree. On error the tree is unchanged.
    pub fn apply(
        &self,
        doc: &mut Document,
        ctx: &mut MutationContext<'_>,
    ) -> Result<MutationResult, MutationError> {
        let result = match self {
            Mutation::InsertBlock { block_type, target } => {
                Self::apply_insert(doc, ctx, block_type, target)
            }

            Mutation::MoveBlock { block_id, target } => Self::apply_move(doc, block_id, target),

            Mutation::DuplicateBlock { block_id } => Self::apply_duplicate(doc, ctx, block_id),

            Mutation::DeleteBlock { block_id } => Self::apply_delete(doc, block_id),

            Mutation::UpdateAttribute {
                block_id,
                key,
                value,
            } => Self::apply_update_attribute(doc, block_id, key, value),
        };

        match &result {
            Ok(outcome) => debug!(mutation = self.name(), created = ?outcome.created, "Mutation applied"),
            Err(e) => debug!(mutation = self.name(), error = %e, "Mutation skipped"),
        }

        result
    }

    fn apply_insert(
        doc: &mut Document,
        ctx: &mut MutationContext<'_>,
        block_type: &str,
        target: &InsertTarget,
    ) -> Result<MutationResult, MutationError> {
        Self::check_target(doc, target, block_type == COLUMNS_TYPE)?;

        let id = ctx.ids.new_id();
        let block = Block::new(id.clone(), block_type, ctx.registry.defaults_for(block_type));

        let location = match target {
            InsertTarget::TopLevel { index } => Location::TopLevel {
                index: doc.insert_top_level(*index, block),
            },
            InsertTarget::Column {
                parent_id,
                column_index,
            } => doc
                .insert_in_column(parent_id, *column_index, None, block)
                .map_err(|_| MutationError::ColumnNotFound {
                    parent_id: parent_id.clone(),
                    column_index: *column_index,
                })?,
        };

        Ok(MutationResult {
            created: Some(id),
            location: Some(location),
            ..MutationResult::default()
        })
    }

    fn apply_move(
        doc: &mut Document,
        block_id: &str,
        target: &InsertTarget,
    ) -> Result<MutationResult, MutationError> {
        let is_columns = doc
            .find(block_id)
            .map(Block::is_columns)
            .ok_or_else(|| MutationError::BlockNotFound(block_id.to_string()))?;

        Self::check_target(doc, target, is_columns)?;

        let (block, from) = doc
            .remove_from_anywhere(block_id)
            .ok_or_else(|| MutationError::BlockNotFound(block_id.to_string()))?;

        let location = match target {
            InsertTarget::TopLevel { index } => {
                let index = match (*index, &from) {
                    (Some(target), Location::TopLevel { index: prior }) if *prior < target => {
                        Some(target - 1)
                    }
                    (index, _) => index,
                };
                Location::TopLevel {
                    index: doc.insert_top_level(index, block),
                }
            }
            InsertTarget::Column {
                parent_id,
                column_index,
            } => match doc.insert_in_column(parent_id, *column_index, None, block) {
                Ok(location) => location,
                Err(block) => {
                    Self::restore(doc, &from, block);
                    return Err(MutationError::ColumnNotFound {
                        parent_id: parent_id.clone(),
                        column_index: *column_index,
                    });
                }
            },
        };

        Ok(MutationResult {
            location: Some(location),
            ..MutationResult::default()
        })
    }

    fn apply_duplicate(
        doc: &mut Document,
        ctx: &mut MutationContext<'_>,
        block_id: &str,
    ) -> Result<MutationResult, MutationError> {
        let location = doc
            .locate(block_id)
            .ok_or_else(|| MutationError::BlockNotFound(block_id.to_string()))?;
        let original = doc
            .get(&location)
            .ok_or_else(|| MutationError::BlockNotFound(block_id.to_string()))?;

        let mut copy = original.clone();
        let mut refresher = FreshIds { ids: ctx.ids };
        refresher.visit_block_mut(&mut copy);
        let id = copy.id.clone();

        let location = match &location {
            Location::TopLevel { index } => Location::TopLevel {
                index: doc.insert_top_level(Some(index + 1), copy),
            },
            Location::InColumn {
                parent_id,
                column_index,
                index,
            } => doc
                .insert_in_column(parent_id, *column_index, Some(index + 1), copy)
                .map_err(|_| MutationError::BlockNotFound(block_id.to_string()))?,
        };

        Ok(MutationResult {
            created: Some(id),
            location: Some(location),
            ..MutationResult::default()
        })
    }

    fn apply_delete(doc: &mut Document, block_id: &str) -> Result<MutationResult, MutationError> {
        let (removed, _) = doc
            .remove_from_anywhere(block_id)
            .ok_or_else(|| MutationError::BlockNotFound(block_id.to_string()))?;

        Ok(MutationResult {
            removed: removed.block_count(),
            ..MutationResult::default()
        })
    }

    fn apply_update_attribute(
        doc: &mut Document,
        block_id: &str,
        key: &str,
        value: &Value,
    ) -> Result<MutationResult, MutationError> {
        if key == COLUMNS_KEY {
            return Err(MutationError::ReservedAttribute(key.to_string()));
        }

        let block = doc
            .find_mut(block_id)
            .ok_or_else(|| MutationError::BlockNotFound(block_id.to_string()))?;

        if key != COLUMN_COUNT_KEY || !block.is_columns() {
            block.attributes.insert(key.to_string(), value.clone());
            return Ok(MutationResult::default());
        }

        let requested = value
            .as_integer()
            .ok_or_else(|| MutationError::InvalidColumnCount(value.to_string()))?;
        let count = clamp_column_count(requested);

        block
            .attributes
            .insert(COLUMN_COUNT_KEY.to_string(), Value::from(count));
        let relocated = resize_slots(block.columns.get_or_insert_with(Vec::new), count);

        if relocated > 0 {
            warn!(
                block_id = %block_id,
                relocated,
                column_count = count,
                "Column count reduced; moved blocks from removed columns into the last column"
            );
        }

        Ok(MutationResult {
            relocated,
            ..MutationResult::default()
        })
    }

    /// Reject targets that do not exist, and columns-inside-columns
    fn check_target(
        doc: &Document,
        target: &InsertTarget,
        placing_columns: bool,
    ) -> Result<(), MutationError> {
        let InsertTarget::Column {
            parent_id,
            column_index,
        } = target
        else {
            return Ok(());
        };

        if placing_columns {
            return Err(MutationError::NestedColumns);
        }

        if doc.column_slot(parent_id, *column_index).is_none() {
            return Err(MutationError::ColumnNotFound {
                parent_id: parent_id.clone(),
                column_index: *column_index,
            });
        }

        Ok(())
    }

    /// Put a removed block back where it was
    fn restore(doc: &mut Document, from: &Location, block: Block) {
        match from {
            Location::TopLevel { index } => {
                doc.insert_top_level(Some(*index), block);
            }
            Location::InColumn {
                parent_id,
                column_index,
                index,
            } => {
                if let Err(block) = doc.insert_in_column(parent_id, *column_index, Some(*index), block) {
                    doc.insert_top_level(None, block);
                }
            }
        }
    }
}

/// Gives a copied block, and everything nested in it, new ids
struct FreshIds<'a> {
    ids: &'a mut IdGenerator,
}

impl VisitorMut for FreshIds<'_> {
    fn visit_block_mut(&mut self, block: &mut Block) {
        block.id = self.ids.new_id();
        walk_block_mut(self, block);
    }
}
