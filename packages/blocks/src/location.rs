//! # Location Resolver
//!
//! Finds where a block lives without the caller knowing the tree shape in
//! advance. A block is either at the top level or inside one column slot of a
//! top-level columns container.
//!
//! Every lookup is a fresh scan of the tree (top level first, then every slot
//! of every columns container). No reverse index is kept, so there is nothing
//! to keep in sync when the tree changes; the cost is O(n) per lookup.

use crate::block::{Block, ColumnSlot};
use crate::document::Document;
use serde::{Deserialize, Serialize};

/// Resolved position of a block
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Location {
    TopLevel {
        index: usize,
    },
    #[serde(rename_all = "camelCase")]
    InColumn {
        parent_id: String,
        column_index: usize,
        index: usize,
    },
}

impl Location {
    /// Index within the containing sequence
    pub fn index(&self) -> usize {
        match self {
            Location::TopLevel { index } | Location::InColumn { index, .. } => *index,
        }
    }

    pub fn is_top_level(&self) -> bool {
        matches!(self, Location::TopLevel { .. })
    }

    /// The same sequence, at a different index
    pub fn with_index(&self, index: usize) -> Location {
        match self {
            Location::TopLevel { .. } => Location::TopLevel { index },
            Location::InColumn {
                parent_id,
                column_index,
                ..
            } => Location::InColumn {
                parent_id: parent_id.clone(),
                column_index: *column_index,
                index,
            },
        }
    }
}

impl Document {
    /// Resolve the current location of `id`
    pub fn locate(&self, id: &str) -> Option<Location> {
        if let Some(index) = self.blocks().iter().position(|b| b.id == id) {
            return Some(Location::TopLevel { index });
        }

        for parent in self.blocks().iter().filter(|b| b.is_columns()) {
            for (column_index, slot) in parent.columns.iter().flatten().enumerate() {
                if let Some(index) = slot.iter().position(|b| b.id == id) {
                    return Some(Location::InColumn {
                        parent_id: parent.id.clone(),
                        column_index,
                        index,
                    });
                }
            }
        }

        None
    }

    pub fn contains(&self, id: &str) -> bool {
        self.locate(id).is_some()
    }

    /// Block at a resolved location
    pub fn get(&self, location: &Location) -> Option<&Block> {
        match location {
            Location::TopLevel { index } => self.blocks().get(*index),
            Location::InColumn {
                parent_id,
                column_index,
                index,
            } => self
                .column_slot(parent_id, *column_index)
                .and_then(|slot| slot.get(*index)),
        }
    }

    pub fn get_mut(&mut self, location: &Location) -> Option<&mut Block> {
        match location {
            Location::TopLevel { index } => self.blocks_mut().get_mut(*index),
            Location::InColumn {
                parent_id,
                column_index,
                index,
            } => self
                .column_slot_mut(parent_id, *column_index)
                .and_then(|slot| slot.get_mut(*index)),
        }
    }

    pub fn find(&self, id: &str) -> Option<&Block> {
        let location = self.locate(id)?;
        self.get(&location)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Block> {
        let location = self.locate(id)?;
        self.get_mut(&location)
    }

    /// Column slot `column_index` of the top-level columns block `parent_id`
    pub fn column_slot(&self, parent_id: &str, column_index: usize) -> Option<&ColumnSlot> {
        self.blocks()
            .iter()
            .find(|b| b.id == parent_id && b.is_columns())
            .and_then(|parent| parent.column(column_index))
    }

    pub fn column_slot_mut(&mut self, parent_id: &str, column_index: usize) -> Option<&mut ColumnSlot> {
        self.blocks_mut()
            .iter_mut()
            .find(|b| b.id == parent_id && b.is_columns())
            .and_then(|parent| parent.column_mut(column_index))
    }

    /// Remove the block at `location`
    pub fn remove_at(&mut self, location: &Location) -> Option<Block> {
        let sequence = match location {
            Location::TopLevel { .. } => self.blocks_mut(),
            Location::InColumn {
                parent_id,
                column_index,
                ..
            } => self.column_slot_mut(parent_id, *column_index)?,
        };

        let index = location.index();
        (index < sequence.len()).then(|| sequence.remove(index))
    }

    /// Find `id` wherever it lives, splice it out, and return it together
    /// with the location it was removed from.
    pub fn remove_from_anywhere(&mut self, id: &str) -> Option<(Block, Location)> {
        let location = self.locate(id)?;
        let block = self.remove_at(&location)?;
        Some((block, location))
    }

    /// Insert at the top level before `index`; appends when the index is
    /// missing or past the end. Returns the index used.
    pub fn insert_top_level(&mut self, index: Option<usize>, block: Block) -> usize {
        let blocks = self.blocks_mut();
        let index = index.filter(|i| *i <= blocks.len()).unwrap_or(blocks.len());
        blocks.insert(index, block);
        index
    }

    /// Insert into a column slot before `index` (append when missing or past
    /// the end). The block is handed back if the slot does not exist.
    pub fn insert_in_column(
        &mut self,
        parent_id: &str,
        column_index: usize,
        index: Option<usize>,
        block: Block,
    ) -> Result<Location, Block> {
        let Some(slot) = self.column_slot_mut(parent_id, column_index) else {
            return Err(block);
        };

        let index = index.filter(|i| *i <= slot.len()).unwrap_or(slot.len());
        slot.insert(index, block);

        Ok(Location::InColumn {
            parent_id: parent_id.to_string(),
            column_index,
            index,
        })
    }
}
