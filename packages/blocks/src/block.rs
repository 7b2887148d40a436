//! # Blocks
//!
//! A block is `{ id, type, attributes }`. Blocks of type `"columns"` also own
//! an ordered list of column slots, each an ordered list of blocks.
//!
//! In memory the slots live in [`Block::columns`] rather than inside the
//! attribute map, so the tree is typed all the way down. On the wire they are
//! carried as `attributes.columns`, an array of arrays of blocks.

use crate::value::Value;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type name of the columns container
pub const COLUMNS_TYPE: &str = "columns";

/// Reserved attribute carrying column slots on the wire
pub const COLUMNS_KEY: &str = "columns";

/// Attribute holding the number of column slots
pub const COLUMN_COUNT_KEY: &str = "columnCount";

pub const MIN_COLUMNS: usize = 2;
pub const MAX_COLUMNS: usize = 6;
pub const DEFAULT_COLUMNS: usize = 2;

pub type Attributes = BTreeMap<String, Value>;

/// One column of a columns container
pub type ColumnSlot = Vec<Block>;

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub block_type: String,
    pub attributes: Attributes,
    /// Column slots. `Some` exactly when `block_type == "columns"`.
    pub columns: Option<Vec<ColumnSlot>>,
}

impl Block {
    /// Create a block. Columns containers get their slots sized from
    /// `columnCount` (default 2).
    pub fn new(id: impl Into<String>, block_type: impl Into<String>, attributes: Attributes) -> Self {
        let mut block = Self {
            id: id.into(),
            block_type: block_type.into(),
            attributes,
            columns: None,
        };

        if block.is_columns() {
            block.attributes.remove(COLUMNS_KEY);
            block.normalize_columns();
        }

        block
    }

    pub fn is_columns(&self) -> bool {
        self.block_type == COLUMNS_TYPE
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Number of column slots (0 for ordinary blocks)
    pub fn column_count(&self) -> usize {
        self.columns.as_ref().map_or(0, Vec::len)
    }

    pub fn column(&self, index: usize) -> Option<&ColumnSlot> {
        self.columns.as_ref().and_then(|slots| slots.get(index))
    }

    pub fn column_mut(&mut self, index: usize) -> Option<&mut ColumnSlot> {
        self.columns.as_mut().and_then(|slots| slots.get_mut(index))
    }

    /// Blocks held directly in this block's column slots, slot by slot
    pub fn nested_blocks(&self) -> impl Iterator<Item = &Block> {
        self.columns.iter().flatten().flatten()
    }

    /// This block plus everything nested under it
    pub fn block_count(&self) -> usize {
        1 + self.nested_blocks().map(Block::block_count).sum::<usize>()
    }

    /// Bring a columns container back in line with its `columnCount`.
    ///
    /// The count is clamped to 2..=6 (taken from the slot list when the
    /// attribute is missing), missing slots are appended empty, and blocks in
    /// surplus slots are appended to the last kept slot. Returns how many
    /// blocks were relocated.
    pub fn normalize_columns(&mut self) -> usize {
        if !self.is_columns() {
            return 0;
        }

        let declared = self.attributes.get(COLUMN_COUNT_KEY).and_then(Value::as_integer);
        let slots = self.columns.get_or_insert_with(Vec::new);

        let count = match declared {
            Some(n) => clamp_column_count(n),
            None if slots.is_empty() => DEFAULT_COLUMNS,
            None => clamp_column_count(i64::try_from(slots.len()).unwrap_or(i64::MAX)),
        };

        self.attributes
            .insert(COLUMN_COUNT_KEY.to_string(), Value::from(count));
        resize_slots(slots, count)
    }

    /// Give a container stored without slots the empty slots its
    /// `columnCount` asks for (default 2 when that is missing too).
    /// A count outside 2..=6 is left as stored.
    fn fill_absent_slots(&mut self) {
        let declared = self.attributes.get(COLUMN_COUNT_KEY).and_then(Value::as_integer);
        let count = match declared.map(usize::try_from) {
            Some(Ok(n)) if (MIN_COLUMNS..=MAX_COLUMNS).contains(&n) => n,
            Some(_) => return,
            None => {
                self.attributes
                    .insert(COLUMN_COUNT_KEY.to_string(), Value::from(DEFAULT_COLUMNS));
                DEFAULT_COLUMNS
            }
        };
        self.columns = Some(vec![Vec::new(); count]);
    }
}

/// Clamp a requested column count to the supported range
pub fn clamp_column_count(requested: i64) -> usize {
    let min = MIN_COLUMNS as i64;
    let max = MAX_COLUMNS as i64;
    requested.clamp(min, max) as usize
}

/// Resize a slot list to `count` slots.
///
/// Growing appends empty slots. Shrinking appends the blocks of every
/// removed slot, in order, to the last remaining slot. Returns the number of
/// blocks that were moved.
pub fn resize_slots(slots: &mut Vec<ColumnSlot>, count: usize) -> usize {
    let mut moved = 0;

    if count > 0 && slots.len() > count {
        let overflow: Vec<Block> = slots.drain(count..).flatten().collect();
        moved = overflow.len();
        if let Some(last) = slots.last_mut() {
            last.extend(overflow);
        }
    }

    slots.resize_with(count, Vec::new);
    moved
}

// Wire format

struct WireAttributes<'a> {
    attributes: &'a Attributes,
    columns: Option<&'a [ColumnSlot]>,
}

impl Serialize for WireAttributes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in self.attributes {
            if self.columns.is_some() && key == COLUMNS_KEY {
                continue;
            }
            map.serialize_entry(key, value)?;
        }
        if let Some(columns) = self.columns {
            map.serialize_entry(COLUMNS_KEY, columns)?;
        }
        map.end()
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Block", 3)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("type", &self.block_type)?;
        state.serialize_field(
            "attributes",
            &WireAttributes {
                attributes: &self.attributes,
                columns: self.columns.as_deref(),
            },
        )?;
        state.end()
    }
}

#[derive(Deserialize)]
struct WireBlock {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    attributes: serde_json::Value,
}

impl<'de> Deserialize<'de> for Block {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireBlock::deserialize(deserializer)?;

        let mut raw = match wire.attributes {
            serde_json::Value::Object(map) => map,
            // Empty attribute sets are sometimes stored as `[]` or `null`
            serde_json::Value::Null => serde_json::Map::new(),
            serde_json::Value::Array(items) if items.is_empty() => serde_json::Map::new(),
            other => {
                return Err(de::Error::custom(format!(
                    "block {:?}: attributes must be an object, found {}",
                    wire.id, other
                )))
            }
        };

        let is_columns = wire.block_type == COLUMNS_TYPE;
        let mut slots_absent = false;
        let columns = if is_columns {
            match raw.remove(COLUMNS_KEY) {
                None | Some(serde_json::Value::Null) => {
                    slots_absent = true;
                    Some(Vec::new())
                }
                Some(slots) => Some(
                    serde_json::from_value::<Vec<ColumnSlot>>(slots).map_err(de::Error::custom)?,
                ),
            }
        } else {
            None
        };

        let attributes = raw.into_iter().map(|(k, v)| (k, Value::from(v))).collect();

        let mut block = Block {
            id: wire.id,
            block_type: wire.block_type,
            attributes,
            columns,
        };
        if slots_absent {
            block.fill_absent_slots();
        }
        Ok(block)
    }
}
