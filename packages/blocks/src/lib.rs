//! # Anvil Blocks
//!
//! The block document model behind the Anvil editor.
//!
//! ```text
//! Document
//! ├── Block { id, type, attributes }
//! ├── Block { type: "columns", columnCount: 2 }
//! │   ├── column 0: [Block, Block]
//! │   └── column 1: [Block]
//! └── Block
//! ```
//!
//! - Block ids are unique across the whole document, nested blocks included.
//! - Columns containers only appear at the top level (one level of nesting).
//! - A columns block has exactly `columnCount` slots; slots may be empty.
//!   Parsing keeps a stored tree as it is, so damaged containers stay visible
//!   to `Document::check_invariants` until `Document::normalize` repairs them.
//! - `Document::from_json(doc.to_json())` gives back an identical tree.
//!
//! This crate owns the data structure, its JSON wire format, and lookups.
//! Changing the tree is the editor's job (`anvil-editor`).

mod block;
mod document;
mod error;
mod id_generator;
mod location;
mod registry;
mod value;
pub mod visitor;

pub use block::{
    clamp_column_count, resize_slots, Attributes, Block, ColumnSlot, COLUMNS_KEY, COLUMNS_TYPE,
    COLUMN_COUNT_KEY, DEFAULT_COLUMNS, MAX_COLUMNS, MIN_COLUMNS,
};
pub use document::{
    Document, InvariantViolation, LoadedDocument, LEGACY_BLOCK_TYPE, LEGACY_CONTENT_KEY,
};
pub use error::{DocumentError, RegistryError};
pub use id_generator::IdGenerator;
pub use location::Location;
pub use registry::{
    escape_html, AttributeKind, AttributeSchema, BlockTypeDefinition, BlockTypeRegistry,
    SchemaViolation, SettingsControl,
};
pub use value::Value;
