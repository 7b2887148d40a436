//! # Drop Target Resolution
//!
//! Tracks one drag gesture and works out where the dragged block would land,
//! from the pointer position and the geometry of the rendered blocks. Nothing
//! touches the tree until [`DragSession::release`] turns the final target into
//! a [`Mutation`].
//!
//! Resolution order on every pointer move:
//!
//! 1. Pointer outside the document bounds: no target
//! 2. Pointer over a column slot: that column
//! 3. Empty document: top-level index 0
//! 4. First top-level block (other than the dragged one) whose vertical
//!    midpoint is below the pointer: insert above it
//! 5. Otherwise: insert after the last block
//!
//! Top-level indexes in a [`DropTarget`] are where the block ends up once it
//! has been taken out of the tree, so a block dragged from an earlier index
//! resolves one lower than the block it lands above.

use crate::mutations::{InsertTarget, Mutation};
use anvil_blocks::{Document, COLUMNS_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    pub fn mid_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// A rendered top-level block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedBlock {
    pub id: String,
    pub rect: Rect,
}

/// A rendered column slot of a columns block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedColumn {
    pub parent_id: String,
    pub column_index: usize,
    pub rect: Rect,
}

/// Geometry of the current render
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderedLayout {
    /// Bounds of the whole document area
    pub bounds: Rect,

    /// Top-level blocks, in document order
    #[serde(default)]
    pub blocks: Vec<RenderedBlock>,

    #[serde(default)]
    pub columns: Vec<RenderedColumn>,
}

impl RenderedLayout {
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            ..Self::default()
        }
    }

    pub fn with_block(mut self, id: impl Into<String>, rect: Rect) -> Self {
        self.blocks.push(RenderedBlock {
            id: id.into(),
            rect,
        });
        self
    }

    pub fn with_column(mut self, parent_id: impl Into<String>, column_index: usize, rect: Rect) -> Self {
        self.columns.push(RenderedColumn {
            parent_id: parent_id.into(),
            column_index,
            rect,
        });
        self
    }

    fn column_at(&self, point: Point) -> Option<&RenderedColumn> {
        self.columns.iter().find(|column| column.rect.contains(point))
    }

    fn top_level_index(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|block| block.id == id)
    }
}

/// What is being dragged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DragKind {
    /// A block type from the palette
    #[serde(rename_all = "camelCase")]
    New { block_type: String },

    /// An existing block, by its handle
    #[serde(rename_all = "camelCase")]
    Move { block_id: String, block_type: String },
}

/// Where a drop would land
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DropTarget {
    /// Final index in the top-level sequence
    TopLevel { index: usize },

    #[serde(rename_all = "camelCase")]
    Column {
        parent_id: String,
        column_index: usize,
    },
}

/// State of one drag gesture
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    kind: DragKind,
    target: Option<DropTarget>,
}

impl DragSession {
    pub fn new_block(block_type: impl Into<String>) -> Self {
        Self {
            kind: DragKind::New {
                block_type: block_type.into(),
            },
            target: None,
        }
    }

    /// Start dragging an existing block. `None` when the id is stale.
    pub fn move_block(doc: &Document, block_id: &str) -> Option<Self> {
        let block = doc.find(block_id)?;
        Some(Self {
            kind: DragKind::Move {
                block_id: block.id.clone(),
                block_type: block.block_type.clone(),
            },
            target: None,
        })
    }

    pub fn kind(&self) -> &DragKind {
        &self.kind
    }

    pub fn target(&self) -> Option<&DropTarget> {
        self.target.as_ref()
    }

    /// Column to highlight, if the pointer is over one
    pub fn highlighted_column(&self) -> Option<(&str, usize)> {
        match &self.target {
            Some(DropTarget::Column {
                parent_id,
                column_index,
            }) => Some((parent_id.as_str(), *column_index)),
            _ => None,
        }
    }

    fn dragged_id(&self) -> Option<&str> {
        match &self.kind {
            DragKind::Move { block_id, .. } => Some(block_id),
            DragKind::New { .. } => None,
        }
    }

    fn dragging_columns(&self) -> bool {
        match &self.kind {
            DragKind::New { block_type } | DragKind::Move { block_type, .. } => {
                block_type == COLUMNS_TYPE
            }
        }
    }

    /// Re-resolve the target for a new pointer position
    pub fn pointer_moved(&mut self, layout: &RenderedLayout, pointer: Point) -> Option<&DropTarget> {
        self.target = self.resolve(layout, pointer);
        debug!(drop_target = ?self.target, "Drop target resolved");
        self.target.as_ref()
    }

    fn resolve(&self, layout: &RenderedLayout, pointer: Point) -> Option<DropTarget> {
        if !layout.bounds.contains(pointer) {
            return None;
        }

        if !self.dragging_columns() {
            if let Some(column) = layout.column_at(pointer) {
                if Some(column.parent_id.as_str()) != self.dragged_id() {
                    return Some(DropTarget::Column {
                        parent_id: column.parent_id.clone(),
                        column_index: column.column_index,
                    });
                }
            }
        }

        if layout.blocks.is_empty() {
            return Some(DropTarget::TopLevel { index: 0 });
        }

        let dragged = self.dragged_id();
        let origin = dragged.and_then(|id| layout.top_level_index(id));

        for (index, block) in layout.blocks.iter().enumerate() {
            if Some(block.id.as_str()) == dragged {
                continue;
            }

            if block.rect.mid_y() > pointer.y {
                let index = match origin {
                    Some(origin) if origin < index => index - 1,
                    _ => index,
                };
                return Some(DropTarget::TopLevel { index });
            }
        }

        let len = layout.blocks.len();
        let index = if origin.is_some() { len - 1 } else { len };
        Some(DropTarget::TopLevel { index })
    }

    /// Abandon the gesture
    pub fn cancel(&mut self) {
        self.target = None;
    }

    /// Finish the gesture. `None` means the drop was abandoned.
    ///
    /// `layout` must be the render the drag was tracked against; it is used to
    /// turn a final top-level index back into the pre-removal index the
    /// move mutation expects.
    pub fn release(self, layout: &RenderedLayout) -> Option<Mutation> {
        let target = self.target?;

        match self.kind {
            DragKind::New { block_type } => {
                let target = match target {
                    DropTarget::TopLevel { index } => InsertTarget::top_level(index),
                    DropTarget::Column {
                        parent_id,
                        column_index,
                    } => InsertTarget::Column {
                        parent_id,
                        column_index,
                    },
                };
                Some(Mutation::InsertBlock { block_type, target })
            }

            DragKind::Move { block_id, .. } => {
                let target = match target {
                    DropTarget::TopLevel { index } => {
                        let index = match layout.top_level_index(&block_id) {
                            Some(origin) if index >= origin => index + 1,
                            _ => index,
                        };
                        InsertTarget::top_level(index)
                    }
                    DropTarget::Column {
                        parent_id,
                        column_index,
                    } => InsertTarget::Column {
                        parent_id,
                        column_index,
                    },
                };
                Some(Mutation::MoveBlock { block_id, target })
            }
        }
    }
}
