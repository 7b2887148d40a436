use crate::block::Block;
use crate::document::Document;
use crate::location::Location;

/// Visitor pattern for walking a block tree immutably
///
/// The default methods walk the whole tree, top-level blocks first in
/// order, descending into column slots as each columns block is visited.
/// Override `visit_block` to act on each block; call [`walk_block`] from the
/// override to keep descending.
pub trait Visitor: Sized {
    fn visit_document(&mut self, doc: &Document) {
        walk_document(self, doc);
    }

    fn visit_block(&mut self, block: &Block, _location: &Location) {
        walk_block(self, block);
    }
}

/// Mutable visitor for rewriting blocks in place
pub trait VisitorMut: Sized {
    fn visit_block_mut(&mut self, block: &mut Block) {
        walk_block_mut(self, block);
    }
}

pub fn walk_document<V: Visitor>(visitor: &mut V, doc: &Document) {
    for (index, block) in doc.blocks().iter().enumerate() {
        visitor.visit_block(block, &Location::TopLevel { index });
    }
}

pub fn walk_block<V: Visitor>(visitor: &mut V, block: &Block) {
    let Some(slots) = &block.columns else {
        return;
    };

    for (column_index, slot) in slots.iter().enumerate() {
        for (index, child) in slot.iter().enumerate() {
            let location = Location::InColumn {
                parent_id: block.id.clone(),
                column_index,
                index,
            };
            visitor.visit_block(child, &location);
        }
    }
}

pub fn walk_block_mut<V: VisitorMut>(visitor: &mut V, block: &mut Block) {
    for child in block.columns.iter_mut().flatten().flatten() {
        visitor.visit_block_mut(child);
    }
}
