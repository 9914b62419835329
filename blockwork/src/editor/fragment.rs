use std::collections::BTreeMap;

use crate::block::{Block, BlockId};

/// A detached block together with every block nested in its slots.
///
/// This is what [`super::remove`] hands back and what [`super::insert`]
/// splices in, so a control block and its body always move as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub root: Block,
    /// Blocks nested (at any depth) inside the root's slots, by id.
    pub nested: BTreeMap<BlockId, Block>,
}

impl Fragment {
    pub fn id(&self) -> &BlockId {
        &self.root.id
    }

    /// Number of blocks in the fragment, root included.
    pub fn len(&self) -> usize {
        1 + self.nested.len()
    }

    pub fn with_nested(mut self, block: Block) -> Self {
        self.nested.insert(block.id.clone(), block);
        self
    }
}

impl From<Block> for Fragment {
    fn from(root: Block) -> Self {
        Fragment {
            root,
            nested: BTreeMap::new(),
        }
    }
}
