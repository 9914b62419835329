pub mod validate;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockId};

pub use validate::{KindCatalog, Violation};

/// A block program: independent top-level scripts plus the flat table of
/// every block, including value blocks reachable only through inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// First block of each top-level script, in execution order.
    #[serde(default)]
    pub heads: Vec<BlockId>,
    #[serde(default)]
    pub nodes: BTreeMap<BlockId, Block>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Walk a `next` chain starting at `start`.
    ///
    /// Stops at the end of the chain, at a missing id, or when an id repeats.
    pub fn chain<'a>(&'a self, start: Option<&'a BlockId>) -> Chain<'a> {
        Chain {
            program: self,
            current: start,
            seen: BTreeSet::new(),
        }
    }

    /// The chain held in `owner`'s slot `slot`.
    pub fn slot_chain<'a>(&'a self, owner: &BlockId, slot: &str) -> Chain<'a> {
        let start = self
            .nodes
            .get(owner)
            .and_then(|b| b.slot_heads.get(slot))
            .and_then(|h| h.as_ref());
        self.chain(start)
    }

    /// The block plus everything nested inside its slots, recursively.
    ///
    /// Does not follow the block's own `next` pointer, and does not include
    /// value blocks merely referenced through inputs.
    pub fn subtree(&self, id: &BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        self.collect_subtree(id, &mut out, &mut seen);
        out
    }

    fn collect_subtree(&self, id: &BlockId, out: &mut Vec<BlockId>, seen: &mut BTreeSet<BlockId>) {
        if !seen.insert(id.clone()) {
            return;
        }
        out.push(id.clone());
        let Some(block) = self.nodes.get(id) else {
            return;
        };
        for (_, head) in block.slot_children() {
            for child in self.chain(Some(head)) {
                self.collect_subtree(&child.id, out, seen);
            }
        }
    }

    /// Owning `c` blocks of `id`, innermost first.
    pub fn ancestors(&self, id: &BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(id).and_then(|b| b.parent.clone());
        while let Some(parent) = current {
            if out.contains(&parent) {
                break;
            }
            current = self.nodes.get(&parent).and_then(|b| b.parent.clone());
            out.push(parent);
        }
        out
    }

    /// The block whose `next` points at `id`, if any.
    ///
    /// No predecessor index is kept, so this scans the node table: O(n) in
    /// the number of blocks, the same order as the copy and validation
    /// every edit already performs. Heads and slot heads are found through
    /// `heads` and the `parent`/`inSlot` back-reference without a scan.
    pub fn predecessor(&self, id: &BlockId) -> Option<&Block> {
        self.nodes.values().find(|b| b.next.as_ref() == Some(id))
    }

    /// Ids of every block reachable from `heads` through `next` and slot chains.
    pub fn sequenced(&self) -> BTreeSet<BlockId> {
        let mut out = BTreeSet::new();
        for head in &self.heads {
            for block in self.chain(Some(head)) {
                for id in self.subtree(&block.id) {
                    out.insert(id);
                }
            }
        }
        out
    }

    /// Blocks whose inputs reference `id`.
    pub fn referrers(&self, id: &BlockId) -> Vec<&BlockId> {
        self.nodes
            .values()
            .filter(|b| b.referenced_blocks().any(|r| r == id))
            .map(|b| &b.id)
            .collect()
    }
}

/// Iterator over a `next` chain.
pub struct Chain<'a> {
    program: &'a Program,
    current: Option<&'a BlockId>,
    seen: BTreeSet<&'a BlockId>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Block;

    fn next(&mut self) -> Option<&'a Block> {
        let id = self.current.take()?;
        if !self.seen.insert(id) {
            return None;
        }
        let block = self.program.nodes.get(id)?;
        self.current = block.next.as_ref();
        Some(block)
    }
}
