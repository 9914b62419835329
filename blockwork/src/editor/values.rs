//! Edits that touch inputs, config and the free-standing value blocks.
//!
//! Value blocks are shared by reference: any number of inputs may point at
//! the same reporter, and removing a statement leaves the reporters it used
//! in place. [`prune_value_blocks`] collects the ones nothing reaches.

use std::collections::BTreeSet;

use crate::block::{Block, BlockId, Input};
use crate::editor::{EditError, Placement, checked};
use crate::program::{KindCatalog, Program};

/// Add a free-standing reporter or predicate to the node table.
pub fn add_value_block(program: &Program, block: Block) -> Result<Program, EditError> {
    add_value_block_in(program, block, None)
}

pub(super) fn add_value_block_in(
    program: &Program,
    block: Block,
    catalog: Option<&dyn KindCatalog>,
) -> Result<Program, EditError> {
    if program.contains(&block.id) {
        return Err(EditError::DuplicateId(block.id));
    }
    if !block.form.is_value() {
        return Err(EditError::InvalidMove {
            reason: Placement::SequencedAsValue(block.form),
            id: block.id,
        });
    }
    let mut next = program.clone();
    tracing::debug!(block = %block.id, kind = %block.kind, "add value block");
    next.nodes.insert(block.id.clone(), block);
    checked(next, catalog)
}

/// Wire `input` into input `key` of block `id`, replacing what was there.
pub fn set_input(
    program: &Program,
    id: &BlockId,
    key: &str,
    input: Input,
) -> Result<Program, EditError> {
    set_input_in(program, id, key, input, None)
}

pub(super) fn set_input_in(
    program: &Program,
    id: &BlockId,
    key: &str,
    input: Input,
    catalog: Option<&dyn KindCatalog>,
) -> Result<Program, EditError> {
    if !program.contains(id) {
        return Err(EditError::UnknownBlock(id.clone()));
    }
    if let Some(target) = input.as_reference() {
        let referenced = program
            .block(target)
            .ok_or_else(|| EditError::UnknownBlock(target.clone()))?;
        if !referenced.form.is_value() {
            return Err(EditError::NotAValueBlock {
                id: target.clone(),
                form: referenced.form,
            });
        }
    }
    let mut next = program.clone();
    if let Some(block) = next.nodes.get_mut(id) {
        block.inputs.insert(key.to_string(), input);
    }
    checked(next, catalog)
}

/// Drop input `key` from block `id`. Missing keys are not an error.
pub fn clear_input(program: &Program, id: &BlockId, key: &str) -> Result<Program, EditError> {
    let mut next = program.clone();
    let block = next
        .nodes
        .get_mut(id)
        .ok_or_else(|| EditError::UnknownBlock(id.clone()))?;
    block.inputs.remove(key);
    Ok(next)
}

pub fn set_config(
    program: &Program,
    id: &BlockId,
    config: serde_json::Value,
) -> Result<Program, EditError> {
    let mut next = program.clone();
    let block = next
        .nodes
        .get_mut(id)
        .ok_or_else(|| EditError::UnknownBlock(id.clone()))?;
    block.config = config;
    Ok(next)
}

/// Remove every value block that no sequenced block can reach through its
/// inputs, directly or through other value blocks. Returns the new program
/// and the ids that were collected, in id order.
pub fn prune_value_blocks(program: &Program) -> (Program, Vec<BlockId>) {
    let mut live = BTreeSet::new();
    let mut pending: Vec<&BlockId> = Vec::new();
    for id in program.sequenced() {
        if let Some(block) = program.block(&id) {
            pending.extend(block.referenced_blocks());
        }
    }
    while let Some(id) = pending.pop() {
        if !live.insert(id.clone()) {
            continue;
        }
        if let Some(block) = program.block(id) {
            pending.extend(block.referenced_blocks());
        }
    }

    let mut next = program.clone();
    let dead: Vec<BlockId> = program
        .nodes
        .values()
        .filter(|b| b.form.is_value() && !live.contains(&b.id))
        .map(|b| b.id.clone())
        .collect();
    for id in &dead {
        next.nodes.remove(id);
    }
    if !dead.is_empty() {
        tracing::debug!(collected = dead.len(), "pruned value blocks");
    }
    (next, dead)
}
