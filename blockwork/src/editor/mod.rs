//! Structural edits over programs.
//!
//! Every operation takes a program by reference and returns a new one; the
//! input is never touched. Each result is validated before it is handed
//! back, so a failed edit never yields a half-applied program.
//!
//! The free functions check the structural invariants. [`Editor`] runs the
//! same operations against a [`KindCatalog`] and also holds every block to
//! the form and slot keys its kind declares.

pub mod error;
pub mod fragment;
pub mod values;

use crate::block::{Block, BlockId, Form, Input};
use crate::program::validate::SlotRef;
use crate::program::{KindCatalog, Program};

pub use error::{EditError, Placement};
pub use fragment::Fragment;
pub use values::{add_value_block, clear_input, prune_value_blocks, set_config, set_input};

/// Where a block goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A new independent script, inserted at `heads[index]`.
    TopLevel,
    /// Position `index` in the script that starts at this head.
    Script(BlockId),
    /// Position `index` in one slot chain of a `c` block.
    Slot(SlotRef),
}

impl Target {
    pub fn slot(owner: impl Into<BlockId>, slot: impl Into<String>) -> Self {
        Target::Slot(SlotRef::new(owner, slot))
    }

    pub fn script(head: impl Into<BlockId>) -> Self {
        Target::Script(head.into())
    }
}

/// Splice `fragment` into `program` at position `index` of `target`.
///
/// `index` is clamped to the length of the target sequence. The fragment's
/// root takes over its predecessor's old `next`; blocks nested in its slots
/// travel with it unchanged.
pub fn insert(
    program: &Program,
    fragment: impl Into<Fragment>,
    target: &Target,
    index: usize,
) -> Result<Program, EditError> {
    insert_in(program, fragment.into(), target, index, None)
}

fn insert_in(
    program: &Program,
    fragment: Fragment,
    target: &Target,
    index: usize,
    catalog: Option<&dyn KindCatalog>,
) -> Result<Program, EditError> {
    let Fragment { mut root, nested } = fragment;
    let id = root.id.clone();

    for candidate in std::iter::once(&id).chain(nested.keys()) {
        if program.contains(candidate) {
            return Err(EditError::DuplicateId(candidate.clone()));
        }
    }
    if root.form.is_value() {
        return Err(EditError::InvalidMove {
            id,
            reason: Placement::ValueInSequence(root.form),
        });
    }

    let mut next = program.clone();
    match target {
        Target::TopLevel => {
            let index = index.min(next.heads.len());
            root.next = None;
            root.parent = None;
            root.in_slot = None;
            next.heads.insert(index, id.clone());
        }
        Target::Script(head) => {
            let Some(position) = next.heads.iter().position(|h| h == head) else {
                return Err(EditError::InvalidTarget(format!(
                    "'{}' does not start a script",
                    head
                )));
            };
            let chain = chain_ids(&next, Some(head));
            let index = index.min(chain.len());
            if index == 0 {
                if next.nodes.get(head).is_some_and(|b| b.form == Form::Hat) {
                    return Err(EditError::InvalidMove {
                        id,
                        reason: Placement::BeforeHat,
                    });
                }
                root.next = Some(head.clone());
                next.heads[position] = id.clone();
            } else {
                if root.form == Form::Hat {
                    return Err(EditError::InvalidMove {
                        id,
                        reason: Placement::HatBelowStart,
                    });
                }
                splice_after(&mut next, &chain[index - 1], &mut root);
            }
            root.parent = None;
            root.in_slot = None;
        }
        Target::Slot(slot) => {
            if root.form == Form::Hat {
                return Err(EditError::InvalidMove {
                    id,
                    reason: Placement::HatBelowStart,
                });
            }
            let owner = next
                .nodes
                .get(&slot.owner)
                .ok_or_else(|| EditError::UnknownBlock(slot.owner.clone()))?;
            let Some(slot_head) = owner.slot_heads.get(&slot.slot) else {
                return Err(EditError::InvalidTarget(format!(
                    "{} block '{}' has no slot '{}'",
                    owner.form, owner.id, slot.slot
                )));
            };
            let chain = chain_ids(&next, slot_head.as_ref());
            let index = index.min(chain.len());
            if index == 0 {
                root.next = slot_head.clone();
                if let Some(owner) = next.nodes.get_mut(&slot.owner) {
                    owner.slot_heads.insert(slot.slot.clone(), Some(id.clone()));
                }
            } else {
                splice_after(&mut next, &chain[index - 1], &mut root);
            }
            root.parent = Some(slot.owner.clone());
            root.in_slot = Some(slot.slot.clone());
        }
    }

    tracing::debug!(block = %id, ?target, index, nested = nested.len(), "insert");
    next.nodes.insert(id, root);
    next.nodes.extend(nested);
    checked(next, catalog)
}

/// Detach `id` from its sequence, linking its predecessor (or the owning
/// slot, or `heads`) to its successor.
///
/// The returned fragment holds the detached block and everything nested in
/// its slots; those blocks leave the program. Value blocks referenced from
/// the fragment stay behind, shared. A free-standing value block can only
/// be removed once nothing references it.
pub fn remove(program: &Program, id: &BlockId) -> Result<(Program, Fragment), EditError> {
    remove_in(program, id, None)
}

fn remove_in(
    program: &Program,
    id: &BlockId,
    catalog: Option<&dyn KindCatalog>,
) -> Result<(Program, Fragment), EditError> {
    let block = program
        .block(id)
        .ok_or_else(|| EditError::UnknownBlock(id.clone()))?;
    let mut next = program.clone();

    if block.form.is_value() {
        let referrers: Vec<BlockId> = program.referrers(id).into_iter().cloned().collect();
        if !referrers.is_empty() {
            return Err(EditError::StillReferenced {
                id: id.clone(),
                referrers,
            });
        }
        let root = next
            .nodes
            .remove(id)
            .ok_or_else(|| EditError::UnknownBlock(id.clone()))?;
        tracing::debug!(block = %id, "remove value block");
        return Ok((checked(next, catalog)?, Fragment::from(root)));
    }

    let successor = block.next.clone();
    if let Some(position) = next.heads.iter().position(|h| h == id) {
        match &successor {
            Some(s) => next.heads[position] = s.clone(),
            None => {
                next.heads.remove(position);
            }
        }
    } else if let Some(owner) = owning_slot(program, block) {
        if let Some(owner_block) = next.nodes.get_mut(&owner.owner) {
            owner_block.slot_heads.insert(owner.slot, successor.clone());
        }
    } else if let Some(predecessor) = program.predecessor(id).map(|b| b.id.clone()) {
        if let Some(pred) = next.nodes.get_mut(&predecessor) {
            pred.next = successor.clone();
        }
    } else {
        return Err(EditError::InvalidTarget(format!(
            "block '{}' is not part of any sequence",
            id
        )));
    }

    if let Some(successor) = &successor {
        if let Some(s) = next.nodes.get_mut(successor) {
            s.parent = block.parent.clone();
            s.in_slot = block.in_slot.clone();
        }
    }

    let mut fragment = Fragment::from(
        next.nodes
            .remove(id)
            .ok_or_else(|| EditError::UnknownBlock(id.clone()))?,
    );
    for nested in program.subtree(id).into_iter().skip(1) {
        if let Some(b) = next.nodes.remove(&nested) {
            fragment.nested.insert(nested, b);
        }
    }
    fragment.root.next = None;
    fragment.root.parent = None;
    fragment.root.in_slot = None;

    tracing::debug!(block = %id, nested = fragment.nested.len(), "remove");
    Ok((checked(next, catalog)?, fragment))
}

/// Relocate `id` (with everything nested inside it) to `index` of `target`.
///
/// `index` is interpreted on the program after the block has been detached.
/// Fails without changing anything if the target lies inside the block's
/// own subtree or the block's form is not allowed there.
pub fn move_block(
    program: &Program,
    id: &BlockId,
    target: &Target,
    index: usize,
) -> Result<Program, EditError> {
    move_in(program, id, target, index, None)
}

fn move_in(
    program: &Program,
    id: &BlockId,
    target: &Target,
    index: usize,
    catalog: Option<&dyn KindCatalog>,
) -> Result<Program, EditError> {
    let block = program
        .block(id)
        .ok_or_else(|| EditError::UnknownBlock(id.clone()))?;

    if block.form.is_value() {
        return Err(EditError::InvalidMove {
            id: id.clone(),
            reason: Placement::ValueInSequence(block.form),
        });
    }
    match target {
        Target::Slot(slot) => {
            let inside = slot.owner == *id
                || program.ancestors(&slot.owner).contains(id)
                || program.subtree(id).contains(&slot.owner);
            if inside {
                return Err(EditError::InvalidMove {
                    id: id.clone(),
                    reason: Placement::IntoOwnSubtree,
                });
            }
        }
        Target::Script(head) if head == id => {
            let reason = match &block.next {
                Some(successor) if program.heads.contains(id) => format!(
                    "once '{}' is detached its script is headed by '{}'",
                    id, successor
                ),
                _ => format!("'{}' does not start a script once it is detached", id),
            };
            return Err(EditError::InvalidTarget(reason));
        }
        Target::Script(_) | Target::TopLevel => {}
    }
    if block.form == Form::Hat && matches!(target, Target::Slot(_)) {
        return Err(EditError::InvalidMove {
            id: id.clone(),
            reason: Placement::HatBelowStart,
        });
    }

    let (detached, fragment) = remove_in(program, id, catalog)?;
    insert_in(&detached, fragment, target, index, catalog)
}

/// Structural edits checked against the kinds a catalog declares.
///
/// On top of what the free functions check, every result must pass
/// [`Program::validate_with`]: each kind is known, each block has the form
/// its kind declares, and each `c` block exposes exactly the declared slot
/// keys.
#[derive(Clone, Copy)]
pub struct Editor<'c> {
    catalog: &'c dyn KindCatalog,
}

impl<'c> Editor<'c> {
    pub fn new(catalog: &'c dyn KindCatalog) -> Self {
        Editor { catalog }
    }

    pub fn insert(
        &self,
        program: &Program,
        fragment: impl Into<Fragment>,
        target: &Target,
        index: usize,
    ) -> Result<Program, EditError> {
        insert_in(program, fragment.into(), target, index, Some(self.catalog))
    }

    pub fn remove(
        &self,
        program: &Program,
        id: &BlockId,
    ) -> Result<(Program, Fragment), EditError> {
        remove_in(program, id, Some(self.catalog))
    }

    pub fn move_block(
        &self,
        program: &Program,
        id: &BlockId,
        target: &Target,
        index: usize,
    ) -> Result<Program, EditError> {
        move_in(program, id, target, index, Some(self.catalog))
    }

    pub fn add_value_block(&self, program: &Program, block: Block) -> Result<Program, EditError> {
        values::add_value_block_in(program, block, Some(self.catalog))
    }

    pub fn set_input(
        &self,
        program: &Program,
        id: &BlockId,
        key: &str,
        input: Input,
    ) -> Result<Program, EditError> {
        values::set_input_in(program, id, key, input, Some(self.catalog))
    }

    pub fn clear_input(
        &self,
        program: &Program,
        id: &BlockId,
        key: &str,
    ) -> Result<Program, EditError> {
        values::clear_input(program, id, key)
    }

    pub fn set_config(
        &self,
        program: &Program,
        id: &BlockId,
        config: serde_json::Value,
    ) -> Result<Program, EditError> {
        values::set_config(program, id, config)
    }
}

/// Hand `program` back if it passes validation, against `catalog` when one
/// is given.
fn checked(program: Program, catalog: Option<&dyn KindCatalog>) -> Result<Program, EditError> {
    let result = match catalog {
        Some(catalog) => program.validate_with(catalog),
        None => program.validate(),
    };
    result.map_err(EditError::Invariant)?;
    Ok(program)
}

fn chain_ids(program: &Program, start: Option<&BlockId>) -> Vec<BlockId> {
    program.chain(start).map(|b| b.id.clone()).collect()
}

/// Point `predecessor.next` at `root`, handing its old successor to `root`.
fn splice_after(program: &mut Program, predecessor: &BlockId, root: &mut Block) {
    if let Some(pred) = program.nodes.get_mut(predecessor) {
        root.next = pred.next.replace(root.id.clone());
    }
}

/// The slot `block` heads, if it is the first block of a slot chain.
fn owning_slot(program: &Program, block: &Block) -> Option<SlotRef> {
    let owner = block.parent.as_ref()?;
    let slot = block.in_slot.as_ref()?;
    let head = program.block(owner)?.slot_heads.get(slot)?.as_ref()?;
    (*head == block.id).then(|| SlotRef::new(owner.clone(), slot.clone()))
}
