use thiserror::Error;

use crate::block::{BlockId, Form};
use crate::program::Violation;

/// Why a block cannot go where it was asked to go.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Placement {
    #[error("the target lies inside the block's own subtree")]
    IntoOwnSubtree,

    #[error("{0} blocks are referenced through inputs, never sequenced")]
    ValueInSequence(Form),

    #[error("hat blocks may only start a top-level script")]
    HatBelowStart,

    #[error("nothing may be placed before a hat block")]
    BeforeHat,

    #[error("{0} blocks belong in a sequence, not in the value table")]
    SequencedAsValue(Form),
}

/// A rejected structural edit. The program it was applied to is unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("block '{0}' does not exist")]
    UnknownBlock(BlockId),

    #[error("block id '{0}' is already in use")]
    DuplicateId(BlockId),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("cannot place block '{id}': {reason}")]
    InvalidMove { id: BlockId, reason: Placement },

    #[error("value block '{id}' is still referenced by {}", .referrers.iter().map(|r| format!("'{}'", r)).collect::<Vec<_>>().join(", "))]
    StillReferenced {
        id: BlockId,
        referrers: Vec<BlockId>,
    },

    #[error("block '{id}' is a {form} block; inputs may only reference reporters and predicates")]
    NotAValueBlock { id: BlockId, form: Form },

    #[error("edit would break program invariants: {}", .0.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; "))]
    Invariant(Vec<Violation>),
}

impl EditError {
    /// The block a host editor should highlight.
    pub fn block_id(&self) -> Option<&BlockId> {
        match self {
            EditError::UnknownBlock(id)
            | EditError::DuplicateId(id)
            | EditError::InvalidMove { id, .. }
            | EditError::StillReferenced { id, .. }
            | EditError::NotAValueBlock { id, .. } => Some(id),
            EditError::InvalidTarget(_) => None,
            EditError::Invariant(violations) => violations.iter().find_map(|v| v.block_id()),
        }
    }
}
