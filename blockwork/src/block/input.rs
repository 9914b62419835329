use serde::{Deserialize, Serialize};

use crate::block::BlockId;

/// The value wired into one input of a block.
///
/// Encoded as `{ "literal": any }` or `{ "blockId": id }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Input {
    Literal {
        literal: serde_json::Value,
    },
    Reference {
        #[serde(rename = "blockId")]
        block_id: BlockId,
    },
}

impl Input {
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Input::Literal {
            literal: value.into(),
        }
    }

    pub fn reference(block: impl Into<BlockId>) -> Self {
        Input::Reference {
            block_id: block.into(),
        }
    }

    pub fn as_reference(&self) -> Option<&BlockId> {
        match self {
            Input::Reference { block_id } => Some(block_id),
            Input::Literal { .. } => None,
        }
    }

    pub fn as_literal(&self) -> Option<&serde_json::Value> {
        match self {
            Input::Literal { literal } => Some(literal),
            Input::Reference { .. } => None,
        }
    }
}
