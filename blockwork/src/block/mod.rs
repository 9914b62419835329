pub mod form;
pub mod input;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use form::Form;
pub use input::Input;

/// Identifier of a block, unique within the process.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        BlockId(id.into())
    }

    /// Mint an id that cannot collide with any other minted id.
    pub fn fresh() -> Self {
        BlockId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        BlockId(s.to_string())
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        BlockId(s)
    }
}

/// One instruction or expression node of a block program.
///
/// Blocks never hold references to each other: every link (`next`, slot
/// heads, input references, the parent back-reference) is a [`BlockId`]
/// resolved through the owning [`crate::Program`]'s node table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    /// Registry key selecting the block's behavior.
    pub kind: String,
    pub form: Form,
    /// Following block in the same sequence. Only meaningful for
    /// `hat`, `statement` and `c` forms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<BlockId>,
    /// Owning `c` block when this block sits inside a slot chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<BlockId>,
    /// Slot key of the owner's slot this block sits in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_slot: Option<String>,
    /// Slot key → first block of that slot's chain. Only `c` blocks have slots.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slot_heads: BTreeMap<String, Option<BlockId>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, Input>,
    /// Block-local literal parameters that are not wired through inputs.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
}

impl Block {
    pub fn new(id: impl Into<BlockId>, kind: impl Into<String>, form: Form) -> Self {
        Block {
            id: id.into(),
            kind: kind.into(),
            form,
            next: None,
            parent: None,
            in_slot: None,
            slot_heads: BTreeMap::new(),
            inputs: BTreeMap::new(),
            config: serde_json::Value::Null,
        }
    }

    pub fn hat(id: impl Into<BlockId>, kind: impl Into<String>) -> Self {
        Self::new(id, kind, Form::Hat)
    }

    pub fn statement(id: impl Into<BlockId>, kind: impl Into<String>) -> Self {
        Self::new(id, kind, Form::Statement)
    }

    /// A control block exposing the given (initially empty) slots.
    pub fn c<S: Into<String>>(
        id: impl Into<BlockId>,
        kind: impl Into<String>,
        slots: impl IntoIterator<Item = S>,
    ) -> Self {
        let mut block = Self::new(id, kind, Form::C);
        for slot in slots {
            block.slot_heads.insert(slot.into(), None);
        }
        block
    }

    pub fn reporter(id: impl Into<BlockId>, kind: impl Into<String>) -> Self {
        Self::new(id, kind, Form::Reporter)
    }

    pub fn predicate(id: impl Into<BlockId>, kind: impl Into<String>) -> Self {
        Self::new(id, kind, Form::Predicate)
    }

    pub fn with_input(mut self, key: impl Into<String>, input: Input) -> Self {
        self.inputs.insert(key.into(), input);
        self
    }

    pub fn with_literal(self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.with_input(key, Input::literal(value))
    }

    pub fn with_reference(self, key: impl Into<String>, block: impl Into<BlockId>) -> Self {
        self.with_input(key, Input::reference(block))
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Whether the block sits at top level (not inside any slot).
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Ids of the value blocks this block's inputs refer to.
    pub fn referenced_blocks(&self) -> impl Iterator<Item = &BlockId> {
        self.inputs.values().filter_map(Input::as_reference)
    }

    /// Ids of the first block of every non-empty slot.
    pub fn slot_children(&self) -> impl Iterator<Item = (&str, &BlockId)> {
        self.slot_heads
            .iter()
            .filter_map(|(key, head)| head.as_ref().map(|h| (key.as_str(), h)))
    }
}
