use std::fmt;

use serde::{Deserialize, Serialize};

/// Syntactic role of a block. Constrains where it may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Form {
    /// Script start. Only valid as a `heads` entry.
    Hat,
    /// Side-effecting step.
    Statement,
    /// Control block with nested slots.
    C,
    /// Value-producing block.
    Reporter,
    /// Boolean-producing block.
    Predicate,
}

impl Form {
    /// Forms that live in `next` chains and slot chains.
    pub fn is_sequenced(self) -> bool {
        matches!(self, Form::Hat | Form::Statement | Form::C)
    }

    /// Forms that are only ever reached through an input reference.
    pub fn is_value(self) -> bool {
        matches!(self, Form::Reporter | Form::Predicate)
    }

    /// Forms allowed as the target of a `next` pointer or inside a slot.
    pub fn is_stackable(self) -> bool {
        matches!(self, Form::Statement | Form::C)
    }

    pub fn name(self) -> &'static str {
        match self {
            Form::Hat => "hat",
            Form::Statement => "statement",
            Form::C => "c",
            Form::Reporter => "reporter",
            Form::Predicate => "predicate",
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
