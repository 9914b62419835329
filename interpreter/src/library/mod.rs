//! Block kinds every host gets for free.

mod operators;
mod statements;

pub use operators::{BinaryOp, coerce_number, eval_binary_op};

use crate::registry::BlockRegistry;

/// A registry holding the built-in statements, control blocks and operators.
pub fn standard_registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    statements::register(&mut registry);
    operators::register(&mut registry);
    registry
}
