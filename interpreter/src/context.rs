use std::io::Write;

use blockwork::{Block, BlockId, Input};

use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::executor::Machine;
use crate::runtime_value::RuntimeValue;

/// What a hook sees of the run while its block executes.
pub struct BlockContext<'m, 'p> {
    machine: &'m mut Machine<'p>,
    block: &'p Block,
}

impl<'m, 'p> BlockContext<'m, 'p> {
    pub(crate) fn new(machine: &'m mut Machine<'p>, block: &'p Block) -> Self {
        BlockContext { machine, block }
    }

    pub fn block(&self) -> &'p Block {
        self.block
    }

    pub fn id(&self) -> &'p BlockId {
        &self.block.id
    }

    pub fn config(&self) -> &'p serde_json::Value {
        &self.block.config
    }

    /// One field of an object-shaped config, if present and not null.
    pub fn config_field(&self, key: &str) -> Option<RuntimeValue> {
        match self.block.config.get(key) {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(RuntimeValue::from(value)),
        }
    }

    pub fn has_input(&self, key: &str) -> bool {
        self.block.inputs.contains_key(key)
    }

    /// Read input `key`.
    ///
    /// A literal is returned as-is. A reference evaluates the referenced
    /// reporter or predicate now; nothing is memoized, so every call runs
    /// that block (and its side effects) again. Errors from the referenced
    /// block come back here for the hook to handle or return.
    pub fn input(&mut self, key: &str) -> Result<RuntimeValue, RuntimeError> {
        match self.block.inputs.get(key) {
            None => Err(RuntimeError::MissingInput(key.to_string())),
            Some(Input::Literal { literal }) => Ok(RuntimeValue::from(literal)),
            Some(Input::Reference { block_id }) => self.machine.evaluate(block_id),
        }
    }

    /// Run the chain in slot `key` to completion. May be called any number
    /// of times; this is how loops and branches are built.
    pub fn run_slot(&mut self, key: &str) -> Result<(), RuntimeError> {
        let Some(head) = self.block.slot_heads.get(key) else {
            return Err(RuntimeError::UnknownSlot(key.to_string()));
        };
        if self.machine.check_cancelled() {
            return Err(RuntimeError::Aborted);
        }
        self.machine.run_chain(head.as_ref());
        if self.machine.is_aborted() {
            return Err(RuntimeError::Aborted);
        }
        Ok(())
    }

    /// The scratchpad shared by every block in this run.
    pub fn state(&mut self) -> &mut Environment {
        &mut self.machine.env
    }

    /// Where output-producing blocks write.
    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.machine.output
    }
}
