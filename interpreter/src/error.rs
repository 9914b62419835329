use std::fmt;

use blockwork::{BlockId, GraphViolation, Violation};
use thiserror::Error;

/// An error raised by a block's hook, or by the context calls it makes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("missing config: {0}")]
    MissingConfig(String),

    #[error("unknown slot: {0}")]
    UnknownSlot(String),

    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("stack overflow: value blocks nested deeper than {0}")]
    StackOverflow(usize),

    #[error("I/O error: {0}")]
    Io(String),

    /// Raised from `input`/`run_slot` once the run has hit a fatal error.
    /// Returning it (or anything else) from a hook cannot resume the run.
    #[error("run aborted")]
    Aborted,

    #[error("in {kind} '{id}': {error}")]
    InValueBlock {
        id: BlockId,
        kind: String,
        error: Box<RuntimeError>,
    },

    #[error("{0}")]
    Custom(String),
}

impl RuntimeError {
    pub fn type_error(expected: &str, got: &str) -> Self {
        RuntimeError::TypeError {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    /// The innermost value block the error came from, if any.
    pub fn origin(&self) -> Option<&BlockId> {
        match self {
            RuntimeError::InValueBlock { id, error, .. } => error.origin().or(Some(id)),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::Io(err.to_string())
    }
}

/// A statement whose hook failed. The run carried on past it.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFailure {
    pub id: BlockId,
    pub kind: String,
    pub error: RuntimeError,
}

impl BlockFailure {
    /// The block a host editor should highlight: the value block the error
    /// started in, or the statement itself.
    pub fn origin(&self) -> &BlockId {
        self.error.origin().unwrap_or(&self.id)
    }
}

impl fmt::Display for BlockFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block '{}' ({}) failed: {}", self.id, self.kind, self.error)
    }
}

impl std::error::Error for BlockFailure {}

/// An error that ends a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("block '{id}' has unknown kind '{kind}'")]
    UnknownBlockKind { id: String, kind: String },

    #[error("graph contains a cycle through {}", .nodes.join(", "))]
    CyclicGraph { nodes: Vec<String> },

    #[error("node '{id}' ({kind}) failed: {error}")]
    BlockExecution {
        id: String,
        kind: String,
        error: RuntimeError,
    },

    #[error("block '{0}' does not exist")]
    MissingBlock(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("this execution has already run")]
    AlreadyRun,

    #[error("malformed program: {}", .0.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; "))]
    MalformedProgram(Vec<Violation>),

    #[error("malformed graph: {}", .0.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; "))]
    MalformedGraph(Vec<GraphViolation>),
}

impl RunError {
    /// Id of the block or node that caused the error, for highlighting.
    pub fn element_id(&self) -> Option<&str> {
        match self {
            RunError::UnknownBlockKind { id, .. }
            | RunError::BlockExecution { id, .. }
            | RunError::MissingBlock(id) => Some(id),
            _ => None,
        }
    }
}
