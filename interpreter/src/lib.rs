pub mod context;
pub mod dataflow;
pub mod environment;
pub mod error;
pub mod executor;
pub mod library;
pub mod registry;
pub mod runtime_value;

pub use context::BlockContext;
pub use dataflow::{GraphOutputs, run_graph, topological_order};
pub use environment::Environment;
pub use error::{BlockFailure, RunError, RuntimeError};
pub use executor::{
    CancelToken, Execution, MAX_DEPTH, RunOptions, RunPhase, RunReport, execute_program,
    execute_program_with,
};
pub use library::standard_registry;
pub use registry::{BlockBehavior, BlockRegistry, BlockSpec, NodeBehavior, PortValues};
pub use runtime_value::RuntimeValue;
