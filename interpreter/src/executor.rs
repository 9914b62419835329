use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use blockwork::{Block, BlockId, Program};

use crate::context::BlockContext;
use crate::environment::Environment;
use crate::error::{BlockFailure, RunError, RuntimeError};
use crate::registry::BlockRegistry;
use crate::runtime_value::RuntimeValue;

pub const MAX_DEPTH: usize = 256;

/// Cooperative cancellation flag, checked between statements.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// How deeply value blocks may nest through input references before
    /// evaluation gives up with a stack overflow.
    pub max_depth: usize,
    pub cancel: Option<CancelToken>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            max_depth: MAX_DEPTH,
            cancel: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Outcome of a run that completed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Statements whose hooks failed, in execution order.
    pub failures: Vec<BlockFailure>,
    /// Number of sequenced blocks visited, counting repeats.
    pub executed: usize,
    /// The scratchpad as the last block left it.
    pub state: Environment,
}

/// One run of a program.
///
/// Moves `Idle → Running → Completed | Failed` and cannot be restarted.
/// Heads run strictly one after another; a hook that blocks holds up its
/// own script and every script after it.
pub struct Execution<'p> {
    program: &'p Program,
    registry: &'p BlockRegistry,
    options: RunOptions,
    phase: RunPhase,
    failures: Vec<BlockFailure>,
}

impl<'p> Execution<'p> {
    pub fn new(program: &'p Program, registry: &'p BlockRegistry) -> Self {
        Execution {
            program,
            registry,
            options: RunOptions::default(),
            phase: RunPhase::Idle,
            failures: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Isolated statement failures recorded so far, including those from a
    /// run that later failed.
    pub fn failures(&self) -> &[BlockFailure] {
        &self.failures
    }

    pub fn run(&mut self, output: &mut dyn Write) -> Result<RunReport, RunError> {
        if self.phase != RunPhase::Idle {
            return Err(RunError::AlreadyRun);
        }
        self.phase = RunPhase::Running;
        tracing::info!(heads = self.program.heads.len(), "run started");

        if let Err(violations) = self.program.validate_shapes(self.registry) {
            self.phase = RunPhase::Failed;
            return Err(RunError::MalformedProgram(violations));
        }

        let mut machine = Machine {
            program: self.program,
            registry: self.registry,
            output,
            options: &self.options,
            env: Environment::new(),
            failures: Vec::new(),
            fatal: None,
            depth: 0,
            executed: 0,
        };

        for head in &self.program.heads {
            machine.run_chain(Some(head));
            if machine.is_aborted() {
                break;
            }
        }

        let Machine {
            env,
            failures,
            fatal,
            executed,
            ..
        } = machine;
        self.failures = failures;

        match fatal {
            Some(error) => {
                self.phase = RunPhase::Failed;
                tracing::info!(%error, "run failed");
                Err(error)
            }
            None => {
                self.phase = RunPhase::Completed;
                tracing::info!(executed, failures = self.failures.len(), "run completed");
                Ok(RunReport {
                    failures: self.failures.clone(),
                    executed,
                    state: env,
                })
            }
        }
    }
}

/// Run every head of `program` in order with default options.
pub fn execute_program(
    program: &Program,
    registry: &BlockRegistry,
    output: &mut dyn Write,
) -> Result<RunReport, RunError> {
    Execution::new(program, registry).run(output)
}

/// Like [`execute_program`], with explicit options.
pub fn execute_program_with(
    program: &Program,
    registry: &BlockRegistry,
    output: &mut dyn Write,
    options: RunOptions,
) -> Result<RunReport, RunError> {
    Execution::new(program, registry)
        .with_options(options)
        .run(output)
}

/// Per-run interpreter state. Hooks reach it through [`BlockContext`].
pub(crate) struct Machine<'p> {
    program: &'p Program,
    registry: &'p BlockRegistry,
    pub(crate) output: &'p mut dyn Write,
    options: &'p RunOptions,
    pub(crate) env: Environment,
    failures: Vec<BlockFailure>,
    /// Set once the run must stop. Hooks cannot clear it.
    fatal: Option<RunError>,
    depth: usize,
    executed: usize,
}

impl<'p> Machine<'p> {
    pub(crate) fn is_aborted(&self) -> bool {
        self.fatal.is_some()
    }

    fn abort(&mut self, error: RunError) {
        if self.fatal.is_none() {
            tracing::error!(%error, "aborting run");
            self.fatal = Some(error);
        }
    }

    /// Abort with `Cancelled` if the host asked the run to stop.
    pub(crate) fn check_cancelled(&mut self) -> bool {
        if self.options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            self.abort(RunError::Cancelled);
        }
        self.is_aborted()
    }

    /// Execute a `next` chain until it ends or the run aborts.
    pub(crate) fn run_chain(&mut self, start: Option<&'p BlockId>) {
        let program = self.program;
        let mut current = start;
        while let Some(id) = current {
            if self.is_aborted() {
                return;
            }
            if self.check_cancelled() {
                return;
            }
            let Some(block) = program.block(id) else {
                self.abort(RunError::MissingBlock(id.to_string()));
                return;
            };
            self.run_statement(block);
            current = block.next.as_ref();
        }
    }

    /// Execute one `hat`/`statement`/`c` block. A hook error is recorded and
    /// swallowed here so the chain continues with the next block.
    fn run_statement(&mut self, block: &'p Block) {
        let registry = self.registry;
        let Some(spec) = registry.get(&block.kind) else {
            self.abort(RunError::UnknownBlockKind {
                id: block.id.to_string(),
                kind: block.kind.clone(),
            });
            return;
        };
        self.executed += 1;
        tracing::debug!(block = %block.id, kind = %block.kind, "execute");

        let Some(behavior) = spec.behavior() else {
            return;
        };
        let result = behavior.execute(&mut BlockContext::new(self, block));
        if self.is_aborted() {
            return;
        }
        if let Err(error) = result {
            tracing::warn!(block = %block.id, kind = %block.kind, %error, "block failed");
            self.failures.push(BlockFailure {
                id: block.id.clone(),
                kind: block.kind.clone(),
                error,
            });
        }
    }

    /// Evaluate a referenced reporter or predicate. Runs its hook on every
    /// call.
    pub(crate) fn evaluate(&mut self, id: &'p BlockId) -> Result<RuntimeValue, RuntimeError> {
        if self.is_aborted() {
            return Err(RuntimeError::Aborted);
        }
        let program = self.program;
        let registry = self.registry;
        let Some(block) = program.block(id) else {
            self.abort(RunError::MissingBlock(id.to_string()));
            return Err(RuntimeError::Aborted);
        };
        let Some(spec) = registry.get(&block.kind) else {
            self.abort(RunError::UnknownBlockKind {
                id: block.id.to_string(),
                kind: block.kind.clone(),
            });
            return Err(RuntimeError::Aborted);
        };
        let Some(behavior) = spec.behavior() else {
            return Ok(RuntimeValue::Unit);
        };
        if self.depth >= self.options.max_depth {
            return Err(RuntimeError::StackOverflow(self.options.max_depth));
        }

        tracing::trace!(block = %block.id, kind = %block.kind, depth = self.depth, "evaluate");
        self.depth += 1;
        let result = behavior.execute(&mut BlockContext::new(self, block));
        self.depth -= 1;

        if self.is_aborted() {
            return Err(RuntimeError::Aborted);
        }
        result.map_err(|error| match error {
            RuntimeError::Aborted | RuntimeError::InValueBlock { .. } => error,
            other => RuntimeError::InValueBlock {
                id: block.id.clone(),
                kind: block.kind.clone(),
                error: Box::new(other),
            },
        })
    }
}
