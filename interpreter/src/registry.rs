use std::collections::{BTreeMap, HashMap};

use blockwork::{Form, KindCatalog};

use crate::context::BlockContext;
use crate::error::RuntimeError;
use crate::runtime_value::RuntimeValue;

/// Values on a dataflow node's ports, keyed by port.
pub type PortValues = BTreeMap<String, RuntimeValue>;

/// What a block kind does when the sequential interpreter reaches it.
pub trait BlockBehavior {
    fn execute(&self, ctx: &mut BlockContext<'_, '_>) -> Result<RuntimeValue, RuntimeError>;
}

/// What a block kind does as a dataflow node: input ports in, output
/// record out.
pub trait NodeBehavior {
    fn evaluate(
        &self,
        inputs: &PortValues,
        config: &serde_json::Value,
    ) -> Result<PortValues, RuntimeError>;
}

struct BlockHook<F>(F);

impl<F> BlockBehavior for BlockHook<F>
where
    F: Fn(&mut BlockContext<'_, '_>) -> Result<RuntimeValue, RuntimeError>,
{
    fn execute(&self, ctx: &mut BlockContext<'_, '_>) -> Result<RuntimeValue, RuntimeError> {
        (self.0)(ctx)
    }
}

struct NodeHook<F>(F);

impl<F> NodeBehavior for NodeHook<F>
where
    F: Fn(&PortValues, &serde_json::Value) -> Result<PortValues, RuntimeError>,
{
    fn evaluate(
        &self,
        inputs: &PortValues,
        config: &serde_json::Value,
    ) -> Result<PortValues, RuntimeError> {
        (self.0)(inputs, config)
    }
}

/// Declaration of one block kind.
///
/// `inputs`, `slots` and `outputs` describe the kind for editors and
/// validation. A kind without a behavior is a no-op when executed.
pub struct BlockSpec {
    pub form: Form,
    pub inputs: Vec<String>,
    pub slots: Vec<String>,
    pub outputs: Vec<String>,
    pub description: String,
    behavior: Option<Box<dyn BlockBehavior>>,
    evaluator: Option<Box<dyn NodeBehavior>>,
}

impl BlockSpec {
    pub fn new(form: Form) -> Self {
        BlockSpec {
            form,
            inputs: Vec::new(),
            slots: Vec::new(),
            outputs: Vec::new(),
            description: String::new(),
            behavior: None,
            evaluator: None,
        }
    }

    pub fn with_inputs<S: Into<String>>(mut self, inputs: impl IntoIterator<Item = S>) -> Self {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_slots<S: Into<String>>(mut self, slots: impl IntoIterator<Item = S>) -> Self {
        self.slots = slots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<S: Into<String>>(mut self, outputs: impl IntoIterator<Item = S>) -> Self {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_behavior(mut self, behavior: impl BlockBehavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    /// Use a closure as the sequential hook.
    pub fn with_hook<F>(self, hook: F) -> Self
    where
        F: Fn(&mut BlockContext<'_, '_>) -> Result<RuntimeValue, RuntimeError> + 'static,
    {
        self.with_behavior(BlockHook(hook))
    }

    pub fn with_evaluator(mut self, evaluator: impl NodeBehavior + 'static) -> Self {
        self.evaluator = Some(Box::new(evaluator));
        self
    }

    /// Use a closure as the dataflow hook.
    pub fn with_node_hook<F>(self, hook: F) -> Self
    where
        F: Fn(&PortValues, &serde_json::Value) -> Result<PortValues, RuntimeError> + 'static,
    {
        self.with_evaluator(NodeHook(hook))
    }

    pub fn behavior(&self) -> Option<&dyn BlockBehavior> {
        self.behavior.as_deref()
    }

    pub fn evaluator(&self) -> Option<&dyn NodeBehavior> {
        self.evaluator.as_deref()
    }
}

/// Catalogue mapping block kinds to their declarations.
///
/// Interpreters only look kinds up on demand; [`BlockRegistry::kinds`]
/// exists for tooling that lists what is available.
#[derive(Default)]
pub struct BlockRegistry {
    specs: HashMap<String, BlockSpec>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        BlockRegistry::default()
    }

    /// Register `spec` under `kind`, replacing any previous declaration.
    pub fn register(&mut self, kind: impl Into<String>, spec: BlockSpec) -> &mut Self {
        self.specs.insert(kind.into(), spec);
        self
    }

    pub fn with(mut self, kind: impl Into<String>, spec: BlockSpec) -> Self {
        self.register(kind, spec);
        self
    }

    pub fn get(&self, kind: &str) -> Option<&BlockSpec> {
        self.specs.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.specs.contains_key(kind)
    }

    /// All registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.specs.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl KindCatalog for BlockRegistry {
    fn declared_form(&self, kind: &str) -> Option<Form> {
        self.get(kind).map(|spec| spec.form)
    }

    fn declared_slots(&self, kind: &str) -> Vec<String> {
        self.get(kind).map(|spec| spec.slots.clone()).unwrap_or_default()
    }
}
