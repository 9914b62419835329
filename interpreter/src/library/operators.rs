use blockwork::Form;

use crate::context::BlockContext;
use crate::error::RuntimeError;
use crate::registry::{BlockRegistry, BlockSpec, PortValues};
use crate::runtime_value::RuntimeValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Join,
    Equals,
    LessThan,
    GreaterThan,
}

impl BinaryOp {
    fn form(self) -> Form {
        match self {
            BinaryOp::Equals | BinaryOp::LessThan | BinaryOp::GreaterThan => Form::Predicate,
            _ => Form::Reporter,
        }
    }

    fn description(self) -> &'static str {
        match self {
            BinaryOp::Add => "A + B",
            BinaryOp::Subtract => "A - B",
            BinaryOp::Multiply => "A * B",
            BinaryOp::Divide => "A / B",
            BinaryOp::Modulo => "remainder of A / B",
            BinaryOp::Join => "A and B concatenated as text",
            BinaryOp::Equals => "A equals B",
            BinaryOp::LessThan => "A is less than B",
            BinaryOp::GreaterThan => "A is greater than B",
        }
    }
}

pub fn coerce_number(val: &RuntimeValue) -> Result<f64, RuntimeError> {
    match val {
        RuntimeValue::Number(n) => Ok(*n),
        other => Err(RuntimeError::type_error("Number", other.type_name())),
    }
}

pub fn eval_binary_op(
    op: BinaryOp,
    left: &RuntimeValue,
    right: &RuntimeValue,
) -> Result<RuntimeValue, RuntimeError> {
    match op {
        BinaryOp::Add => match (left, right) {
            (RuntimeValue::Number(a), RuntimeValue::Number(b)) => Ok(RuntimeValue::Number(a + b)),
            (RuntimeValue::String(a), RuntimeValue::String(b)) => {
                Ok(RuntimeValue::String(format!("{}{}", a, b)))
            }
            _ => Err(RuntimeError::TypeError {
                expected: "matching numeric or string types".to_string(),
                got: format!("{} + {}", left.type_name(), right.type_name()),
            }),
        },
        BinaryOp::Subtract => numeric_binop(left, right, |a, b| a - b),
        BinaryOp::Multiply => numeric_binop(left, right, |a, b| a * b),
        BinaryOp::Divide => {
            let a = coerce_number(left)?;
            let b = coerce_number(right)?;
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Ok(RuntimeValue::Number(a / b))
        }
        BinaryOp::Modulo => {
            let a = coerce_number(left)?;
            let b = coerce_number(right)?;
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Ok(RuntimeValue::Number(a % b))
        }
        BinaryOp::Join => Ok(RuntimeValue::String(format!("{}{}", left, right))),
        BinaryOp::Equals => Ok(RuntimeValue::Boolean(left == right)),
        BinaryOp::LessThan => numeric_cmp(left, right, |a, b| a < b),
        BinaryOp::GreaterThan => numeric_cmp(left, right, |a, b| a > b),
    }
}

fn numeric_binop(
    left: &RuntimeValue,
    right: &RuntimeValue,
    f: impl Fn(f64, f64) -> f64,
) -> Result<RuntimeValue, RuntimeError> {
    let a = coerce_number(left)?;
    let b = coerce_number(right)?;
    Ok(RuntimeValue::Number(f(a, b)))
}

fn numeric_cmp(
    left: &RuntimeValue,
    right: &RuntimeValue,
    f: impl Fn(f64, f64) -> bool,
) -> Result<RuntimeValue, RuntimeError> {
    let a = coerce_number(left)?;
    let b = coerce_number(right)?;
    Ok(RuntimeValue::Boolean(f(a, b)))
}

fn port<'a>(inputs: &'a PortValues, key: &str) -> Result<&'a RuntimeValue, RuntimeError> {
    inputs
        .get(key)
        .ok_or_else(|| RuntimeError::MissingInput(key.to_string()))
}

fn single(value: RuntimeValue) -> PortValues {
    PortValues::from([("value".to_string(), value)])
}

fn binary(op: BinaryOp) -> BlockSpec {
    BlockSpec::new(op.form())
        .with_inputs(["A", "B"])
        .with_outputs(["value"])
        .with_description(op.description())
        .with_hook(move |ctx: &mut BlockContext<'_, '_>| {
            let left = ctx.input("A")?;
            let right = ctx.input("B")?;
            eval_binary_op(op, &left, &right)
        })
        .with_node_hook(move |inputs, _config| {
            eval_binary_op(op, port(inputs, "A")?, port(inputs, "B")?).map(single)
        })
}

/// `and`/`or`. In a script the right operand is only read when it can
/// change the result.
fn logical(short_circuit_on: bool, description: &str) -> BlockSpec {
    BlockSpec::new(Form::Predicate)
        .with_inputs(["A", "B"])
        .with_outputs(["value"])
        .with_description(description)
        .with_hook(move |ctx: &mut BlockContext<'_, '_>| {
            if ctx.input("A")?.is_truthy() == short_circuit_on {
                return Ok(RuntimeValue::Boolean(short_circuit_on));
            }
            Ok(RuntimeValue::Boolean(ctx.input("B")?.is_truthy()))
        })
        .with_node_hook(move |inputs, _config| {
            let a = port(inputs, "A")?.is_truthy();
            let b = port(inputs, "B")?.is_truthy();
            let value = if short_circuit_on { a || b } else { a && b };
            Ok(single(RuntimeValue::Boolean(value)))
        })
}

pub(super) fn register(registry: &mut BlockRegistry) {
    let ops = [
        ("add", BinaryOp::Add),
        ("subtract", BinaryOp::Subtract),
        ("multiply", BinaryOp::Multiply),
        ("divide", BinaryOp::Divide),
        ("modulo", BinaryOp::Modulo),
        ("join", BinaryOp::Join),
        ("equals", BinaryOp::Equals),
        ("less_than", BinaryOp::LessThan),
        ("greater_than", BinaryOp::GreaterThan),
    ];
    for (kind, op) in ops {
        registry.register(kind, binary(op));
    }

    registry
        .register("and", logical(false, "both A and B are truthy"))
        .register("or", logical(true, "A or B is truthy"))
        .register(
            "not",
            BlockSpec::new(Form::Predicate)
                .with_inputs(["VALUE"])
                .with_outputs(["value"])
                .with_description("VALUE is falsy")
                .with_hook(|ctx: &mut BlockContext<'_, '_>| {
                    Ok(RuntimeValue::Boolean(ctx.input("VALUE")?.is_falsy()))
                })
                .with_node_hook(|inputs, _config| {
                    Ok(single(RuntimeValue::Boolean(port(inputs, "VALUE")?.is_falsy())))
                }),
        )
        .register(
            "constant",
            BlockSpec::new(Form::Reporter)
                .with_outputs(["value"])
                .with_description("the value in config.value")
                .with_hook(|ctx: &mut BlockContext<'_, '_>| {
                    Ok(ctx.config_field("value").unwrap_or(RuntimeValue::Unit))
                })
                .with_node_hook(|_inputs, config| {
                    let value = config
                        .get("value")
                        .map(RuntimeValue::from)
                        .unwrap_or(RuntimeValue::Unit);
                    Ok(single(value))
                }),
        );
}
