use std::time::Duration;

use blockwork::Form;

use crate::context::BlockContext;
use crate::error::RuntimeError;
use crate::registry::{BlockRegistry, BlockSpec};
use crate::runtime_value::RuntimeValue;

use super::operators::coerce_number;

type HookResult = Result<RuntimeValue, RuntimeError>;

fn variable_name(ctx: &BlockContext<'_, '_>) -> Result<String, RuntimeError> {
    ctx.config()
        .get("variable")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RuntimeError::MissingConfig("variable".to_string()))
}

/// Input `key` if the block has it, else the same-named lowercase config
/// field.
fn input_or_config(ctx: &mut BlockContext<'_, '_>, key: &str) -> HookResult {
    if ctx.has_input(key) {
        return ctx.input(key);
    }
    ctx.config_field(&key.to_lowercase())
        .ok_or_else(|| RuntimeError::MissingInput(key.to_string()))
}

fn say(ctx: &mut BlockContext<'_, '_>) -> HookResult {
    let text = ctx.input("TEXT")?;
    writeln!(ctx.output(), "{}", text)?;
    Ok(RuntimeValue::Unit)
}

fn set(ctx: &mut BlockContext<'_, '_>) -> HookResult {
    let name = variable_name(ctx)?;
    let value = ctx.input("VALUE")?;
    ctx.state().set(&name, value);
    Ok(RuntimeValue::Unit)
}

fn change(ctx: &mut BlockContext<'_, '_>) -> HookResult {
    let name = variable_name(ctx)?;
    let by = coerce_number(&ctx.input("BY")?)?;
    let current = match ctx.state().get(&name) {
        Some(value) => coerce_number(value)?,
        None => 0.0,
    };
    ctx.state().set(&name, RuntimeValue::Number(current + by));
    Ok(RuntimeValue::Unit)
}

fn wait(ctx: &mut BlockContext<'_, '_>) -> HookResult {
    let seconds = coerce_number(&input_or_config(ctx, "SECONDS")?)?;
    let duration = Duration::try_from_secs_f64(seconds)
        .map_err(|_| RuntimeError::Custom(format!("cannot wait {} seconds", seconds)))?;
    std::thread::sleep(duration);
    Ok(RuntimeValue::Unit)
}

fn fail(ctx: &mut BlockContext<'_, '_>) -> HookResult {
    let message = match input_or_config(ctx, "MESSAGE") {
        Ok(value) => value.to_string(),
        Err(RuntimeError::MissingInput(_)) => "failed".to_string(),
        Err(error) => return Err(error),
    };
    Err(RuntimeError::Custom(message))
}

fn repeat(ctx: &mut BlockContext<'_, '_>) -> HookResult {
    let times = coerce_number(&input_or_config(ctx, "TIMES")?)?;
    let mut remaining = if times.is_finite() && times > 0.0 {
        times.floor() as u64
    } else {
        0
    };
    while remaining > 0 {
        ctx.run_slot("DO")?;
        remaining -= 1;
    }
    Ok(RuntimeValue::Unit)
}

fn repeat_until(ctx: &mut BlockContext<'_, '_>) -> HookResult {
    while ctx.input("CONDITION")?.is_falsy() {
        ctx.run_slot("DO")?;
    }
    Ok(RuntimeValue::Unit)
}

fn if_then(ctx: &mut BlockContext<'_, '_>) -> HookResult {
    if ctx.input("CONDITION")?.is_truthy() {
        ctx.run_slot("THEN")?;
    }
    Ok(RuntimeValue::Unit)
}

fn if_else(ctx: &mut BlockContext<'_, '_>) -> HookResult {
    let branch = if ctx.input("CONDITION")?.is_truthy() {
        "THEN"
    } else {
        "ELSE"
    };
    ctx.run_slot(branch)?;
    Ok(RuntimeValue::Unit)
}

fn variable(ctx: &mut BlockContext<'_, '_>) -> HookResult {
    let name = variable_name(ctx)?;
    ctx.state()
        .get(&name)
        .cloned()
        .ok_or(RuntimeError::UndefinedVariable(name))
}

pub(super) fn register(registry: &mut BlockRegistry) {
    registry
        .register(
            "when_run",
            BlockSpec::new(Form::Hat).with_description("starts a script"),
        )
        .register(
            "say",
            BlockSpec::new(Form::Statement)
                .with_inputs(["TEXT"])
                .with_description("writes TEXT as a line of output")
                .with_hook(say),
        )
        .register(
            "set",
            BlockSpec::new(Form::Statement)
                .with_inputs(["VALUE"])
                .with_description("stores VALUE under config.variable")
                .with_hook(set),
        )
        .register(
            "change",
            BlockSpec::new(Form::Statement)
                .with_inputs(["BY"])
                .with_description("adds BY to the number under config.variable")
                .with_hook(change),
        )
        .register(
            "wait",
            BlockSpec::new(Form::Statement)
                .with_inputs(["SECONDS"])
                .with_description("pauses the run for SECONDS")
                .with_hook(wait),
        )
        .register(
            "fail",
            BlockSpec::new(Form::Statement)
                .with_inputs(["MESSAGE"])
                .with_description("raises an error with MESSAGE")
                .with_hook(fail),
        )
        .register(
            "repeat",
            BlockSpec::new(Form::C)
                .with_inputs(["TIMES"])
                .with_slots(["DO"])
                .with_description("runs DO TIMES times")
                .with_hook(repeat),
        )
        .register(
            "repeat_until",
            BlockSpec::new(Form::C)
                .with_inputs(["CONDITION"])
                .with_slots(["DO"])
                .with_description("runs DO until CONDITION holds")
                .with_hook(repeat_until),
        )
        .register(
            "if",
            BlockSpec::new(Form::C)
                .with_inputs(["CONDITION"])
                .with_slots(["THEN"])
                .with_description("runs THEN when CONDITION holds")
                .with_hook(if_then),
        )
        .register(
            "if_else",
            BlockSpec::new(Form::C)
                .with_inputs(["CONDITION"])
                .with_slots(["THEN", "ELSE"])
                .with_description("runs THEN or ELSE depending on CONDITION")
                .with_hook(if_else),
        )
        .register(
            "variable",
            BlockSpec::new(Form::Reporter)
                .with_outputs(["value"])
                .with_description("the value stored under config.variable")
                .with_hook(variable),
        );
}
