use std::io::{self, Write};
use std::rc::Rc;

use crate::position::Span;
use crate::value::{resolve_index, value_to_string, BuiltIn, Value};

use super::environment::{Context, SymbolTable};
use super::error::RuntimeError;
use super::evaluator::Interpreter;

/// Pre-populates the global table: constants first, then every built-in
/// function under its language-visible name.
pub fn install(globals: &Rc<SymbolTable>) {
    globals.set("NULL", Value::int(0.0));
    globals.set("FALSE", Value::int(0.0));
    globals.set("TRUE", Value::int(1.0));
    globals.set("MATH_PI", Value::float(std::f64::consts::PI));

    for builtin in [
        BuiltIn::Print,
        BuiltIn::PrintRet,
        BuiltIn::Input,
        BuiltIn::InputInt,
        BuiltIn::Clear,
        BuiltIn::IsNum,
        BuiltIn::IsStr,
        BuiltIn::IsList,
        BuiltIn::IsFun,
        BuiltIn::Append,
        BuiltIn::Pop,
        BuiltIn::Extend,
        BuiltIn::Len,
        BuiltIn::Run,
    ] {
        globals.set(builtin.name(), Value::BuiltIn(builtin));
    }
}

/// Dispatch for a built-in call. Arity has already been checked by the
/// caller. Failures come back as runtime errors, never panics.
pub fn call(
    interpreter: &mut Interpreter,
    builtin: BuiltIn,
    args: &[Value],
    span: &Span,
    ctx: &Rc<Context>,
) -> Result<Value, RuntimeError> {
    match builtin {
        BuiltIn::Print => builtin_print(&args[0]),
        BuiltIn::PrintRet => Ok(Value::Str(Rc::from(value_to_string(&args[0])))),
        BuiltIn::Input => builtin_input(span, ctx),
        BuiltIn::InputInt => builtin_input_int(span, ctx),
        BuiltIn::Clear => builtin_clear(),
        BuiltIn::IsNum => Ok(Value::bool(matches!(args[0], Value::Number(..)))),
        BuiltIn::IsStr => Ok(Value::bool(matches!(args[0], Value::Str(_)))),
        BuiltIn::IsList => Ok(Value::bool(matches!(args[0], Value::List(_)))),
        BuiltIn::IsFun => Ok(Value::bool(matches!(
            args[0],
            Value::Function(_) | Value::BuiltIn(_)
        ))),
        BuiltIn::Append => builtin_append(args, span, ctx),
        BuiltIn::Pop => builtin_pop(args, span, ctx),
        BuiltIn::Extend => builtin_extend(args, span, ctx),
        BuiltIn::Len => builtin_len(&args[0], span, ctx),
        BuiltIn::Run => builtin_run(interpreter, &args[0], span, ctx),
    }
}

fn builtin_print(value: &Value) -> Result<Value, RuntimeError> {
    println!("{}", value_to_string(value));
    io::stdout().flush().ok();
    Ok(Value::Null)
}

fn builtin_input(span: &Span, ctx: &Rc<Context>) -> Result<Value, RuntimeError> {
    let line = read_line(span, ctx)?;
    Ok(Value::Str(Rc::from(line)))
}

fn builtin_input_int(span: &Span, ctx: &Rc<Context>) -> Result<Value, RuntimeError> {
    loop {
        let line = read_line(span, ctx)?;
        match line.trim().parse::<i64>() {
            Ok(number) => return Ok(Value::int(number as f64)),
            Err(_) => {
                println!("'{}' must be an integer. Try again!", line);
                io::stdout().flush().ok();
            }
        }
    }
}

fn read_line(span: &Span, ctx: &Rc<Context>) -> Result<String, RuntimeError> {
    let mut line = String::new();
    io::stdin().read_line(&mut line).map_err(|e| {
        RuntimeError::new(
            format!("Failed to read input: {}", e),
            span.clone(),
            Rc::clone(ctx),
        )
    })?;
    Ok(line
        .trim_end_matches('\n')
        .trim_end_matches('\r')
        .to_string())
}

fn builtin_clear() -> Result<Value, RuntimeError> {
    // ANSI clear-screen plus cursor home.
    print!("\x1b[2J\x1b[1;1H");
    io::stdout().flush().ok();
    Ok(Value::Null)
}

fn builtin_append(args: &[Value], span: &Span, ctx: &Rc<Context>) -> Result<Value, RuntimeError> {
    let Value::List(items) = &args[0] else {
        return Err(RuntimeError::new(
            "First argument must be a list",
            span.clone(),
            Rc::clone(ctx),
        ));
    };
    items.borrow_mut().push(args[1].clone());
    Ok(Value::Null)
}

fn builtin_pop(args: &[Value], span: &Span, ctx: &Rc<Context>) -> Result<Value, RuntimeError> {
    let Value::List(items) = &args[0] else {
        return Err(RuntimeError::new(
            "First argument must be a list",
            span.clone(),
            Rc::clone(ctx),
        ));
    };
    let Value::Number(index, _) = &args[1] else {
        return Err(RuntimeError::new(
            "Second argument must be a number",
            span.clone(),
            Rc::clone(ctx),
        ));
    };

    let mut items = items.borrow_mut();
    let Some(index) = resolve_index(*index, items.len()) else {
        return Err(RuntimeError::new(
            "Element at this index could not be removed from list because index is out of bounds",
            span.clone(),
            Rc::clone(ctx),
        ));
    };
    Ok(items.remove(index))
}

fn builtin_extend(args: &[Value], span: &Span, ctx: &Rc<Context>) -> Result<Value, RuntimeError> {
    let (Value::List(target), Value::List(additions)) = (&args[0], &args[1]) else {
        return Err(RuntimeError::new(
            "Both arguments must be lists",
            span.clone(),
            Rc::clone(ctx),
        ));
    };
    // Snapshot first: the two handles may be the same list.
    let additions = additions.borrow().clone();
    target.borrow_mut().extend(additions);
    Ok(Value::Null)
}

fn builtin_len(value: &Value, span: &Span, ctx: &Rc<Context>) -> Result<Value, RuntimeError> {
    match value {
        Value::List(items) => Ok(Value::int(items.borrow().len() as f64)),
        Value::Str(s) => Ok(Value::int(s.chars().count() as f64)),
        _ => Err(RuntimeError::new(
            "Argument must be a list or string",
            span.clone(),
            Rc::clone(ctx),
        )),
    }
}

/// Loads and executes another script against the caller's global table.
fn builtin_run(
    interpreter: &mut Interpreter,
    path: &Value,
    span: &Span,
    ctx: &Rc<Context>,
) -> Result<Value, RuntimeError> {
    let Value::Str(path) = path else {
        return Err(RuntimeError::new(
            "Argument must be a string",
            span.clone(),
            Rc::clone(ctx),
        ));
    };

    let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        RuntimeError::new(
            format!("Failed to load script \"{}\" ({})", path, e),
            span.clone(),
            Rc::clone(ctx),
        )
    })?;

    match interpreter.run(path, &text) {
        Ok(_) => Ok(Value::Null),
        Err(diagnostic) => Err(RuntimeError::new(
            format!(
                "Failed to finish executing script \"{}\"\n{}",
                path,
                diagnostic.render(false)
            ),
            span.clone(),
            Rc::clone(ctx),
        )),
    }
}
