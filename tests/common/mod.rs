#![allow(dead_code)]

use parseflow::diagnostic::Diagnostic;
use parseflow::interpreter::parse_and_run;
use parseflow::Value;

/// Runs a program and returns the value of its final statement.
pub fn eval(source: &str) -> Value {
    let result = parse_and_run("<test>", source).expect("program should run");
    match result {
        Value::List(items) => items
            .borrow()
            .last()
            .cloned()
            .expect("program yields at least one value"),
        other => other,
    }
}

pub fn eval_num(source: &str) -> f64 {
    match eval(source) {
        Value::Number(n, _) => n,
        other => panic!("expected number, got {:?}", other),
    }
}

pub fn eval_str(source: &str) -> String {
    match eval(source) {
        Value::Str(s) => s.to_string(),
        other => panic!("expected string, got {:?}", other),
    }
}

pub fn eval_list(source: &str) -> Vec<Value> {
    match eval(source) {
        Value::List(items) => items.borrow().clone(),
        other => panic!("expected list, got {:?}", other),
    }
}

pub fn eval_err(source: &str) -> Diagnostic {
    parse_and_run("<test>", source).expect_err("program should fail")
}
