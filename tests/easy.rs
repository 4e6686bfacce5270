mod common;

use common::{eval, eval_list, eval_num, eval_str};
use parseflow::Value;

#[test]
fn test_number_literal() {
    assert_eq!(eval_num("42"), 42.0);
    assert_eq!(eval_num("3.25"), 3.25);
}

#[test]
fn test_string_literal() {
    assert_eq!(eval_str("\"hello\""), "hello");
    assert_eq!(eval_str("\"tab\\there\""), "tab\there");
}

#[test]
fn test_variable_assignment_yields_value() {
    assert_eq!(eval_num("VAR x = 5"), 5.0);
}

#[test]
fn test_variable_assignment_then_use() {
    assert_eq!(eval_num("VAR a = 5 ; a + 3"), 8.0);
}

#[test]
fn test_assignment_chains_through_expressions() {
    assert_eq!(eval_num("VAR a = VAR b = 2 ; a + b"), 4.0);
}

#[test]
fn test_arithmetic_precedence() {
    assert_eq!(eval_num("10 + 5 * 2"), 20.0);
    assert_eq!(eval_num("(10 + 5) * 2"), 30.0);
    assert_eq!(eval_num("10 - 4 - 3"), 3.0);
}

#[test]
fn test_unary_minus() {
    assert_eq!(eval_num("-5 + 3"), -2.0);
    assert_eq!(eval_num("--5"), 5.0);
    assert_eq!(eval_num("+7"), 7.0);
}

#[test]
fn test_statement_separators_are_interchangeable() {
    assert_eq!(eval_num("VAR a = 1; VAR b = 2\nVAR c = 3 ; a + b + c"), 6.0);
}

#[test]
fn test_leading_and_trailing_newlines() {
    assert_eq!(eval_num("\n\n1 + 1\n\n"), 2.0);
}

#[test]
fn test_comments_are_skipped() {
    assert_eq!(eval_num("# setup\nVAR x = 2 # inline\n# done\nx * 3"), 6.0);
}

#[test]
fn test_list_literal() {
    let items = eval_list("[1, 2, 3]");
    assert_eq!(items, vec![Value::int(1.0), Value::int(2.0), Value::int(3.0)]);
}

#[test]
fn test_empty_list() {
    assert!(eval_list("[]").is_empty());
}

#[test]
fn test_nested_list() {
    let items = eval_list("[[1], 2]");
    assert_eq!(items.len(), 2);
    assert!(matches!(items[0], Value::List(_)));
}

#[test]
fn test_global_constants() {
    assert_eq!(eval_num("TRUE"), 1.0);
    assert_eq!(eval_num("FALSE"), 0.0);
    assert_eq!(eval_num("NULL"), 0.0);
    assert!((eval_num("MATH_PI") - std::f64::consts::PI).abs() < 1e-12);
}

#[test]
fn test_program_result_is_statement_list() {
    let result = parseflow::interpreter::parse_and_run("<test>", "1; 2; 3")
        .expect("program should run");
    let Value::List(items) = result else {
        panic!("expected list result");
    };
    assert_eq!(items.borrow().len(), 3);
}

#[test]
fn test_reassignment_overwrites() {
    assert_eq!(eval_num("VAR x = 1; VAR x = x + 1; x"), 2.0);
}

#[test]
fn test_arithmetic_matches_ieee() {
    assert_eq!(eval_num("0.1 + 0.2"), 0.1 + 0.2);
    assert_eq!(eval_num("1 / 3"), 1.0 / 3.0);
}

#[test]
fn test_deterministic_pure_expression() {
    let a = eval("[1 + 2 * 3, \"x\" + \"y\", 2 ^ 10]");
    let b = eval("[1 + 2 * 3, \"x\" + \"y\", 2 ^ 10]");
    match (a, b) {
        (Value::List(a), Value::List(b)) => assert_eq!(*a.borrow(), *b.borrow()),
        _ => panic!("expected lists"),
    }
}
