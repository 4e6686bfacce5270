mod common;

use common::{eval, eval_err, eval_list, eval_num};
use parseflow::Value;

#[test]
fn test_append_mutates_in_place() {
    assert_eq!(eval_num("VAR l = [1, 2, 3] ; APPEND(l, 4) ; LEN(l)"), 4.0);
}

#[test]
fn test_append_returns_null() {
    assert_eq!(eval("APPEND([], 1)"), Value::Null);
}

#[test]
fn test_append_grows_by_exactly_one() {
    assert_eq!(eval_num("VAR l = [] ; APPEND(l, 1) ; APPEND(l, 2) ; LEN(l)"), 2.0);
}

#[test]
fn test_append_non_list_fails() {
    assert_eq!(eval_err("APPEND(1, 2)").message, "First argument must be a list");
}

#[test]
fn test_pop_returns_removed_element() {
    assert_eq!(eval_num("VAR l = [10, 20, 30] ; POP(l, 1)"), 20.0);
}

#[test]
fn test_pop_shrinks_list() {
    assert_eq!(eval_num("VAR l = [10, 20, 30] ; POP(l, 1) ; LEN(l)"), 2.0);
}

#[test]
fn test_pop_negative_index() {
    assert_eq!(eval_num("VAR l = [10, 20, 30] ; POP(l, -1)"), 30.0);
}

#[test]
fn test_pop_out_of_range() {
    let diag = eval_err("POP([1], 4)");
    assert!(diag.message.contains("could not be removed"));
}

#[test]
fn test_pop_from_empty_list() {
    assert!(eval_err("POP([], 0)").message.contains("out of bounds"));
}

#[test]
fn test_pop_floors_fractional_index() {
    assert_eq!(eval_num("POP([10, 20, 30], 1.7)"), 20.0);
}

#[test]
fn test_extend_appends_all() {
    let items = eval_list("VAR a = [1, 2] ; EXTEND(a, [3, 4]) ; a");
    assert_eq!(
        items,
        vec![
            Value::int(1.0),
            Value::int(2.0),
            Value::int(3.0),
            Value::int(4.0)
        ]
    );
}

#[test]
fn test_extend_returns_null() {
    assert_eq!(eval("EXTEND([], [])"), Value::Null);
}

#[test]
fn test_extend_with_itself_doubles() {
    assert_eq!(eval_num("VAR l = [1, 2] ; EXTEND(l, l) ; LEN(l)"), 4.0);
}

#[test]
fn test_extend_requires_two_lists() {
    assert_eq!(eval_err("EXTEND([], 1)").message, "Both arguments must be lists");
}

#[test]
fn test_len_of_list_and_string() {
    assert_eq!(eval_num("LEN([1, 2, 3])"), 3.0);
    assert_eq!(eval_num("LEN([])"), 0.0);
    assert_eq!(eval_num("LEN(\"hello\")"), 5.0);
    assert_eq!(eval_num("LEN(\"\")"), 0.0);
}

#[test]
fn test_len_of_number_fails() {
    assert_eq!(eval_err("LEN(5)").message, "Argument must be a list or string");
}

#[test]
fn test_lists_are_shared_by_reference() {
    assert_eq!(eval_num("VAR a = [1] ; VAR b = a ; APPEND(b, 2) ; LEN(a)"), 2.0);
}

#[test]
fn test_self_referential_list_is_allowed() {
    assert_eq!(eval_num("VAR l = [1] ; APPEND(l, l) ; LEN(l)"), 2.0);
}

#[test]
fn test_type_predicates() {
    assert_eq!(eval_num("IS_NUM(1)"), 1.0);
    assert_eq!(eval_num("IS_NUM(\"1\")"), 0.0);
    assert_eq!(eval_num("IS_STR(\"x\")"), 1.0);
    assert_eq!(eval_num("IS_STR(1)"), 0.0);
    assert_eq!(eval_num("IS_LIST([])"), 1.0);
    assert_eq!(eval_num("IS_LIST(\"[]\")"), 0.0);
}

#[test]
fn test_list_of_mixed_values() {
    let items = eval_list("[1, \"two\", [3], FUN () -> 4]");
    assert_eq!(items.len(), 4);
    assert!(matches!(items[1], Value::Str(_)));
    assert!(matches!(items[3], Value::Function(_)));
}

#[test]
fn test_elements_evaluate_left_to_right() {
    let items = eval_list("VAR n = 0 ; [VAR n = n + 1, VAR n = n + 1, n]");
    assert_eq!(items, vec![Value::int(1.0), Value::int(2.0), Value::int(2.0)]);
}
