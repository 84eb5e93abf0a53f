// pausa-syntax - Nesting limit tests for the parser
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Deeply nested input is rejected with a syntax error instead of
//! exhausting the stack; shallow nesting of every kind still parses.

use pausa_syntax::{parse, MAX_NESTING};
use proptest::prelude::*;

/// Opening and closing text for one level of each nesting kind.
const WRAPPERS: &[(&str, &str)] = &[
    ("(", ")"),
    ("[", "]"),
    ("(", ",)"),
    ("{1: ", "}"),
    ("f(", ")"),
    ("x[", "]"),
    ("-", ""),
    ("(not ", ")"),
    ("[y for y in ", "]"),
    ("(lambda: ", ")"),
    ("(1 if ", " else 2)"),
];

fn nested(levels: &[usize]) -> String {
    let opens: String = levels.iter().map(|&i| WRAPPERS[i].0).collect();
    let closes: String = levels.iter().rev().map(|&i| WRAPPERS[i].1).collect();
    format!("{}z{}", opens, closes)
}

fn arb_levels(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..WRAPPERS.len(), len)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn shallow_nesting_parses(levels in arb_levels(0..MAX_NESTING / 4)) {
        let src = nested(&levels);
        prop_assert!(parse(&src).is_ok(), "{}", src);
    }

    #[test]
    fn deep_nesting_is_a_syntax_error(levels in arb_levels(MAX_NESTING * 2..MAX_NESTING * 10)) {
        let src = nested(&levels);
        let err = parse(&src).unwrap_err();
        prop_assert!(err.message.contains("nesting exceeds"), "{}", err);
    }
}

#[test]
fn test_hundred_thousand_parens() {
    let depth = 100_000;
    let src = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    let err = parse(&src).unwrap_err();
    assert_eq!(err.line, 1);
    assert!(err.message.contains("nesting exceeds"));
}

#[test]
fn test_deeply_nested_dict_and_list_literals() {
    let depth = 10_000;
    let lists = format!("x = {}{}", "[".repeat(depth), "]".repeat(depth));
    assert!(parse(&lists).is_err());
    let dicts = format!("x = {}0{}", "{'a': [".repeat(depth), "]}".repeat(depth));
    assert!(parse(&dicts).is_err());
    let tuples = format!("x = {}0{}", "(1, ".repeat(depth), ")".repeat(depth));
    assert!(parse(&tuples).is_err());
}

#[test]
fn test_nesting_inside_function_bodies() {
    let body = format!("def f():\n    return {}\n", "[".repeat(40) + &"]".repeat(40));
    assert!(parse(&body).is_ok());
    let body = format!("def f():\n    return {}\n", "[".repeat(400) + &"]".repeat(400));
    assert!(parse(&body).is_err());
}
