// pausa-embed - Property-based tests for the engine
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Property-based tests for host interaction.
//!
//! Tests the following properties:
//! - Values passed in by the host are seen unchanged by scripts
//! - Provided values survive a snapshot taken at the suspension point
//! - Host natives observe arguments in call order

use std::cell::RefCell;
use std::rc::Rc;

use pausa_embed::{Engine, RunState, Value};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn script_sum_matches_host_sum(items in prop::collection::vec(-1_000_000i64..1_000_000, 0..50)) {
        let mut engine = Engine::new();
        engine.set("items", items.clone());
        let total = engine.eval("t = 0\nfor x in items:\n    t += x\nt\n").unwrap();
        prop_assert_eq!(total, Value::Int(items.iter().sum()));
    }

    #[test]
    fn provided_values_survive_snapshot(values in prop::collection::vec(-1000i64..1000, 1..6)) {
        let script = format!(
            "acc = []\nfor i in range({}):\n    acc.append(suspend())\nacc\n",
            values.len()
        );
        let mut engine = Engine::new();
        engine.load(&script).unwrap();
        for v in &values {
            prop_assert!(matches!(engine.run_until_suspend().unwrap(), RunState::Suspended));
            let saved = engine.snapshot().unwrap();
            engine = Engine::new();
            engine.restore(&saved).unwrap();
            engine.provide(*v).unwrap();
        }
        match engine.resume().unwrap() {
            RunState::Finished(result) => {
                let got: Vec<i64> = pausa_embed::from_value(&result).unwrap();
                prop_assert_eq!(got, values);
            }
            RunState::Suspended => prop_assert!(false, "unexpected suspension"),
        }
    }

    #[test]
    fn natives_see_calls_in_order(args in prop::collection::vec(0i64..100, 0..20)) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut engine = Engine::new();
        engine.register_native("record", move |_, args| {
            if let Some(Value::Int(n)) = args.first() {
                sink.borrow_mut().push(*n);
            }
            Ok(Value::Nil)
        });
        engine.set("args", args.clone());
        engine.eval("for a in args:\n    record(a)\n").unwrap();
        prop_assert_eq!(&*seen.borrow(), &args);
    }
}
