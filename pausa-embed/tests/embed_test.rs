// pausa-embed integration tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Tests for the pausa-embed embedding API.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use pausa_embed::{Engine, Error, FromValue, Interrupt, NativeError, RunState, RuntimeError, Value};

fn finished(state: RunState) -> Value {
    match state {
        RunState::Finished(v) => v,
        RunState::Suspended => panic!("expected the script to finish"),
    }
}

// =============================================================================
// Evaluation
// =============================================================================

mod eval {
    use super::*;

    #[test]
    fn returns_last_expression() {
        let mut engine = Engine::new();
        let result = engine.eval("x = 4\nx * 10 + 2\n").unwrap();
        assert_eq!(i64::from_value(&result).unwrap(), 42);
    }

    #[test]
    fn module_without_expression_is_none() {
        let mut engine = Engine::new();
        let result = engine.eval("x = 1\n").unwrap();
        assert_eq!(result, Value::Nil);
    }

    #[test]
    fn globals_survive_between_evals() {
        let mut engine = Engine::new();
        engine.eval("def inc(n):\n    return n + 1\n").unwrap();
        let result = engine.eval("inc(41)").unwrap();
        assert_eq!(result.to_string(), "42");
    }

    #[test]
    fn syntax_error_is_reported() {
        let mut engine = Engine::new();
        assert!(matches!(engine.eval("x = (1"), Err(Error::Syntax(_))));
    }

    #[test]
    fn compile_error_is_reported() {
        let mut engine = Engine::new();
        assert!(matches!(engine.eval("f() = 1"), Err(Error::Compile(_))));
    }

    #[test]
    fn runtime_error_is_reported() {
        let mut engine = Engine::new();
        let err = engine.eval("1 // 0").unwrap_err();
        assert!(matches!(err, Error::Runtime(RuntimeError::DivisionByZero)));
    }

    #[test]
    fn suspension_during_eval_is_an_error() {
        let mut engine = Engine::new();
        assert!(matches!(engine.eval("suspend()"), Err(Error::Suspended)));
    }

    #[test]
    fn print_output_is_captured() {
        let mut engine = Engine::new();
        engine.eval("print('a', 1)\nprint('b')\n").unwrap();
        assert_eq!(engine.take_output(), vec!["a 1", "b"]);
        assert!(engine.take_output().is_empty());
    }

    #[test]
    fn eval_file_reports_missing_path() {
        let mut engine = Engine::new();
        let err = engine.eval_file("/nonexistent/script.pa").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}

// =============================================================================
// Engine::new_bare() behaviour
// =============================================================================

mod new_bare {
    use super::*;

    #[test]
    fn has_no_builtins() {
        let mut engine = Engine::new_bare();
        let err = engine.eval("len([1])").unwrap_err();
        assert!(matches!(
            err,
            Error::Runtime(RuntimeError::UndefinedVariable(name)) if name == "len"
        ));
    }

    #[test]
    fn methods_still_work() {
        let mut engine = Engine::new_bare();
        let result = engine.eval("xs = [3]\nxs.append(4)\nxs").unwrap();
        assert_eq!(Vec::<i64>::from_value(&result).unwrap(), vec![3, 4]);
    }
}

// =============================================================================
// Globals and conversions
// =============================================================================

mod globals {
    use super::*;

    #[test]
    fn set_and_get_as() {
        let mut engine = Engine::new();
        engine.set("name", "pausa");
        engine.set("items", vec![1i64, 2, 3]);
        engine.eval("total = len(name) + len(items)").unwrap();
        assert_eq!(engine.get_as::<i64>("total"), Some(8));
        assert_eq!(engine.get_as::<String>("name").as_deref(), Some("pausa"));
    }

    #[test]
    fn get_unbound_is_none() {
        let engine = Engine::new();
        assert!(engine.get("nope").is_none());
        assert!(engine.try_get_as::<i64>("nope").unwrap().is_none());
    }

    #[test]
    fn try_get_as_reports_mismatch() {
        let mut engine = Engine::new();
        engine.set("s", "text");
        assert!(matches!(
            engine.try_get_as::<i64>("s"),
            Err(Error::Conversion { .. })
        ));
        assert_eq!(engine.get_as::<i64>("s"), None);
    }

    #[test]
    fn dict_round_trips_through_script() {
        let mut engine = Engine::new();
        let mut scores = HashMap::new();
        scores.insert("a".to_string(), 1i64);
        scores.insert("b".to_string(), 2i64);
        engine.set("scores", scores);
        engine.eval("scores['c'] = scores['a'] + scores['b']").unwrap();
        let back: HashMap<String, i64> = engine.get_as("scores").unwrap();
        assert_eq!(back.get("c"), Some(&3));
        assert_eq!(back.len(), 3);
    }

    #[test]
    fn option_maps_to_none() {
        let mut engine = Engine::new();
        engine.set("maybe", None::<i64>);
        assert_eq!(engine.get_as::<Option<i64>>("maybe"), Some(None));
        assert!(engine.eval("maybe == None").unwrap().is_truthy());
    }
}

// =============================================================================
// Native functions
// =============================================================================

mod natives {
    use super::*;

    #[test]
    fn positional_native() {
        let mut engine = Engine::new();
        engine.register_native("double", |_, args| match args.first() {
            Some(Value::Int(n)) => Ok(Value::Int(n * 2)),
            _ => Err(RuntimeError::Type("double expects an int".into()).into()),
        });
        assert_eq!(engine.eval("double(21)").unwrap(), Value::Int(42));
        assert!(engine.eval("double('x')").is_err());
    }

    #[test]
    fn keyword_native_receives_trailing_dict() {
        let mut engine = Engine::new();
        engine.register_native_kw("count", |_, args| Ok(Value::Int(args.len() as i64)));
        assert_eq!(engine.eval("count(1, 2)").unwrap(), Value::Int(2));
        assert_eq!(engine.eval("count(1, k=2)").unwrap(), Value::Int(2));
    }

    #[test]
    fn plain_native_rejects_keywords() {
        let mut engine = Engine::new();
        engine.register_native("noop", |_, _| Ok(Value::Nil));
        assert!(matches!(engine.eval("noop(k=1)"), Err(Error::Runtime(_))));
    }

    #[test]
    fn native_can_hold_host_state() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut engine = Engine::new();
        engine.register_native("tick", move |_, _| {
            counter.set(counter.get() + 1);
            Ok(Value::Nil)
        });
        engine.eval("for i in range(5):\n    tick()\n").unwrap();
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn native_can_suspend() {
        let mut engine = Engine::new();
        engine.register_native("ask", |_, _| Err(NativeError::Interrupt(Interrupt)));
        engine.load("a = ask()\nb = ask()\na + b\n").unwrap();
        assert!(matches!(engine.run_until_suspend().unwrap(), RunState::Suspended));
        engine.provide(40).unwrap();
        assert!(matches!(engine.resume().unwrap(), RunState::Suspended));
        engine.provide(2).unwrap();
        assert_eq!(finished(engine.resume().unwrap()), Value::Int(42));
    }
}

// =============================================================================
// Suspend, snapshot and restore
// =============================================================================

mod snapshots {
    use super::*;

    const SCRIPT: &str = "\
total = 0
def step(n):
    got = suspend()
    return n * got
for i in range(3):
    total += step(i)
total
";

    #[test]
    fn unprovided_suspension_yields_none() {
        let mut engine = Engine::new();
        engine.load("x = suspend()\nx == None\n").unwrap();
        assert!(matches!(engine.run_until_suspend().unwrap(), RunState::Suspended));
        assert_eq!(finished(engine.resume().unwrap()), Value::Bool(true));
    }

    #[test]
    fn provide_without_suspension_fails() {
        let mut engine = Engine::new();
        engine.eval("1").unwrap();
        assert!(engine.provide(1).is_err());
    }

    #[test]
    fn restore_in_fresh_engine_at_each_suspension() {
        let mut engine = Engine::new();
        engine.load(SCRIPT).unwrap();
        for _ in 0..3 {
            assert!(matches!(engine.run_until_suspend().unwrap(), RunState::Suspended));
            let saved = engine.snapshot().unwrap();
            engine = Engine::new();
            engine.restore(&saved).unwrap();
            engine.provide(10).unwrap();
        }
        // 0*10 + 1*10 + 2*10
        assert_eq!(finished(engine.resume().unwrap()), Value::Int(30));
        assert!(engine.is_finished());
    }

    #[test]
    fn registered_natives_are_reattached() {
        let mut engine = Engine::new();
        engine.register_native("host_add", |_, args| match (&args[0], &args[1]) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            _ => Ok(Value::Nil),
        });
        engine.load("x = suspend()\nhost_add(x, 2)\n").unwrap();
        engine.run_until_suspend().unwrap();
        let saved = engine.snapshot().unwrap();

        // Same engine keeps its registry.
        engine.restore(&saved).unwrap();
        assert!(engine.missing_natives().is_empty());
        engine.provide(40).unwrap();
        assert_eq!(finished(engine.resume().unwrap()), Value::Int(42));
    }

    #[test]
    fn unknown_natives_restore_as_missing() {
        let mut engine = Engine::new();
        engine.register_native("host_id", |_, mut args| Ok(args.pop().unwrap_or(Value::Nil)));
        engine.load("suspend()\nhost_id(7)\n").unwrap();
        engine.run_until_suspend().unwrap();
        let saved = engine.snapshot().unwrap();

        let mut other = Engine::new();
        other.restore(&saved).unwrap();
        assert_eq!(other.missing_natives(), vec!["host_id".to_string()]);
        let err = other.resume().unwrap_err();
        assert!(matches!(err, Error::Runtime(RuntimeError::NativeMissing(_))));

        other.register_native("host_id", |_, mut args| Ok(args.pop().unwrap_or(Value::Nil)));
        assert!(other.missing_natives().is_empty());
    }

    #[test]
    fn corrupt_snapshot_is_rejected() {
        let mut engine = Engine::new();
        assert!(matches!(
            engine.restore(b"not a snapshot"),
            Err(Error::Snapshot(_))
        ));
    }
}

// =============================================================================
// Limits
// =============================================================================

mod limits {
    use super::*;

    #[test]
    fn max_depth_is_enforced() {
        let mut engine = Engine::new();
        let previous = engine.set_max_depth(20);
        assert!(previous > 20);
        let err = engine
            .eval("def down(n):\n    return 1 + down(n - 1)\ndown(100)\n")
            .unwrap_err();
        assert!(matches!(err, Error::Runtime(RuntimeError::CallDepthExceeded(_))));
    }

    #[test]
    fn tail_calls_do_not_count_against_depth() {
        let mut engine = Engine::new();
        engine.set_max_depth(20);
        let result = engine
            .eval("def loop(n, acc):\n    if n == 0:\n        return acc\n    return loop(n - 1, acc + 1)\nloop(1000, 0)\n")
            .unwrap();
        assert_eq!(result, Value::Int(1000));
    }
}
