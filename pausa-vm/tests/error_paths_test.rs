// pausa-vm - Error path and recovery tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

mod common;

use common::{finish, run_value, vm_for};
use pausa_vm::{Outcome, RuntimeError, StepResult, Value};

fn error_of(src: &str) -> RuntimeError {
    match run_value(src) {
        Err(e) => e,
        Ok(v) => panic!("expected an error from {:?}, got {:?}", src, v),
    }
}

#[test]
fn test_undefined_variable() {
    assert_eq!(error_of("x + 1"), RuntimeError::UndefinedVariable("x".into()));
    assert_eq!(
        error_of("def f():\n    nonlocal_missing = 1\n    global g\n    g = 2\nf()\n"),
        RuntimeError::UndefinedVariable("g".into())
    );
}

#[test]
fn test_argument_binding_errors() {
    let def = "def f(a, b=1):\n    return a\n";
    assert_eq!(
        error_of(&format!("{}f(1, 2, 3)\n", def)),
        RuntimeError::TooManyArguments {
            function: "f".into(),
            expected: 2,
            got: 3
        }
    );
    assert_eq!(
        error_of(&format!("{}f(b=2)\n", def)),
        RuntimeError::MissingArgument {
            function: "f".into(),
            name: "a".into()
        }
    );
    assert_eq!(
        error_of(&format!("{}f(1, c=2)\n", def)),
        RuntimeError::UnexpectedKeyword {
            function: "f".into(),
            name: "c".into()
        }
    );
    assert_eq!(
        error_of(&format!("{}f(1, a=2)\n", def)),
        RuntimeError::DuplicateArgument {
            function: "f".into(),
            name: "a".into()
        }
    );
}

#[test]
fn test_keywords_to_plain_native() {
    assert!(matches!(
        error_of("len('x', key=1)"),
        RuntimeError::UnexpectedKeyword { .. }
    ));
}

#[test]
fn test_operand_errors() {
    assert!(matches!(error_of("1 + 'a'"), RuntimeError::UnsupportedOperands { op: "+", .. }));
    assert_eq!(error_of("1 / 0"), RuntimeError::DivisionByZero);
    assert_eq!(error_of("1 % 0"), RuntimeError::DivisionByZero);
    assert_eq!(error_of("1 << -1"), RuntimeError::NegativeShift);
    assert_eq!(error_of("9223372036854775807 + 1"), RuntimeError::IntegerOverflow);
    assert_eq!(error_of("3()"), RuntimeError::NotCallable("int"));
}

#[test]
fn test_container_errors() {
    assert!(matches!(error_of("[1][5]"), RuntimeError::IndexOutOfRange { index: 5, len: 1, .. }));
    assert!(matches!(error_of("{}['k']"), RuntimeError::KeyNotFound(_)));
    assert_eq!(error_of("{[1]: 2}"), RuntimeError::Unhashable("list"));
    assert_eq!(error_of("t = (1, 2)\nt[0] = 3\n"), RuntimeError::Immutable("tuple"));
    assert!(matches!(error_of("(1).nope"), RuntimeError::NoAttribute { type_name: "int", .. }));
}

#[test]
fn test_fail_builtin() {
    assert_eq!(error_of("fail('boom', 2)"), RuntimeError::Native("boom 2".into()));
}

#[test]
fn test_failed_instruction_yields_none_and_continues() {
    let mut vm = vm_for("x = 1 + 'a'\ny = 2\n[x, y]\n");
    let (value, errors) = finish(&mut vm);
    assert_eq!(errors.len(), 1);
    assert_eq!(value.repr(), "[None, 2]");
}

#[test]
fn test_failed_call_discards_arguments() {
    let mut vm = vm_for("r = missing(1, 2)\n[r, 3]\n");
    let (value, errors) = finish(&mut vm);
    assert_eq!(
        errors,
        vec![
            RuntimeError::UndefinedVariable("missing".into()),
            RuntimeError::NotCallable("NoneType")
        ]
    );
    assert_eq!(value.repr(), "[None, 3]");
}

#[test]
fn test_stack_balanced_after_errors_in_function() {
    let src = "def f():\n    a = [1][9]\n    b = {}['k']\n    return [a, b]\nf()\n";
    let mut vm = vm_for(src);
    let (value, errors) = finish(&mut vm);
    assert_eq!(errors.len(), 2);
    assert_eq!(value.repr(), "[None, None]");
    assert_eq!(vm.stack_len(), 0);
    assert_eq!(vm.call_depth(), 0);
}

#[test]
fn test_call_depth_limit() {
    let mut vm = vm_for("def f(n):\n    return 1 + f(n + 1)\nf(0)\n");
    vm.set_max_call_depth(50);
    loop {
        match vm.step() {
            StepResult::Continue => {}
            StepResult::Failed(e) => {
                assert_eq!(e, RuntimeError::CallDepthExceeded(50));
                assert_eq!(vm.call_depth(), 50);
                break;
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}

#[test]
fn test_run_stops_when_driver_declines() {
    let mut vm = vm_for("x = 1 + None\nx\n");
    let mut seen = Vec::new();
    let outcome = vm.run(|_, err| {
        seen.extend(err.cloned());
        false
    });
    assert!(matches!(outcome, Outcome::Stopped));
    assert_eq!(seen.len(), 1);
    assert!(!vm.is_finished());
}

#[test]
fn test_run_continues_past_suspension() {
    let mut vm = vm_for("a = suspend()\nb = suspend()\n[a, b]\n");
    let mut count = 0;
    let outcome = vm.run(|interrupt, _| {
        assert!(interrupt.is_some());
        count += 1;
        true
    });
    assert_eq!(count, 2);
    match outcome {
        Outcome::Finished(v) => assert_eq!(v.repr(), "[None, None]"),
        Outcome::Stopped => panic!("expected completion"),
    }
}

#[test]
fn test_provide_replaces_suspended_result() {
    let mut vm = vm_for("a = suspend()\na + 1\n");
    assert!(matches!(vm.step(), StepResult::Continue));
    assert!(matches!(vm.step(), StepResult::Suspended(_)));
    vm.provide(Value::Int(41)).unwrap();
    let (value, errors) = finish(&mut vm);
    assert!(errors.is_empty());
    assert_eq!(value, Value::Int(42));
}

#[test]
fn test_finished_vm_stays_finished() {
    let mut vm = vm_for("7");
    let (value, _) = finish(&mut vm);
    assert_eq!(value, Value::Int(7));
    assert!(matches!(vm.step(), StepResult::Finished(Value::Int(7))));
    assert_eq!(vm.result(), Some(&Value::Int(7)));
}

#[test]
fn test_errors_report_line() {
    let mut vm = vm_for("x = 1\ny = 2\nz = x + 'q'\n");
    loop {
        if let StepResult::Failed(_) = vm.step() {
            break;
        }
    }
    assert_eq!(vm.current_line(), 3);
}

#[test]
fn test_cyclic_containers_fail_recoverably() {
    let setup = "a = []\nb = []\na.append(a)\nb.append(b)\n";
    let limit = RuntimeError::RecursionLimit("comparison");
    assert_eq!(error_of(&format!("{}a == b\n", setup)), limit);
    assert_eq!(error_of(&format!("{}a < b\n", setup)), limit);
    assert_eq!(error_of(&format!("{}b in a\n", setup)), limit);
    assert_eq!(error_of(&format!("{}a.index(b)\n", setup)), limit);
    assert_eq!(
        limit.to_string(),
        "maximum recursion depth exceeded in comparison"
    );

    let mut vm = vm_for(&format!("{}same = a == a\nr = a == b\n[same, r, len(a)]\n", setup));
    let (value, errors) = finish(&mut vm);
    assert_eq!(errors, vec![limit]);
    assert_eq!(value.repr(), "[True, None, 1]");
    assert_eq!(vm.stack_len(), 0);
}

#[test]
fn test_nan_ordering_is_false() {
    let src = "nan = float('nan')\n[nan < 1, nan >= 1, 2 > nan, nan == nan, nan != nan]\n";
    assert_eq!(run_value(src).unwrap().repr(), "[False, False, False, False, True]");
    assert_eq!(run_value("min(float('nan'), 2) != 5").unwrap(), Value::Bool(true));
    assert_eq!(run_value("max(1, float('nan'), 3)").unwrap(), Value::Int(3));
    assert_eq!(run_value("sorted([3, 1, 2])").unwrap().repr(), "[1, 2, 3]");
    assert!(matches!(error_of("1 < 'a'"), RuntimeError::UnsupportedOperands { op: "<", .. }));
    assert!(matches!(error_of("min(1, 'a')"), RuntimeError::UnsupportedOperands { .. }));
}

