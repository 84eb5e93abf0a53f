// pausa-vm - Snapshot and restore tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

mod common;

use std::rc::Rc;

use common::{finish, run_to_suspend, vm_for};
use pausa_vm::snapshot::{self, Registry, SnapshotError};
use pausa_vm::{StepResult, Value, Vm};
use proptest::prelude::*;

/// A program that suspends `SUSPENSIONS` times inside closures, loops,
/// comprehensions and a pending call.
const PROGRAM: &str = r#"
def make_acc(start):
    total = [start]
    def add(x):
        total[0] += x
        suspend()
        return total[0]
    return add

acc = make_acc(10)
log = []
for i in range(3):
    log.append(acc(i))
squares = [suspend() or n * n for n in range(2)]
d = {"k": acc(5)}
print(log, squares, d)
[log, squares, d, acc(0)]
"#;

const SUSPENSIONS: usize = 7;

fn round_trip(vm: &Vm) -> Vm {
    let registry = Registry::standard();
    let bytes = snapshot::save(vm, &registry).expect("save");
    snapshot::load(&bytes, &registry).expect("load")
}

fn uninterrupted() -> (Value, Vec<String>) {
    let mut vm = vm_for(PROGRAM);
    let (value, errors) = finish(&mut vm);
    assert!(errors.is_empty(), "{:?}", errors);
    (value, vm.take_output())
}

#[test]
fn test_program_suspends_expected_number_of_times() {
    let mut vm = vm_for(PROGRAM);
    let mut count = 0;
    loop {
        match vm.step() {
            StepResult::Continue => {}
            StepResult::Suspended(_) => count += 1,
            StepResult::Finished(_) => break,
            StepResult::Failed(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(count, SUSPENSIONS);
}

#[test]
fn test_bindings_visible_immediately_after_restore() {
    let mut vm = vm_for("a = 1\nsuspend()\nb = 2\n");
    run_to_suspend(&mut vm);
    let mut restored = round_trip(&vm);
    assert_eq!(restored.get_global("a"), Some(Value::Int(1)));
    assert_eq!(restored.get_global("b"), None);
    let (value, errors) = finish(&mut restored);
    assert!(errors.is_empty());
    assert_eq!(value, Value::Nil);
    assert_eq!(restored.get_global("a"), Some(Value::Int(1)));
    assert_eq!(restored.get_global("b"), Some(Value::Int(2)));
}

#[test]
fn test_snapshot_of_restored_vm() {
    let mut vm = vm_for(PROGRAM);
    run_to_suspend(&mut vm);
    let mut once = round_trip(&vm);
    run_to_suspend(&mut once);
    let mut twice = round_trip(&once);
    let (value, errors) = finish(&mut twice);
    assert!(errors.is_empty());
    assert_eq!(value.repr(), uninterrupted().0.repr());
}

#[test]
fn test_closure_environments_shared_after_restore() {
    let src = "def pair():\n    n = [0]\n    def inc():\n        n[0] += 1\n        return n[0]\n    def get():\n        return n[0]\n    return inc, get\ninc, get = pair()\ninc()\nsuspend()\ninc()\nget()\n";
    let mut vm = vm_for(src);
    run_to_suspend(&mut vm);
    let mut restored = round_trip(&vm);
    let (value, _) = finish(&mut restored);
    assert_eq!(value, Value::Int(2));
}

#[test]
fn test_iterator_position_preserved() {
    let src = "out = []\nfor x in [1, 2, 3, 4]:\n    if x == 2:\n        suspend()\n    out.append(x)\nout\n";
    let mut vm = vm_for(src);
    run_to_suspend(&mut vm);
    let mut restored = round_trip(&vm);
    let (value, _) = finish(&mut restored);
    assert_eq!(value.repr(), "[1, 2, 3, 4]");
}

#[test]
fn test_truncated_snapshot_is_rejected() {
    let mut vm = vm_for(PROGRAM);
    run_to_suspend(&mut vm);
    let registry = Registry::standard();
    let bytes = snapshot::save(&vm, &registry).unwrap();
    let cut = &bytes[..bytes.len() / 2];
    assert!(matches!(
        snapshot::load(cut, &registry),
        Err(SnapshotError::Decode(_))
    ));
}

#[test]
fn test_unbound_native_after_restore() {
    let mut vm = vm_for("suspend()\nfetch('x')\n");
    vm.define_native("fetch", |_, args| Ok(args.into_iter().next().unwrap_or(Value::Nil)));
    run_to_suspend(&mut vm);
    let mut restored = round_trip(&vm);
    assert_eq!(restored.missing_natives(), vec!["fetch".to_string()]);
    assert!(restored.bind_native("fetch", Rc::new(|_, _| Ok(Value::str("bound")))));
    let (value, errors) = finish(&mut restored);
    assert!(errors.is_empty());
    assert_eq!(value, Value::str("bound"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Snapshotting at any suspension point and resuming in a fresh VM
    /// gives the same result and output as an uninterrupted run.
    #[test]
    fn resume_at_any_suspension_matches(k in 1usize..=SUSPENSIONS) {
        let mut vm = vm_for(PROGRAM);
        for _ in 0..k {
            run_to_suspend(&mut vm);
        }
        let mut restored = round_trip(&vm);
        drop(vm);
        let (value, errors) = finish(&mut restored);
        prop_assert!(errors.is_empty());
        let (expected, output) = uninterrupted();
        prop_assert_eq!(value.repr(), expected.repr());
        prop_assert_eq!(restored.take_output(), output);
    }
}
