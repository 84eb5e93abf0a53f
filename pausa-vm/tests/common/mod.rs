// pausa-vm - Shared helpers for integration tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

#![allow(dead_code)]

use std::rc::Rc;

use pausa_vm::{compile, Function, RuntimeError, StepResult, Value, Vm};

pub fn compile_src(src: &str) -> Rc<Function> {
    let module = pausa_syntax::parse(src).expect("parse error");
    compile(&module).expect("compile error")
}

/// A VM with builtins, positioned at the start of `src`.
pub fn vm_for(src: &str) -> Vm {
    let mut vm = Vm::new(compile_src(src));
    vm.install_builtins();
    vm
}

/// Run to completion, stopping at the first error or suspension.
pub fn run_value(src: &str) -> Result<Value, RuntimeError> {
    let mut vm = vm_for(src);
    loop {
        match vm.step() {
            StepResult::Continue => {}
            StepResult::Finished(v) => return Ok(v),
            StepResult::Failed(e) => return Err(e),
            StepResult::Suspended(_) => panic!("unexpected suspension"),
        }
    }
}

/// The `repr` of the result, or `Error: ...`.
pub fn run(src: &str) -> String {
    match run_value(src) {
        Ok(v) => v.repr(),
        Err(e) => format!("Error: {}", e),
    }
}

/// Step until the VM suspends.
pub fn run_to_suspend(vm: &mut Vm) {
    loop {
        match vm.step() {
            StepResult::Continue => {}
            StepResult::Suspended(_) => return,
            other => panic!("expected suspension, got {:?}", other),
        }
    }
}

/// Step to completion, continuing past suspensions. Errors are collected.
pub fn finish(vm: &mut Vm) -> (Value, Vec<RuntimeError>) {
    let mut errors = Vec::new();
    loop {
        match vm.step() {
            StepResult::Continue | StepResult::Suspended(_) => {}
            StepResult::Failed(e) => errors.push(e),
            StepResult::Finished(v) => return (v, errors),
        }
    }
}
