// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Snapshot and restore of a complete VM.
//!
//! A snapshot captures the operand stack, call frames, current function and
//! instruction pointer, every reachable environment and the symbol table.
//! Restoring it yields a VM that continues at exactly the next instruction.
//!
//! The byte form is the magic `PSNP`, a little-endian `u32` format version,
//! then a bincode-encoded object graph in which shared objects are stored
//! once and referenced by index. Native functions are stored by name only;
//! on restore they are reattached from the [`Registry`], or left as stubs
//! that fail with `NativeMissing` until rebound with [`Vm::bind_native`].

mod decode;
mod encode;
mod format;
pub mod registry;

use thiserror::Error;
use tracing::{debug, info};

use crate::vm::Vm;

pub use registry::{NativeBinding, Registry, ValueKind};

/// Leading bytes of every snapshot.
pub const MAGIC: [u8; 4] = *b"PSNP";

/// Current snapshot format version.
pub const VERSION: u32 = 2;

/// Deepest chain of nested objects a snapshot may hold.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode snapshot: {0}")]
    Decode(#[source] bincode::Error),

    #[error("value kind {0} is not registered for snapshots")]
    Unregistered(ValueKind),

    #[error("not a pausa snapshot")]
    BadMagic,

    #[error("unsupported snapshot version {0} (expected {VERSION})")]
    Version(u32),

    #[error("corrupt snapshot: {0}")]
    Corrupt(String),

    #[error("object graph nested deeper than {0} levels")]
    TooDeep(usize),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Serialize the full state of `vm`.
pub fn save(vm: &Vm, registry: &Registry) -> Result<Vec<u8>> {
    let image = encode::Encoder::new(registry).encode(vm)?;
    let mut bytes = Vec::with_capacity(1024);
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&VERSION.to_le_bytes());
    bincode::serialize_into(&mut bytes, &image).map_err(SnapshotError::Encode)?;
    debug!(
        bytes = bytes.len(),
        functions = image.functions.len(),
        envs = image.envs.len(),
        depth = vm.call_depth(),
        "snapshot saved"
    );
    Ok(bytes)
}

/// Rebuild a VM from bytes produced by [`save`].
pub fn load(bytes: &[u8], registry: &Registry) -> Result<Vm> {
    if bytes.len() < 8 || bytes[..4] != MAGIC {
        return Err(SnapshotError::BadMagic);
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    let version = u32::from_le_bytes(version);
    if version != VERSION {
        return Err(SnapshotError::Version(version));
    }
    let image: format::Image = bincode::deserialize(&bytes[8..]).map_err(SnapshotError::Decode)?;
    let vm = decode::Decoder::decode(image, registry)?;
    let missing = vm.missing_natives();
    info!(
        bytes = bytes.len(),
        depth = vm.call_depth(),
        missing = missing.len(),
        "snapshot restored"
    );
    if !missing.is_empty() {
        debug!(natives = ?missing, "natives need rebinding");
    }
    Ok(vm)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::compiler::compile;
    use crate::value::Value;
    use crate::vm::{RuntimeError, StepResult};

    fn vm_for(src: &str) -> Vm {
        let module = pausa_syntax::parse(src).expect("parses");
        let mut vm = Vm::new(compile(&module).expect("compiles"));
        vm.install_builtins();
        vm
    }

    fn run_to_suspend(vm: &mut Vm) {
        loop {
            match vm.step() {
                StepResult::Continue => {}
                StepResult::Suspended(_) => return,
                other => panic!("expected suspension, got {:?}", other),
            }
        }
    }

    fn finish(vm: &mut Vm) -> Value {
        loop {
            match vm.step() {
                StepResult::Continue => {}
                StepResult::Finished(v) => return v,
                other => panic!("expected completion, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_header_checks() {
        let registry = Registry::standard();
        assert!(matches!(load(b"nope", &registry), Err(SnapshotError::BadMagic)));
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&99u32.to_le_bytes());
        assert!(matches!(load(&bytes, &registry), Err(SnapshotError::Version(99))));
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.push(0xff);
        assert!(matches!(load(&bytes, &registry), Err(SnapshotError::Decode(_))));
    }

    #[test]
    fn test_resume_after_restore() {
        let mut vm = vm_for("a = 1\nsuspend()\nb = a + 1\nb\n");
        run_to_suspend(&mut vm);
        let registry = Registry::standard();
        let bytes = save(&vm, &registry).unwrap();

        let mut restored = load(&bytes, &registry).unwrap();
        assert_eq!(restored.get_global("a"), Some(Value::Int(1)));
        assert_eq!(restored.get_global("b"), None);
        assert_eq!(finish(&mut restored), Value::Int(2));
        assert_eq!(restored.get_global("b"), Some(Value::Int(2)));
    }

    #[test]
    fn test_sharing_and_cycles_preserved() {
        let mut vm = vm_for("a = [1]\nb = a\na.append(a)\nsuspend()\nb.append(2)\nlen(a)\n");
        run_to_suspend(&mut vm);
        let registry = Registry::standard();
        let mut restored = load(&save(&vm, &registry).unwrap(), &registry).unwrap();
        match (restored.get_global("a"), restored.get_global("b")) {
            (Some(Value::List(a)), Some(Value::List(b))) => {
                assert!(Rc::ptr_eq(&a, &b));
                match &a.items()[1] {
                    Value::List(inner) => assert!(Rc::ptr_eq(inner, &a)),
                    other => panic!("expected list, got {:?}", other),
                }
            }
            other => panic!("expected lists, got {:?}", other),
        }
        assert_eq!(finish(&mut restored), Value::Int(3));
    }

    #[test]
    fn test_suspend_inside_call_and_loop() {
        let src = "def f(n):\n    total = 0\n    for i in range(n):\n        total += i\n        if i == 2:\n            suspend()\n    return total\nf(5)\n";
        let mut vm = vm_for(src);
        run_to_suspend(&mut vm);
        assert_eq!(vm.call_depth(), 1);
        let registry = Registry::standard();
        let mut restored = load(&save(&vm, &registry).unwrap(), &registry).unwrap();
        assert_eq!(restored.call_depth(), 1);
        assert_eq!(finish(&mut restored), Value::Int(10));
    }

    #[test]
    fn test_missing_native_fails_until_rebound() {
        let mut vm = vm_for("x = host(1)\nsuspend()\nhost(2)\n");
        vm.define_native("host", |_, args| Ok(args.into_iter().next().unwrap_or(Value::Nil)));
        run_to_suspend(&mut vm);
        let registry = Registry::standard();
        let bytes = save(&vm, &registry).unwrap();

        let mut restored = load(&bytes, &registry).unwrap();
        assert_eq!(restored.missing_natives(), vec!["host".to_string()]);
        loop {
            match restored.step() {
                StepResult::Continue => {}
                StepResult::Failed(err) => {
                    assert_eq!(err, RuntimeError::NativeMissing("host".into()));
                    break;
                }
                other => panic!("expected failure, got {:?}", other),
            }
        }

        let mut restored = load(&bytes, &registry).unwrap();
        assert!(restored.bind_native("host", Rc::new(|_, _| Ok(Value::Int(7)))));
        assert!(restored.missing_natives().is_empty());
        assert_eq!(finish(&mut restored), Value::Int(7));
    }

    #[test]
    fn test_registry_bindings_reattach() {
        let mut vm = vm_for("suspend()\nhost()\n");
        vm.define_native("host", |_, _| Ok(Value::Int(1)));
        run_to_suspend(&mut vm);
        let mut registry = Registry::standard();
        registry.register_native("host", false, Rc::new(|_, _| Ok(Value::Int(2))));
        let mut restored = load(&save(&vm, &registry).unwrap(), &registry).unwrap();
        assert!(restored.missing_natives().is_empty());
        assert_eq!(finish(&mut restored), Value::Int(2));
    }

    #[test]
    fn test_unregistered_kind_rejected() {
        let mut vm = vm_for("d = {'k': 1}\nsuspend()\n");
        run_to_suspend(&mut vm);
        let mut registry = Registry::new();
        for kind in ValueKind::ALL {
            if kind != ValueKind::Map {
                registry.register_kind(kind);
            }
        }
        assert!(matches!(
            save(&vm, &registry),
            Err(SnapshotError::Unregistered(ValueKind::Map))
        ));
    }

    #[test]
    fn test_suspend_interrupt_is_provided_value() {
        let mut vm = vm_for("x = suspend()\nx * 2\n");
        run_to_suspend(&mut vm);
        let registry = Registry::standard();
        let mut restored = load(&save(&vm, &registry).unwrap(), &registry).unwrap();
        restored.provide(Value::Int(21)).unwrap();
        assert_eq!(finish(&mut restored), Value::Int(42));
    }

    #[test]
    fn test_deeply_nested_graph_rejected() {
        let mut vm = vm_for("x = []\nfor i in range(1000):\n    x = [x]\nsuspend()\n");
        run_to_suspend(&mut vm);
        let registry = Registry::standard();
        assert!(matches!(save(&vm, &registry), Err(SnapshotError::TooDeep(MAX_DEPTH))));

        let mut vm = vm_for("x = []\nfor i in range(50):\n    x = [x]\nsuspend()\nlen(x)\n");
        run_to_suspend(&mut vm);
        let mut restored = load(&save(&vm, &registry).unwrap(), &registry).unwrap();
        assert_eq!(finish(&mut restored), Value::Int(1));
    }

    #[test]
    fn test_tuple_keys_restored() {
        let src = "d = {((1, 2), 'a'): 1, (3,): 2}\nsuspend()\n[d[((1, 2), 'a')], d[(3,)]]\n";
        let mut vm = vm_for(src);
        run_to_suspend(&mut vm);
        let registry = Registry::standard();
        let mut restored = load(&save(&vm, &registry).unwrap(), &registry).unwrap();
        assert_eq!(finish(&mut restored).repr(), "[1, 2]");
    }

    /// An image whose closures each hold the next one as a default.
    fn closure_chain(len: usize) -> Vec<u8> {
        use super::format::*;
        let closures = (0..len)
            .map(|i| {
                Some(ClosureRecord {
                    function: 0,
                    env: 0,
                    defaults: if i + 1 < len {
                        vec![ValueRecord::Closure((i + 1) as Index)]
                    } else {
                        Vec::new()
                    },
                })
            })
            .collect();
        let image = Image {
            symbols: Vec::new(),
            functions: vec![FunctionRecord {
                name: "f".into(),
                code: Vec::new(),
                lines: Vec::new(),
                constants: Vec::new(),
                names: Vec::new(),
                params: Vec::new(),
                variadic: false,
                num_defaults: 0,
            }],
            keys: Vec::new(),
            envs: vec![EnvRecord::default()],
            lists: Vec::new(),
            maps: Vec::new(),
            structs: Vec::new(),
            closures,
            natives: Vec::new(),
            bound_methods: Vec::new(),
            iterators: Vec::new(),
            machine: MachineRecord {
                function: 0,
                ip: 0,
                bp: 0,
                stack: Vec::new(),
                frames: Vec::new(),
                env: 0,
                globals: 0,
                universe: 0,
                natives: Vec::new(),
                output: Vec::new(),
                finished: None,
                max_call_depth: 100,
                env_pool_capacity: 0,
            },
        };
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bincode::serialize_into(&mut bytes, &image).unwrap();
        bytes
    }

    #[test]
    fn test_deep_closure_chain_is_corrupt() {
        let registry = Registry::standard();
        assert!(load(&closure_chain(10), &registry).is_ok());
        assert!(matches!(
            load(&closure_chain(100_000), &registry),
            Err(SnapshotError::Corrupt(_))
        ));
    }

    #[test]
    fn test_forward_key_reference_is_corrupt() {
        use super::format::*;
        let mut bytes = closure_chain(1);
        let mut image: Image = bincode::deserialize(&bytes[8..]).unwrap();
        image.keys = vec![KeyRecord::Tuple(vec![0])];
        bytes.truncate(8);
        bincode::serialize_into(&mut bytes, &image).unwrap();
        assert!(matches!(load(&bytes, &Registry::standard()), Err(SnapshotError::Corrupt(_))));
    }
}
