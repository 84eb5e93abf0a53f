// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Serialized records. Shared objects are stored once in a table and
//! referenced by index.

use serde::{Deserialize, Serialize};

pub(super) type Index = u32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) enum ValueRecord {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Index),
    Map(Index),
    Struct(Index),
    Range { start: i64, stop: i64, step: i64 },
    BoundMethod(Index),
    Closure(Index),
    Native(Index),
    Iterator(Index),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) enum KeyRecord {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Elements are entries of [`Image::keys`]. An entry of that table only
    /// refers to entries before it, so keys decode without recursion.
    Tuple(Vec<Index>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) enum ConstantRecord {
    Int(i64),
    Float(f64),
    Str(String),
    Function(Index),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct FunctionRecord {
    pub name: String,
    pub code: Vec<u32>,
    pub lines: Vec<u32>,
    pub constants: Vec<ConstantRecord>,
    pub names: Vec<String>,
    pub params: Vec<String>,
    pub variadic: bool,
    pub num_defaults: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct EnvRecord {
    pub parent: Option<Index>,
    pub captured: bool,
    /// Bound slots as (symbol, value).
    pub slots: Vec<(u32, ValueRecord)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ListRecord {
    pub items: Vec<ValueRecord>,
    pub tuple: bool,
    pub frozen: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct MapRecord {
    pub entries: Vec<(KeyRecord, ValueRecord)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct StructRecord {
    pub fields: Vec<(String, ValueRecord)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct ClosureRecord {
    pub function: Index,
    pub env: Index,
    pub defaults: Vec<ValueRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct NativeRecord {
    pub name: String,
    pub accepts_kwargs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct BoundMethodRecord {
    pub receiver: ValueRecord,
    pub method: ValueRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) enum IterRecord {
    Values { items: Vec<ValueRecord>, pos: u64 },
    Range { next: i64, stop: i64, step: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct FrameRecord {
    pub function: Index,
    pub ip: u64,
    pub env: Index,
    pub bp: u64,
}

/// Registers and configuration of the machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct MachineRecord {
    pub function: Index,
    pub ip: u64,
    pub bp: u64,
    pub stack: Vec<ValueRecord>,
    pub frames: Vec<FrameRecord>,
    pub env: Index,
    pub globals: Index,
    pub universe: Index,
    /// Every native known to the VM, reachable or not.
    pub natives: Vec<Index>,
    pub output: Vec<String>,
    pub finished: Option<ValueRecord>,
    pub max_call_depth: u64,
    pub env_pool_capacity: u64,
}

/// The complete object graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct Image {
    pub symbols: Vec<String>,
    pub functions: Vec<FunctionRecord>,
    pub keys: Vec<KeyRecord>,
    pub envs: Vec<EnvRecord>,
    pub lists: Vec<ListRecord>,
    pub maps: Vec<MapRecord>,
    pub structs: Vec<StructRecord>,
    pub closures: Vec<Option<ClosureRecord>>,
    pub natives: Vec<NativeRecord>,
    pub bound_methods: Vec<Option<BoundMethodRecord>>,
    pub iterators: Vec<Option<IterRecord>>,
    pub machine: MachineRecord,
}
