// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode instruction definitions and the packed instruction encoding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bytecode instructions for the pausa VM.
///
/// Instructions operate on a value stack. The operand carried by [`Instr`] is
/// either an index (into the constant pool or the function's name table), a
/// count, a stack distance, or a jump offset relative to the next instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants & Stack
    // =========================================================================
    /// Push constants[n].
    Const,
    /// Push nil.
    Nil,
    /// Push true.
    True,
    /// Push false.
    False,
    /// Pop top value.
    Pop,
    /// [a] -> [a, a]
    Dup,
    /// [a, b] -> [a, b, a, b]
    Dup2,
    /// [a, b] -> [b, a]
    Swap,
    /// [a, b, c] -> [c, a, b]
    Rot3,

    // =========================================================================
    // Variables (operand indexes the function's name table)
    // =========================================================================
    /// Push the value bound to names[n], searching the env chain.
    LoadVar,
    /// Pop and bind names[n] in the current env.
    DefVar,
    /// Pop and assign names[n] in the nearest env that defines it.
    SetVar,

    // =========================================================================
    // Control Flow
    // =========================================================================
    /// Unconditional relative jump.
    Jump,
    /// Pop; jump if falsy.
    JumpIfFalse,
    /// Jump if top is falsy (keeping it), otherwise pop it. Used by `and`.
    JumpIfFalseOrPop,
    /// Jump if top is truthy (keeping it), otherwise pop it. Used by `or`.
    JumpIfTrueOrPop,

    // =========================================================================
    // Functions
    // =========================================================================
    /// Create a closure over the current env from the function in constants[n].
    /// Pops that function's default values (pushed in parameter order).
    MakeClosure,
    /// Call with n positional arguments: [callee, a0 .. an-1] -> [result].
    Call,
    /// Call with collected arguments: [callee, positional list, kwargs map] -> [result].
    CallKw,
    /// Return top of stack to the caller.
    Return,

    // =========================================================================
    // Containers
    // =========================================================================
    /// Pop n values into a new list.
    MakeList,
    /// Pop n values into a new tuple.
    MakeTuple,
    /// Pop n key/value pairs into a new dict.
    MakeMap,
    /// Pop a value and append it to the list at distance n.
    ListAppend,
    /// Pop an iterable and append its items to the list at distance n.
    ListExtend,
    /// Pop value and key; insert them into the dict at distance n.
    MapInsert,
    /// Pop a dict and merge it into the dict at distance n.
    MapUpdate,
    /// [obj, key] -> [obj[key]]
    GetIndex,
    /// [value, obj, key] -> []
    SetIndex,
    /// [obj, lo, hi, step] -> [obj[lo:hi:step]] (nil for an omitted bound)
    GetSlice,
    /// [value, obj, lo, hi, step] -> []
    SetSlice,
    /// [obj] -> [obj.name] where name is constants[n].
    GetAttr,
    /// [value, obj] -> [] assigning obj.name where name is constants[n].
    SetAttr,
    /// Pop a sequence of exactly n items; push them so item 0 is on top.
    Unpack,

    // =========================================================================
    // Arithmetic & Bitwise
    // =========================================================================
    Add,
    Sub,
    Mul,
    /// True division; always produces a float.
    Div,
    FloorDiv,
    Mod,
    Pow,
    Neg,
    Pos,
    Not,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Shl,
    Shr,

    // =========================================================================
    // Comparison
    // =========================================================================
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,

    // =========================================================================
    // Iteration
    // =========================================================================
    /// Replace the top value with an iterator over it.
    GetIter,
    /// Push the iterator's next item, or pop the iterator and jump when exhausted.
    IterNext,
}

impl OpCode {
    /// Every opcode in discriminant order.
    pub const ALL: [OpCode; 60] = [
        OpCode::Const,
        OpCode::Nil,
        OpCode::True,
        OpCode::False,
        OpCode::Pop,
        OpCode::Dup,
        OpCode::Dup2,
        OpCode::Swap,
        OpCode::Rot3,
        OpCode::LoadVar,
        OpCode::DefVar,
        OpCode::SetVar,
        OpCode::Jump,
        OpCode::JumpIfFalse,
        OpCode::JumpIfFalseOrPop,
        OpCode::JumpIfTrueOrPop,
        OpCode::MakeClosure,
        OpCode::Call,
        OpCode::CallKw,
        OpCode::Return,
        OpCode::MakeList,
        OpCode::MakeTuple,
        OpCode::MakeMap,
        OpCode::ListAppend,
        OpCode::ListExtend,
        OpCode::MapInsert,
        OpCode::MapUpdate,
        OpCode::GetIndex,
        OpCode::SetIndex,
        OpCode::GetSlice,
        OpCode::SetSlice,
        OpCode::GetAttr,
        OpCode::SetAttr,
        OpCode::Unpack,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::FloorDiv,
        OpCode::Mod,
        OpCode::Pow,
        OpCode::Neg,
        OpCode::Pos,
        OpCode::Not,
        OpCode::BitAnd,
        OpCode::BitOr,
        OpCode::BitXor,
        OpCode::BitNot,
        OpCode::Shl,
        OpCode::Shr,
        OpCode::Eq,
        OpCode::Ne,
        OpCode::Lt,
        OpCode::Le,
        OpCode::Gt,
        OpCode::Ge,
        OpCode::In,
        OpCode::NotIn,
        OpCode::GetIter,
        OpCode::IterNext,
    ];

    /// Decode an opcode tag.
    pub fn from_u8(tag: u8) -> Option<OpCode> {
        OpCode::ALL.get(tag as usize).copied()
    }

    /// Returns true if this instruction transfers control (jump, call, return).
    #[inline]
    pub fn is_control_flow(self) -> bool {
        matches!(
            self,
            OpCode::Jump
                | OpCode::JumpIfFalse
                | OpCode::JumpIfFalseOrPop
                | OpCode::JumpIfTrueOrPop
                | OpCode::Call
                | OpCode::CallKw
                | OpCode::Return
                | OpCode::IterNext
        )
    }

    /// Returns true if the operand is a relative jump offset.
    #[inline]
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            OpCode::Jump
                | OpCode::JumpIfFalse
                | OpCode::JumpIfFalseOrPop
                | OpCode::JumpIfTrueOrPop
                | OpCode::IterNext
        )
    }

    /// Stack effect as `(pops, pushes)` for an instruction with operand `arg`.
    ///
    /// Returns None for instructions whose effect is not determined by the
    /// operand alone (closure creation, return, conditional pops) or which
    /// never fail.
    pub fn stack_effect(self, arg: i32) -> Option<(usize, usize)> {
        let n = arg.max(0) as usize;
        Some(match self {
            OpCode::Const | OpCode::Nil | OpCode::True | OpCode::False | OpCode::LoadVar => (0, 1),
            OpCode::Pop | OpCode::DefVar | OpCode::SetVar | OpCode::JumpIfFalse => (1, 0),
            OpCode::Dup => (1, 2),
            OpCode::Dup2 => (2, 4),
            OpCode::Swap => (2, 2),
            OpCode::Rot3 => (3, 3),
            OpCode::Jump => (0, 0),

            OpCode::Call => (n + 1, 1),
            OpCode::CallKw => (3, 1),

            OpCode::MakeList | OpCode::MakeTuple => (n, 1),
            OpCode::MakeMap => (2 * n, 1),
            OpCode::ListAppend | OpCode::ListExtend | OpCode::MapUpdate => (1, 0),
            OpCode::MapInsert => (2, 0),
            OpCode::GetIndex => (2, 1),
            OpCode::SetIndex => (3, 0),
            OpCode::GetSlice => (4, 1),
            OpCode::SetSlice => (5, 0),
            OpCode::GetAttr => (1, 1),
            OpCode::SetAttr => (2, 0),
            OpCode::Unpack => (1, n),

            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::FloorDiv
            | OpCode::Mod
            | OpCode::Pow
            | OpCode::BitAnd
            | OpCode::BitOr
            | OpCode::BitXor
            | OpCode::Shl
            | OpCode::Shr
            | OpCode::Eq
            | OpCode::Ne
            | OpCode::Lt
            | OpCode::Le
            | OpCode::Gt
            | OpCode::Ge
            | OpCode::In
            | OpCode::NotIn => (2, 1),

            OpCode::Neg | OpCode::Pos | OpCode::Not | OpCode::BitNot | OpCode::GetIter => (1, 1),

            OpCode::JumpIfFalseOrPop
            | OpCode::JumpIfTrueOrPop
            | OpCode::MakeClosure
            | OpCode::Return
            | OpCode::IterNext => return None,
        })
    }
}

/// A packed instruction: the low 8 bits hold the [`OpCode`], the upper 24
/// bits a signed operand.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Instr(u32);

impl Instr {
    /// Largest operand that fits in 24 signed bits.
    pub const MAX_ARG: i32 = (1 << 23) - 1;
    /// Smallest operand that fits in 24 signed bits.
    pub const MIN_ARG: i32 = -(1 << 23);

    /// Pack an opcode and operand. Returns None if the operand is out of range.
    pub fn new(op: OpCode, arg: i32) -> Option<Instr> {
        if !(Self::MIN_ARG..=Self::MAX_ARG).contains(&arg) {
            return None;
        }
        Some(Instr(((arg as u32) << 8) | op as u32))
    }

    /// An instruction whose operand is unused.
    pub fn op_only(op: OpCode) -> Instr {
        Instr(op as u32)
    }

    /// Decode a raw instruction word, validating the opcode tag.
    pub fn from_raw(raw: u32) -> Option<Instr> {
        OpCode::from_u8((raw & 0xff) as u8).map(|_| Instr(raw))
    }

    /// The raw instruction word.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// The opcode. Instructions are only built from valid tags, so decoding
    /// cannot fail; `Nil` is returned defensively for a corrupt word.
    #[inline]
    pub fn op(self) -> OpCode {
        OpCode::from_u8((self.0 & 0xff) as u8).unwrap_or(OpCode::Nil)
    }

    /// The operand, sign-extended.
    #[inline]
    pub fn arg(self) -> i32 {
        (self.0 as i32) >> 8
    }

    /// The operand as an unsigned index.
    #[inline]
    pub fn index(self) -> usize {
        self.arg().max(0) as usize
    }

    /// Same opcode with a different operand.
    pub fn with_arg(self, arg: i32) -> Option<Instr> {
        Instr::new(self.op(), arg)
    }
}

impl TryFrom<u32> for Instr {
    type Error = String;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Instr::from_raw(raw).ok_or_else(|| format!("invalid opcode tag {:#x}", raw & 0xff))
    }
}

impl From<Instr> for u32 {
    fn from(instr: Instr) -> u32 {
        instr.0
    }
}

impl fmt::Debug for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.op(), self.arg())
    }
}
