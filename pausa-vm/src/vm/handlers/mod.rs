// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Opcode handlers, organised by category.

pub mod arithmetic;
pub mod attributes;
pub mod collections;
pub mod comparison;
pub mod control;
pub mod iteration;
pub mod variables;
