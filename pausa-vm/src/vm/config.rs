// pausa-vm - Bytecode compiler and resumable virtual machine for pausa
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! VM configuration.

/// Tunables for a [`Vm`](super::Vm).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum number of non-tail call frames before `CallDepthExceeded`.
    pub max_call_depth: usize,
    /// Maximum number of discarded environments kept for reuse.
    pub env_pool_capacity: usize,
}

impl VmConfig {
    pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;
    pub const DEFAULT_ENV_POOL_CAPACITY: usize = 64;
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_call_depth: Self::DEFAULT_MAX_CALL_DEPTH,
            env_pool_capacity: Self::DEFAULT_ENV_POOL_CAPACITY,
        }
    }
}
