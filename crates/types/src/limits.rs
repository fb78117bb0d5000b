//! Structural limits lifted verbatim from BEAM's `core/bvm.h` `Limits` struct. These are
//! consensus-critical: two implementations with different values will diverge.

/// Maximum depth of the far-call stack before a call is rejected with `FarCallTooDeep`.
pub const FAR_CALL_DEPTH: usize = 32;

/// Maximum length, in bytes, of a variable subkey as presented to `LoadVar`/`SaveVar`
/// (before the `ContractId || tag` prefix is applied).
pub const VAR_KEY_SIZE: usize = 256;

/// Maximum length, in bytes, of a variable's value.
pub const VAR_SIZE: usize = 0x2000;

/// Operand-stack byte budget per far-call frame.
pub const STACK_SIZE: usize = 0xc000;

/// Linear-memory (data + heap) budget per far-call frame.
pub const DATA_SIZE: usize = 0x4000;

/// Bundles the structural limits above into a single value so callers can override them
/// (e.g. a cheap `Limits` for tests) without touching global constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub far_call_depth: usize,
    pub var_key_size: usize,
    pub var_size: usize,
    pub stack_size: usize,
    pub data_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            far_call_depth: FAR_CALL_DEPTH,
            var_key_size: VAR_KEY_SIZE,
            var_size: VAR_SIZE,
            stack_size: STACK_SIZE,
            data_size: DATA_SIZE,
        }
    }
}
