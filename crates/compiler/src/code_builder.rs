//! Emits one function body's worth of `vm` bytecode and tracks the two kinds of
//! forward references a function can contain: branches to a label declared later
//! in the *same* body, and calls to a function the module assembler hasn't placed
//! yet. Both are resolved once every body's final length (and therefore its base
//! offset in the shared code section) is known, by `module::assemble_code`.

use crate::opcode;

/// A byte position inside this function's own buffer (not yet rebased) holding a
/// `u32` target that must be patched once this function's base offset in the
/// assembled code section is known. The value already stored there is the
/// function-local target; assembly adds the base to it.
pub struct BranchFixup {
    pub at: usize,
}

/// A byte position holding a `u32` target for `Call`, to be patched to the
/// callee's absolute base offset once every function has been sized.
pub struct CallFixup {
    pub at: usize,
    pub callee_function_index: u32,
}

#[derive(Default)]
pub struct CodeBuilder {
    bytes: Vec<u8>,
    pub branch_fixups: Vec<BranchFixup>,
    pub call_fixups: Vec<CallFixup>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn into_bytes(self) -> (Vec<u8>, Vec<BranchFixup>, Vec<CallFixup>) {
        (self.bytes, self.branch_fixups, self.call_fixups)
    }

    fn push_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    /// Emits a branch opcode with a target that is already known (a backward
    /// branch, or a loop head revisited after the fact).
    pub fn emit_branch_known(&mut self, opcode: u8, target: u32) {
        self.bytes.push(opcode);
        self.push_u32(target);
    }

    /// Emits a branch opcode whose target isn't known yet (a forward branch to a
    /// block/if `end`) and returns the byte position of the placeholder so the
    /// caller can patch it in with [`Self::patch_u32`] once the target is known.
    pub fn emit_branch_placeholder(&mut self, opcode: u8) -> usize {
        self.bytes.push(opcode);
        let at = self.bytes.len();
        self.push_u32(0);
        self.branch_fixups.push(BranchFixup { at });
        at
    }

    pub fn patch_u32(&mut self, at: usize, value: u32) {
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn emit_i32_const(&mut self, v: i32) {
        self.bytes.push(opcode::I32_CONST);
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn emit_simple(&mut self, opcode: u8) {
        self.bytes.push(opcode);
    }

    pub fn emit_index_op(&mut self, opcode: u8, index: u32) {
        self.bytes.push(opcode);
        self.push_u32(index);
    }

    pub fn emit_local_call(&mut self, callee_function_index: u32, arity: u32, locals: u32) {
        self.bytes.push(opcode::CALL);
        let at = self.bytes.len();
        self.push_u32(0); // patched once the callee's base offset is known
        self.push_u32(arity);
        self.push_u32(locals);
        self.call_fixups.push(CallFixup { at, callee_function_index });
    }

    pub fn emit_call_host(&mut self, binding_id: u32, arity: u32, has_ret: bool) {
        self.bytes.push(opcode::CALL_HOST);
        self.push_u32(binding_id);
        self.push_u32(arity);
        self.bytes.push(has_ret as u8);
    }
}
