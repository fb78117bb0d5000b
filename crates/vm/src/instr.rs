//! The flat instruction set the code section is built from. Structured WASM control
//! flow (`block`/`loop`/`if`) is relooped by the compiler into absolute jumps before
//! it ever reaches this enum — the interpreter only ever deals with a flat program
//! counter.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    I32Const(i32),

    I32Add,
    I32Sub,
    I32Mul,
    I32DivU,
    I32DivS,
    I32RemU,
    I32RemS,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrU,
    I32ShrS,

    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtU,
    I32LtS,
    I32GtU,
    I32GtS,
    I32LeU,
    I32LeS,
    I32GeU,
    I32GeS,

    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),

    I32Load(u32),
    I32Store(u32),

    Drop,

    Jump(u32),
    JumpIfZero(u32),
    JumpIfNonZero(u32),

    /// Calls another method within the same far-call frame. `locals` is the number of
    /// local slots the callee expects beyond the arguments already on the stack.
    Call { target: u32, arity: u32, locals: u32 },
    Return,

    /// Dispatches to a host-provided function by its ABI binding id, consuming
    /// `arity` i32 operands and pushing `has_ret` results (0 or 1).
    CallHost { binding_id: u32, arity: u32, has_ret: bool },

    Unreachable,
}

mod opcode {
    pub const I32_CONST: u8 = 0x00;
    pub const I32_ADD: u8 = 0x01;
    pub const I32_SUB: u8 = 0x02;
    pub const I32_MUL: u8 = 0x03;
    pub const I32_DIV_U: u8 = 0x04;
    pub const I32_DIV_S: u8 = 0x05;
    pub const I32_REM_U: u8 = 0x06;
    pub const I32_REM_S: u8 = 0x07;
    pub const I32_AND: u8 = 0x08;
    pub const I32_OR: u8 = 0x09;
    pub const I32_XOR: u8 = 0x0a;
    pub const I32_SHL: u8 = 0x0b;
    pub const I32_SHR_U: u8 = 0x0c;
    pub const I32_SHR_S: u8 = 0x0d;
    pub const I32_EQZ: u8 = 0x0e;
    pub const I32_EQ: u8 = 0x0f;
    pub const I32_NE: u8 = 0x10;
    pub const I32_LT_U: u8 = 0x11;
    pub const I32_LT_S: u8 = 0x12;
    pub const I32_GT_U: u8 = 0x13;
    pub const I32_GT_S: u8 = 0x14;
    pub const I32_LE_U: u8 = 0x15;
    pub const I32_LE_S: u8 = 0x16;
    pub const I32_GE_U: u8 = 0x17;
    pub const I32_GE_S: u8 = 0x18;
    pub const LOCAL_GET: u8 = 0x19;
    pub const LOCAL_SET: u8 = 0x1a;
    pub const LOCAL_TEE: u8 = 0x1b;
    pub const I32_LOAD: u8 = 0x1c;
    pub const I32_STORE: u8 = 0x1d;
    pub const DROP: u8 = 0x1e;
    pub const JUMP: u8 = 0x1f;
    pub const JUMP_IF_ZERO: u8 = 0x20;
    pub const JUMP_IF_NON_ZERO: u8 = 0x21;
    pub const CALL: u8 = 0x22;
    pub const RETURN: u8 = 0x23;
    pub const CALL_HOST: u8 = 0x24;
    pub const UNREACHABLE: u8 = 0x25;
}

impl Instr {
    /// Appends this instruction's wire encoding to `out`. Branch/call targets are
    /// encoded as absolute byte offsets into the code section, the same space the
    /// compiler computes them in; `Module::parse` rewrites them to instruction
    /// indices once the whole stream has been decoded.
    pub fn encode(&self, out: &mut Vec<u8>) {
        use Instr::*;
        match *self {
            I32Const(v) => {
                out.push(opcode::I32_CONST);
                out.extend_from_slice(&v.to_le_bytes());
            }
            I32Add => out.push(opcode::I32_ADD),
            I32Sub => out.push(opcode::I32_SUB),
            I32Mul => out.push(opcode::I32_MUL),
            I32DivU => out.push(opcode::I32_DIV_U),
            I32DivS => out.push(opcode::I32_DIV_S),
            I32RemU => out.push(opcode::I32_REM_U),
            I32RemS => out.push(opcode::I32_REM_S),
            I32And => out.push(opcode::I32_AND),
            I32Or => out.push(opcode::I32_OR),
            I32Xor => out.push(opcode::I32_XOR),
            I32Shl => out.push(opcode::I32_SHL),
            I32ShrU => out.push(opcode::I32_SHR_U),
            I32ShrS => out.push(opcode::I32_SHR_S),
            I32Eqz => out.push(opcode::I32_EQZ),
            I32Eq => out.push(opcode::I32_EQ),
            I32Ne => out.push(opcode::I32_NE),
            I32LtU => out.push(opcode::I32_LT_U),
            I32LtS => out.push(opcode::I32_LT_S),
            I32GtU => out.push(opcode::I32_GT_U),
            I32GtS => out.push(opcode::I32_GT_S),
            I32LeU => out.push(opcode::I32_LE_U),
            I32LeS => out.push(opcode::I32_LE_S),
            I32GeU => out.push(opcode::I32_GE_U),
            I32GeS => out.push(opcode::I32_GE_S),
            LocalGet(i) => {
                out.push(opcode::LOCAL_GET);
                out.extend_from_slice(&i.to_le_bytes());
            }
            LocalSet(i) => {
                out.push(opcode::LOCAL_SET);
                out.extend_from_slice(&i.to_le_bytes());
            }
            LocalTee(i) => {
                out.push(opcode::LOCAL_TEE);
                out.extend_from_slice(&i.to_le_bytes());
            }
            I32Load(off) => {
                out.push(opcode::I32_LOAD);
                out.extend_from_slice(&off.to_le_bytes());
            }
            I32Store(off) => {
                out.push(opcode::I32_STORE);
                out.extend_from_slice(&off.to_le_bytes());
            }
            Drop => out.push(opcode::DROP),
            Jump(t) => {
                out.push(opcode::JUMP);
                out.extend_from_slice(&t.to_le_bytes());
            }
            JumpIfZero(t) => {
                out.push(opcode::JUMP_IF_ZERO);
                out.extend_from_slice(&t.to_le_bytes());
            }
            JumpIfNonZero(t) => {
                out.push(opcode::JUMP_IF_NON_ZERO);
                out.extend_from_slice(&t.to_le_bytes());
            }
            Call { target, arity, locals } => {
                out.push(opcode::CALL);
                out.extend_from_slice(&target.to_le_bytes());
                out.extend_from_slice(&arity.to_le_bytes());
                out.extend_from_slice(&locals.to_le_bytes());
            }
            Return => out.push(opcode::RETURN),
            CallHost { binding_id, arity, has_ret } => {
                out.push(opcode::CALL_HOST);
                out.extend_from_slice(&binding_id.to_le_bytes());
                out.extend_from_slice(&arity.to_le_bytes());
                out.push(has_ret as u8);
            }
            Unreachable => out.push(opcode::UNREACHABLE),
        }
    }

    /// Decodes one instruction starting at `bytes[*pos]`, advancing `*pos` past it.
    pub fn decode(bytes: &[u8], pos: &mut usize) -> Result<Self, types::BvmError> {
        use types::BvmError;

        fn take<'a>(bytes: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8], BvmError> {
            let end = pos.checked_add(n).ok_or_else(|| BvmError::MalformedModule("code offset overflowed".into()))?;
            let slice = bytes
                .get(*pos..end)
                .ok_or_else(|| BvmError::MalformedModule("instruction operand truncated".into()))?;
            *pos = end;
            Ok(slice)
        }
        fn u32_at(bytes: &[u8], pos: &mut usize) -> Result<u32, BvmError> {
            let s = take(bytes, pos, 4)?;
            Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
        }

        let tag = *bytes.get(*pos).ok_or_else(|| BvmError::MalformedModule("code truncated at opcode".into()))?;
        *pos += 1;
        Ok(match tag {
            opcode::I32_CONST => Instr::I32Const(u32_at(bytes, pos)? as i32),
            opcode::I32_ADD => Instr::I32Add,
            opcode::I32_SUB => Instr::I32Sub,
            opcode::I32_MUL => Instr::I32Mul,
            opcode::I32_DIV_U => Instr::I32DivU,
            opcode::I32_DIV_S => Instr::I32DivS,
            opcode::I32_REM_U => Instr::I32RemU,
            opcode::I32_REM_S => Instr::I32RemS,
            opcode::I32_AND => Instr::I32And,
            opcode::I32_OR => Instr::I32Or,
            opcode::I32_XOR => Instr::I32Xor,
            opcode::I32_SHL => Instr::I32Shl,
            opcode::I32_SHR_U => Instr::I32ShrU,
            opcode::I32_SHR_S => Instr::I32ShrS,
            opcode::I32_EQZ => Instr::I32Eqz,
            opcode::I32_EQ => Instr::I32Eq,
            opcode::I32_NE => Instr::I32Ne,
            opcode::I32_LT_U => Instr::I32LtU,
            opcode::I32_LT_S => Instr::I32LtS,
            opcode::I32_GT_U => Instr::I32GtU,
            opcode::I32_GT_S => Instr::I32GtS,
            opcode::I32_LE_U => Instr::I32LeU,
            opcode::I32_LE_S => Instr::I32LeS,
            opcode::I32_GE_U => Instr::I32GeU,
            opcode::I32_GE_S => Instr::I32GeS,
            opcode::LOCAL_GET => Instr::LocalGet(u32_at(bytes, pos)?),
            opcode::LOCAL_SET => Instr::LocalSet(u32_at(bytes, pos)?),
            opcode::LOCAL_TEE => Instr::LocalTee(u32_at(bytes, pos)?),
            opcode::I32_LOAD => Instr::I32Load(u32_at(bytes, pos)?),
            opcode::I32_STORE => Instr::I32Store(u32_at(bytes, pos)?),
            opcode::DROP => Instr::Drop,
            opcode::JUMP => Instr::Jump(u32_at(bytes, pos)?),
            opcode::JUMP_IF_ZERO => Instr::JumpIfZero(u32_at(bytes, pos)?),
            opcode::JUMP_IF_NON_ZERO => Instr::JumpIfNonZero(u32_at(bytes, pos)?),
            opcode::CALL => {
                let target = u32_at(bytes, pos)?;
                let arity = u32_at(bytes, pos)?;
                let locals = u32_at(bytes, pos)?;
                Instr::Call { target, arity, locals }
            }
            opcode::RETURN => Instr::Return,
            opcode::CALL_HOST => {
                let binding_id = u32_at(bytes, pos)?;
                let arity = u32_at(bytes, pos)?;
                let has_ret = take(bytes, pos, 1)?[0] != 0;
                Instr::CallHost { binding_id, arity, has_ret }
            }
            opcode::UNREACHABLE => Instr::Unreachable,
            other => return Err(BvmError::MalformedModule(format!("unknown opcode 0x{:02x}", other))),
        })
    }

    /// Does this instruction encode a branch/call target as an absolute byte offset
    /// that needs rewriting to an instruction index after decoding?
    pub fn target_byte_offset(&self) -> Option<u32> {
        match *self {
            Instr::Jump(t) | Instr::JumpIfZero(t) | Instr::JumpIfNonZero(t) => Some(t),
            Instr::Call { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn with_rewritten_target(&self, index: u32) -> Self {
        match *self {
            Instr::Jump(_) => Instr::Jump(index),
            Instr::JumpIfZero(_) => Instr::JumpIfZero(index),
            Instr::JumpIfNonZero(_) => Instr::JumpIfNonZero(index),
            Instr::Call { arity, locals, .. } => Instr::Call { target: index, arity, locals },
            other => other,
        }
    }
}
