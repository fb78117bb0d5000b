//! Byte-for-byte mirror of `vm::instr`'s wire encoding.
//!
//! The compiler never links against `vm` outside tests (see this crate's
//! `Cargo.toml`): it only needs to agree with the interpreter on the *shape* of
//! the code section, not on a shared Rust type. Keeping the two independent
//! means the wire format is the actual contract between them, exercised by the
//! round-trip tests in `tests/`.

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
