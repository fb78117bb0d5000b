//! The compiled module format the interpreter executes: a fixed header of method
//! entry points, a data section (the contract's initial linear memory image), and a
//! code section (the flattened instruction stream every method offset points into).
//!
//! Method index 0 is always the constructor, index 1 the destructor; indices 2 and
//! up are ordinary entry points addressed by call site, not by name — the compiler is
//! responsible for assigning them contiguously.
//!
//! The wire format encodes branch/call targets as absolute byte offsets into the raw
//! code section (the space the compiler computes them in, see `compiler::wasm`).
//! `Module::parse` decodes that byte stream into a `Vec<Instr>` once and rewrites
//! every target to an instruction index, so the interpreter's program counter is a
//! plain index rather than a byte offset it would have to re-decode on every step.

use std::collections::HashMap;

use crate::instr::Instr;
use types::BvmError;

pub const METHOD_CTOR: u32 = 0;
pub const METHOD_DTOR: u32 = 1;

#[derive(Debug, Clone)]
pub struct Module {
    pub version: u16,
    method_entry: Vec<u32>,
    data: Vec<u8>,
    code: Vec<Instr>,
}

impl Module {
    /// Wire layout: `version:u16 || method_count:u16 || data_size:u32 ||
    /// method_entry[method_count]:u32 || data || code`. `method_entry[i]` is the byte
    /// offset into `code` where method `i` begins; `data_size` is the length of the
    /// data section that immediately follows the header, whose own fixed size is
    /// `8 (version+count+data_size) + 4*method_count` bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, BvmError> {
        if bytes.len() < 8 {
            return Err(BvmError::MalformedModule("module shorter than the fixed header".into()));
        }
        let version = u16::from_le_bytes([bytes[0], bytes[1]]);
        if version != 1 {
            return Err(BvmError::MalformedModule(format!("unsupported module version {}", version)));
        }
        let method_count = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
        if method_count < 2 {
            return Err(BvmError::MalformedModule(
                "a module must declare at least a constructor and destructor".into(),
            ));
        }
        let data_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;

        let entry_table_size = 4 * method_count;
        let header_size = 8 + entry_table_size;
        if bytes.len() < header_size {
            return Err(BvmError::MalformedModule("method entry table truncated".into()));
        }

        let mut method_entry_offsets = Vec::with_capacity(method_count);
        for i in 0..method_count {
            let off = 8 + 4 * i;
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[off..off + 4]);
            method_entry_offsets.push(u32::from_le_bytes(buf));
        }

        let data_offset = header_size;
        if bytes.len() < data_offset + data_size {
            return Err(BvmError::MalformedModule("data section truncated".into()));
        }
        let data = bytes[data_offset..data_offset + data_size].to_vec();
        let code_bytes = &bytes[data_offset + data_size..];

        // Decode the flat byte stream once, remembering which instruction index each
        // byte offset decoded to so jump/call targets (and method entries) can be
        // rewritten from byte offsets to indices.
        let mut code = Vec::new();
        let mut offset_to_index: HashMap<u32, u32> = HashMap::new();
        let mut pos = 0usize;
        while pos < code_bytes.len() {
            offset_to_index.insert(pos as u32, code.len() as u32);
            let instr = Instr::decode(code_bytes, &mut pos)?;
            code.push(instr);
        }
        // A target equal to the code section's length is a legal "fall off the end"
        // entry (an empty method body); treat it as one-past-the-last instruction.
        offset_to_index.insert(code_bytes.len() as u32, code.len() as u32);

        let resolve = |offset: u32, what: &str| -> Result<u32, BvmError> {
            offset_to_index.get(&offset).copied().ok_or_else(|| {
                BvmError::MalformedModule(format!(
                    "{} at byte offset {} does not land on an instruction boundary",
                    what, offset
                ))
            })
        };

        for instr in code.iter_mut() {
            if let Some(target) = instr.target_byte_offset() {
                let index = resolve(target, "branch/call target")?;
                *instr = instr.with_rewritten_target(index);
            }
        }

        let mut method_entry = Vec::with_capacity(method_count);
        for (i, &offset) in method_entry_offsets.iter().enumerate() {
            method_entry.push(resolve(offset, &format!("method {} entry point", i))?);
        }

        log::trace!(
            "loaded module: version {}, {} method(s), {}-byte data, {} instruction(s)",
            version,
            method_entry.len(),
            data.len(),
            code.len()
        );
        Ok(Self {
            version,
            method_entry,
            data,
            code,
        })
    }

    pub fn method_count(&self) -> usize {
        self.method_entry.len()
    }

    /// Index into `code()` where method `index`'s body begins.
    pub fn method_offset(&self, index: u32) -> Option<u32> {
        self.method_entry.get(index as usize).copied()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn code(&self) -> &[Instr] {
        &self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Instr;

    fn build_raw(method_entry: &[u32], data: &[u8], code: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&(method_entry.len() as u16).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        for e in method_entry {
            out.extend_from_slice(&e.to_le_bytes());
        }
        out.extend_from_slice(data);
        out.extend_from_slice(code);
        out
    }

    fn encode_all(instrs: &[Instr]) -> Vec<u8> {
        let mut out = Vec::new();
        for i in instrs {
            i.encode(&mut out);
        }
        out
    }

    #[test]
    fn parses_a_minimal_module_and_rewrites_entries_to_indices() {
        let code = encode_all(&[Instr::I32Const(1), Instr::Return, Instr::I32Const(2), Instr::Return]);
        // Method 0 (Ctor) starts at byte 0 (the first I32Const); method 1 (Dtor) starts
        // at the byte offset of the second I32Const, 6 bytes in (I32Const is 5 bytes,
        // Return is 1).
        let raw = build_raw(&[0, 6], &[0u8; 8], &code);
        let module = Module::parse(&raw).unwrap();
        assert_eq!(module.method_count(), 2);
        assert_eq!(module.method_offset(METHOD_CTOR), Some(0));
        assert_eq!(module.method_offset(METHOD_DTOR), Some(2));
        assert_eq!(module.code().len(), 4);
        assert_eq!(module.data().len(), 8);
    }

    #[test]
    fn rejects_entry_point_outside_code() {
        let raw = build_raw(&[0, 999], &[], &encode_all(&[Instr::Return]));
        assert!(matches!(Module::parse(&raw), Err(BvmError::MalformedModule(_))));
    }

    #[test]
    fn rejects_fewer_than_two_methods() {
        let raw = build_raw(&[0], &[], &[]);
        assert!(matches!(Module::parse(&raw), Err(BvmError::MalformedModule(_))));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut raw = build_raw(&[0, 1], &[], &encode_all(&[Instr::Return, Instr::Return]));
        raw[0] = 2;
        assert!(matches!(Module::parse(&raw), Err(BvmError::MalformedModule(_))));
    }

    #[test]
    fn rejects_branch_into_the_middle_of_an_instruction() {
        // Jump(1) targets the second byte of the I32Const's 4-byte immediate.
        let mut out = Vec::new();
        Instr::Jump(1).encode(&mut out);
        Instr::I32Const(7).encode(&mut out);
        let raw = build_raw(&[0, 0], &[], &out);
        assert!(matches!(Module::parse(&raw), Err(BvmError::MalformedModule(_))));
    }
}
