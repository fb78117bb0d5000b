//! Top-level pipeline: parse a WASM-shaped module, resolve its imports against
//! the host ABI, lower every local function body, validate its exports, and
//! assemble the final `[header][data][code]` byte string `vm::Module::parse`
//! expects.

use std::collections::BTreeMap;

use parity_wasm::elements::{Instruction, Internal, Module as WasmModule, Type};
use types::{BvmError, Limits};

use crate::abi_link::{self, ImportBinding};
use crate::lower::{self, FunctionSignature, LoweredBody};

const WIRE_VERSION: u16 = 1;

pub fn compile(wasm_bytes: &[u8]) -> Result<Vec<u8>, BvmError> {
    log::debug!("compiling a {}-byte WASM module", wasm_bytes.len());
    let module = parity_wasm::deserialize_buffer::<WasmModule>(wasm_bytes)
        .map_err(|e| BvmError::MalformedModule(format!("invalid WASM module: {}", e)))?;

    let import_bindings = abi_link::resolve_imports(&module)?;
    let num_imports = import_bindings.len() as u32;
    let signatures = combined_signatures(&module, &import_bindings)?;

    let lowered = lower_local_bodies(&module, &signatures, num_imports, &import_bindings)?;
    let (code, bases) = assemble_code(&lowered);

    let data = flatten_data(&module)?;
    let method_entry = resolve_exports(&module, &signatures, num_imports, &bases)?;

    let out = encode_module(&method_entry, &data, &code);
    log::debug!(
        "compiled module: {} method(s), {}-byte data section, {}-byte code section",
        method_entry.len(),
        data.len(),
        code.len()
    );
    Ok(out)
}

fn combined_signatures(module: &WasmModule, import_bindings: &[ImportBinding]) -> Result<Vec<FunctionSignature>, BvmError> {
    let mut out: Vec<FunctionSignature> = import_bindings
        .iter()
        .map(|b| FunctionSignature { params: b.arity, has_result: b.has_ret })
        .collect();

    let Some(function_section) = module.function_section() else {
        return Ok(out);
    };
    let types = module
        .type_section()
        .ok_or_else(|| BvmError::MalformedModule("module declares functions but has no type section".into()))?
        .types();

    for func in function_section.entries() {
        let Type::Function(ft) = types
            .get(func.type_ref() as usize)
            .ok_or_else(|| BvmError::MalformedModule("function refers to a missing type index".into()))?;
        out.push(FunctionSignature {
            params: ft.params().len() as u32,
            has_result: ft.return_type().is_some(),
        });
    }
    Ok(out)
}

fn lower_local_bodies(
    module: &WasmModule,
    signatures: &[FunctionSignature],
    num_imports: u32,
    import_bindings: &[ImportBinding],
) -> Result<Vec<LoweredBody>, BvmError> {
    let func_count = module.function_section().map(|s| s.entries().len()).unwrap_or(0);
    let bodies = module.code_section().map(|s| s.bodies()).unwrap_or(&[]);
    if bodies.len() != func_count {
        return Err(BvmError::MalformedModule("function section and code section lengths differ".into()));
    }

    bodies
        .iter()
        .map(|body| lower::lower_function(body, signatures, num_imports, import_bindings))
        .collect()
}

/// Concatenates every lowered body into one code section and patches every
/// fixup to an absolute byte offset: branch fixups by adding the owning
/// function's base, call fixups by substituting the callee's base outright.
fn assemble_code(lowered: &[LoweredBody]) -> (Vec<u8>, Vec<u32>) {
    let mut bases = Vec::with_capacity(lowered.len());
    let mut cursor = 0u32;
    for body in lowered {
        bases.push(cursor);
        cursor += body.bytes.len() as u32;
    }

    let mut code = Vec::with_capacity(cursor as usize);
    for body in lowered {
        code.extend_from_slice(&body.bytes);
    }

    for (i, body) in lowered.iter().enumerate() {
        let base = bases[i];
        for fixup in &body.branch_fixups {
            let at = base as usize + fixup.at;
            let current = u32::from_le_bytes(code[at..at + 4].try_into().unwrap());
            code[at..at + 4].copy_from_slice(&(current + base).to_le_bytes());
        }
        for fixup in &body.call_fixups {
            let at = base as usize + fixup.at;
            let callee_base = bases[fixup.callee_function_index as usize];
            code[at..at + 4].copy_from_slice(&callee_base.to_le_bytes());
        }
    }

    (code, bases)
}

/// Flattens the data section's segments into one contiguous image. Only
/// constant `i32.const` offset expressions are supported — the only form a
/// statically-linked contract module can produce.
fn flatten_data(module: &WasmModule) -> Result<Vec<u8>, BvmError> {
    let Some(data_section) = module.data_section() else {
        return Ok(Vec::new());
    };

    let mut size = 0usize;
    let mut placements = Vec::with_capacity(data_section.entries().len());
    for segment in data_section.entries() {
        let offset_expr = segment
            .offset()
            .ok_or_else(|| BvmError::MalformedModule("passive data segments are not supported".into()))?;
        let offset = match offset_expr.code() {
            [Instruction::I32Const(v), Instruction::End] => *v as u32 as usize,
            _ => return Err(BvmError::MalformedModule("data segment offset must be a constant i32".into())),
        };
        let end = offset
            .checked_add(segment.value().len())
            .ok_or_else(|| BvmError::MalformedModule("data segment overflows the address space".into()))?;
        size = size.max(end);
        placements.push((offset, segment.value()));
    }

    if size > Limits::default().data_size {
        return Err(BvmError::MalformedModule(format!(
            "data section ({} bytes) exceeds the per-frame linear memory budget",
            size
        )));
    }

    let mut data = vec![0u8; size];
    for (offset, bytes) in placements {
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
    Ok(data)
}

/// `Ctor` is method 0, `Dtor` is method 1, `Method_<k>` (k >= 2) the rest;
/// indices must be present contiguously from 0 with no gaps. Every entry must
/// be a locally-defined function taking exactly one `i32` (the argument-blob
/// pointer `vm::Vm::push_far_call` supplies) and returning one `i32`.
fn resolve_exports(
    module: &WasmModule,
    signatures: &[FunctionSignature],
    num_imports: u32,
    bases: &[u32],
) -> Result<Vec<u32>, BvmError> {
    let Some(export_section) = module.export_section() else {
        return Err(BvmError::MalformedModule("module exports nothing; Ctor and Dtor are required".into()));
    };

    let mut by_index: BTreeMap<u32, u32> = BTreeMap::new();
    for export in export_section.entries() {
        let Internal::Function(func_index) = export.internal() else {
            continue;
        };
        let method_index = match export.field() {
            "Ctor" => 0,
            "Dtor" => 1,
            other => match other.strip_prefix("Method_").and_then(|n| n.parse::<u32>().ok()) {
                Some(k) if k >= 2 => k,
                _ => continue,
            },
        };
        if by_index.insert(method_index, *func_index).is_some() {
            return Err(BvmError::MalformedModule(format!("method index {} exported more than once", method_index)));
        }
    }

    let method_count = by_index.len() as u32;
    if method_count < 2 || !by_index.contains_key(&0) || !by_index.contains_key(&1) {
        return Err(BvmError::MalformedModule("module must export both Ctor and Dtor".into()));
    }
    for i in 0..method_count {
        if !by_index.contains_key(&i) {
            return Err(BvmError::MalformedModule(format!("method index {} has no matching export", i)));
        }
    }

    let mut method_entry = Vec::with_capacity(method_count as usize);
    for i in 0..method_count {
        let func_index = by_index[&i];
        if func_index < num_imports {
            return Err(BvmError::LinkError(format!("method {} exports an import, not a function body", i)));
        }
        let sig = signatures[func_index as usize];
        if sig.params != 1 || !sig.has_result {
            return Err(BvmError::LinkError(format!(
                "method {} must take exactly one i32 argument (the arg-blob pointer) and return one i32",
                i
            )));
        }
        let local_index = (func_index - num_imports) as usize;
        method_entry.push(bases[local_index]);
    }
    Ok(method_entry)
}

fn encode_module(method_entry: &[u32], data: &[u8], code: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + 4 * method_entry.len() + data.len() + code.len());
    out.extend_from_slice(&WIRE_VERSION.to_le_bytes());
    out.extend_from_slice(&(method_entry.len() as u16).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    for e in method_entry {
        out.extend_from_slice(&e.to_le_bytes());
    }
    out.extend_from_slice(data);
    out.extend_from_slice(code);
    out
}
