//! Resolves a parsed module's `import` section against the fixed host ABI table.
//!
//! Every import must come from module `env`; anything else, or a name/signature
//! that doesn't match an entry in `types::HOST_ABI_TABLE` exactly, is a link
//! error the same way Beam's `ResolveBindings` treats it: this is a
//! consensus-relevant check, not a best-effort one.

use parity_wasm::elements::{External, FunctionType, ImportEntry, Module as WasmModule, Type, ValueType};
use types::{BvmError, TypeCode};

/// A function import resolved to its host binding.
#[derive(Debug, Clone, Copy)]
pub struct ImportBinding {
    pub binding_id: u32,
    pub arity: u32,
    pub has_ret: bool,
}

fn to_type_code(v: ValueType) -> Result<TypeCode, BvmError> {
    match v {
        ValueType::I32 => Ok(TypeCode::I32),
        ValueType::I64 => Ok(TypeCode::I64),
        ValueType::F32 | ValueType::F64 => {
            Err(BvmError::MalformedModule("floating-point types are not supported".into()))
        }
    }
}

fn function_type_at<'a>(module: &'a WasmModule, type_index: u32) -> Result<&'a FunctionType, BvmError> {
    let types = module
        .type_section()
        .ok_or_else(|| BvmError::MalformedModule("module has imports but no type section".into()))?
        .types();
    match types.get(type_index as usize) {
        Some(Type::Function(ft)) => Ok(ft),
        None => Err(BvmError::MalformedModule(format!("import refers to missing type index {}", type_index))),
    }
}

/// Resolves every function import in declaration order. Non-function imports
/// (table, memory, global) are rejected: the host ABI is functions-only, and a
/// contract's linear memory is always its own, never imported.
pub fn resolve_imports(module: &WasmModule) -> Result<Vec<ImportBinding>, BvmError> {
    let Some(import_section) = module.import_section() else {
        return Ok(Vec::new());
    };

    let mut bindings = Vec::with_capacity(import_section.entries().len());
    for entry in import_section.entries() {
        bindings.push(resolve_one(module, entry)?);
    }
    Ok(bindings)
}

fn resolve_one(module: &WasmModule, entry: &ImportEntry) -> Result<ImportBinding, BvmError> {
    if entry.module() != "env" {
        return Err(BvmError::LinkError(format!(
            "import \"{}\".\"{}\": only module \"env\" is linkable",
            entry.module(),
            entry.field()
        )));
    }
    let External::Function(type_index) = entry.external() else {
        return Err(BvmError::LinkError(format!(
            "import \"{}\": only function imports are supported",
            entry.field()
        )));
    };
    let ft = function_type_at(module, *type_index)?;

    let mut args = Vec::with_capacity(ft.params().len());
    for p in ft.params() {
        args.push(to_type_code(*p)?);
    }
    let ret = ft.return_type().map(to_type_code).transpose()?;

    let resolved = types::host_abi::resolve(entry.field(), &args, ret).ok_or_else(|| {
        BvmError::LinkError(format!(
            "import \"{}\" does not match any host ABI entry for this signature",
            entry.field()
        ))
    })?;

    Ok(ImportBinding {
        binding_id: resolved.binding_id,
        arity: args.len() as u32,
        has_ret: ret.is_some(),
    })
}
