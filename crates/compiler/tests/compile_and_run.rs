//! Compiles small hand-built WASM modules and runs the result through `vm` end
//! to end, exercising the parts a unit test inside `compiler` can't: import
//! resolution against the real host ABI table, control-flow relooping, and the
//! cross-function call-site fixup pass.

use parity_wasm::elements::{
    BlockType, CodeSection, ExportEntry, ExportSection, External, Func, FuncBody, FunctionSection,
    FunctionType, ImportEntry, ImportSection, Instruction, Instructions, Internal, Local, Module as WasmModule,
    Section, Type, TypeSection, ValueType,
};

use types::{AssetId, BvmError, ContractId, PeerId};
use vm::{HostInterface, NoopMeter, Outcome, Vm};

fn entry_type() -> Type {
    Type::Function(FunctionType::new(vec![ValueType::I32], Some(ValueType::I32)))
}

/// A host that only ever needs to hand back a module's own bytes for the
/// single contract id under test; none of the other obligations are exercised.
#[derive(Debug)]
struct SingleModuleHost {
    cid: ContractId,
    code: Vec<u8>,
}

impl HostInterface for SingleModuleHost {
    fn load_var(&mut self, _cid: ContractId, _subkey: &[u8]) -> Vec<u8> {
        Vec::new()
    }
    fn save_var(&mut self, _cid: ContractId, _subkey: Vec<u8>, _value: Vec<u8>) -> Result<(), BvmError> {
        Ok(())
    }
    fn add_sig(&mut self, _pubkey: &[u8]) -> Result<(), BvmError> {
        Ok(())
    }
    fn funds_lock(&mut self, _cid: ContractId, _aid: AssetId, _amount: u64) -> Result<(), BvmError> {
        Ok(())
    }
    fn funds_unlock(&mut self, _cid: ContractId, _aid: AssetId, _amount: u64) -> Result<(), BvmError> {
        Ok(())
    }
    fn ref_add(&mut self, _cid: ContractId, _target: ContractId) -> Result<(), BvmError> {
        Ok(())
    }
    fn ref_release(&mut self, _cid: ContractId, _target: ContractId) -> Result<(), BvmError> {
        Ok(())
    }
    fn asset_create(&mut self, _cid: ContractId, _metadata: &[u8]) -> Result<(AssetId, PeerId), BvmError> {
        Ok((AssetId(0), PeerId::new([0u8; 32])))
    }
    fn asset_emit(&mut self, _cid: ContractId, _aid: AssetId, _delta: i64) -> Result<bool, BvmError> {
        Ok(true)
    }
    fn asset_destroy(&mut self, _cid: ContractId, _aid: AssetId) -> Result<bool, BvmError> {
        Ok(true)
    }
    fn load_contract_code(&mut self, cid: ContractId) -> Result<Vec<u8>, BvmError> {
        assert_eq!(cid, self.cid);
        Ok(self.code.clone())
    }
    fn get_hdr(&mut self, _height: u32) -> Result<i64, BvmError> {
        Err(BvmError::BlockNotReady { height: 0 })
    }
    fn vars_enum(&mut self, _cid: ContractId, _k_min: &[u8], _k_max: &[u8]) -> u32 {
        0
    }
    fn vars_move_next(&mut self, _cursor: u32) -> Option<(Vec<u8>, Vec<u8>)> {
        None
    }
    fn doc_group(&mut self, _name: &[u8]) {}
    fn doc_array(&mut self, _name: &[u8]) {}
    fn doc_add_text(&mut self, _name: &[u8], _text: &[u8]) {}
    fn doc_add_blob(&mut self, _name: &[u8], _blob: &[u8]) {}
    fn doc_add_num32(&mut self, _name: &[u8], _value: i32) {}
    fn doc_add_num64(&mut self, _name: &[u8], _value: i64) {}
    fn doc_get_text(&mut self, _name: &[u8]) -> Option<Vec<u8>> {
        None
    }
    fn doc_get_blob(&mut self, _name: &[u8]) -> Option<Vec<u8>> {
        None
    }
    fn doc_get_num32(&mut self, _name: &[u8]) -> Option<i32> {
        None
    }
    fn doc_get_num64(&mut self, _name: &[u8]) -> Option<i64> {
        None
    }
}

fn trivial_body() -> FuncBody {
    FuncBody::new(vec![], Instructions::new(vec![Instruction::I32Const(0), Instruction::Return, Instruction::End]))
}

/// `Method_2`: sums `1..=4` with a `loop`/`br_if`/`br`, ignoring its argument
/// pointer, and returns the total (10).
fn summing_loop_body() -> FuncBody {
    let locals = vec![Local::new(2, ValueType::I32)]; // local 1 = i, local 2 = acc
    let code = vec![
        Instruction::I32Const(1),
        Instruction::SetLocal(1),
        Instruction::I32Const(0),
        Instruction::SetLocal(2),
        Instruction::Block(BlockType::NoResult),
        Instruction::Loop(BlockType::NoResult),
        Instruction::GetLocal(1),
        Instruction::I32Const(5),
        Instruction::I32GeS,
        Instruction::BrIf(1),
        Instruction::GetLocal(2),
        Instruction::GetLocal(1),
        Instruction::I32Add,
        Instruction::SetLocal(2),
        Instruction::GetLocal(1),
        Instruction::I32Const(1),
        Instruction::I32Add,
        Instruction::SetLocal(1),
        Instruction::Br(0),
        Instruction::End, // loop
        Instruction::End, // block
        Instruction::GetLocal(2),
        Instruction::Return,
        Instruction::End, // function
    ];
    FuncBody::new(locals, Instructions::new(code))
}

fn build_module() -> WasmModule {
    WasmModule::new(vec![
        Section::Type(TypeSection::with_entries(vec![entry_type()])),
        Section::Function(FunctionSection::with_entries(vec![Func::new(0), Func::new(0), Func::new(0)])),
        Section::Code(CodeSection::with_bodies(vec![trivial_body(), trivial_body(), summing_loop_body()])),
        Section::Export(ExportSection::with_entries(vec![
            ExportEntry::new("Ctor".to_string(), Internal::Function(0)),
            ExportEntry::new("Dtor".to_string(), Internal::Function(1)),
            ExportEntry::new("Method_2".to_string(), Internal::Function(2)),
        ])),
    ])
}

#[test]
fn compiles_and_runs_a_looping_method() {
    let wasm = build_module();
    let bytes = parity_wasm::serialize(wasm).expect("serialize fixture module");
    let compiled = compiler::compile(&bytes).expect("compile fixture module");

    let cid = ContractId::new([1u8; 32]);
    let mut host = SingleModuleHost { cid, code: compiled };
    let mut vm = Vm::new(types::Limits::default());
    let mut meter = NoopMeter;

    let outcome = vm.invoke(cid, 2, &[], &mut host, &mut meter).expect("invoke Method_2");
    match outcome {
        Outcome::Completed { result } => assert_eq!(result, Some(10)),
    }
}

#[test]
fn rejects_a_module_missing_dtor() {
    let wasm = WasmModule::new(vec![
        Section::Type(TypeSection::with_entries(vec![entry_type()])),
        Section::Function(FunctionSection::with_entries(vec![Func::new(0)])),
        Section::Code(CodeSection::with_bodies(vec![trivial_body()])),
        Section::Export(ExportSection::with_entries(vec![ExportEntry::new(
            "Ctor".to_string(),
            Internal::Function(0),
        )])),
    ]);
    let bytes = parity_wasm::serialize(wasm).expect("serialize fixture module");
    assert!(compiler::compile(&bytes).is_err());
}

#[test]
fn resolves_a_host_import_to_the_right_binding() {
    // `Env_RefAdd(i32) -> ()`, binding id 10.
    let import_type = Type::Function(FunctionType::new(vec![ValueType::I32], None));
    let wasm = WasmModule::new(vec![
        Section::Type(TypeSection::with_entries(vec![import_type, entry_type()])),
        Section::Import(ImportSection::with_entries(vec![ImportEntry::new(
            "env".to_string(),
            "Env_RefAdd".to_string(),
            External::Function(0),
        )])),
        Section::Function(FunctionSection::with_entries(vec![Func::new(1), Func::new(1), Func::new(1)])),
        Section::Code(CodeSection::with_bodies(vec![trivial_body(), trivial_body(), trivial_body()])),
        Section::Export(ExportSection::with_entries(vec![
            ExportEntry::new("Ctor".to_string(), Internal::Function(1)),
            ExportEntry::new("Dtor".to_string(), Internal::Function(2)),
            ExportEntry::new("Method_2".to_string(), Internal::Function(3)),
        ])),
    ]);
    let bytes = parity_wasm::serialize(wasm).expect("serialize fixture module");
    let compiled = compiler::compile(&bytes).expect("a lone unused import must not fail compilation");
    assert!(!compiled.is_empty());
}
