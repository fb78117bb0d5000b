//! Lowers one WASM function body to `vm` bytecode.
//!
//! Structured control flow is relooped with a label stack, the textbook
//! technique for flattening `block`/`loop`/`if` into absolute jumps: every label
//! remembers where its forward branches need patching (`end_fixups`), loops
//! resolve immediately since their target (the loop header) is already behind
//! them, and `if`/`else` additionally needs the "skip the false arm" jump patched
//! once `else` (or `end`) is reached.
//!
//! Every lowered body's first instructions always zero-initialize its own
//! declared locals (`I32Const(0)` once per slot) and its last instruction is
//! always `Return`. That holds for entry-point bodies too — far-call dispatch
//! only ever places a single argument-pointer operand on the stack, so a body
//! can never rely on the interpreter to have reserved its locals for it. Making
//! every call site agree not to rely on `Instr::Call`'s own local-reservation
//! field either (`locals` is always emitted as `0`) keeps both invocation paths
//! identical instead of one depending on a mechanism the other can't use.

use parity_wasm::elements::{BlockType, FuncBody, Instruction, ValueType};
use types::BvmError;

use crate::abi_link::ImportBinding;
use crate::code_builder::{BranchFixup, CallFixup, CodeBuilder};
use crate::opcode;

/// Param/result shape of one entry in the combined (imports-then-locals) function
/// index space, used to size `Call`/`CallHost` sites.
#[derive(Debug, Clone, Copy)]
pub struct FunctionSignature {
    pub params: u32,
    pub has_result: bool,
}

enum LabelKind {
    Block,
    Loop { header: u32 },
    If { else_jump_at: Option<usize> },
}

struct Label {
    kind: LabelKind,
    end_fixups: Vec<usize>,
}

pub struct LoweredBody {
    pub bytes: Vec<u8>,
    pub branch_fixups: Vec<BranchFixup>,
    pub call_fixups: Vec<CallFixup>,
}

/// `num_imports` is the number of function imports, i.e. the split point in
/// `signatures` between `CallHost` targets and local `Call` targets.
pub fn lower_function(
    body: &FuncBody,
    signatures: &[FunctionSignature],
    num_imports: u32,
    import_bindings: &[ImportBinding],
) -> Result<LoweredBody, BvmError> {
    let mut extra_locals = 0u32;
    for local in body.locals() {
        if local.value_type() != ValueType::I32 {
            return Err(BvmError::MalformedModule("only i32 locals are supported".into()));
        }
        extra_locals += local.count();
    }

    let mut b = CodeBuilder::new();
    for _ in 0..extra_locals {
        b.emit_i32_const(0);
    }

    let mut labels: Vec<Label> = Vec::new();
    let instrs = body.code().elements();

    for instr in instrs {
        match instr {
            Instruction::Block(bt) => {
                require_empty_or_i32(bt)?;
                labels.push(Label { kind: LabelKind::Block, end_fixups: Vec::new() });
            }
            Instruction::Loop(bt) => {
                require_empty_or_i32(bt)?;
                labels.push(Label { kind: LabelKind::Loop { header: b.position() }, end_fixups: Vec::new() });
            }
            Instruction::If(bt) => {
                require_empty_or_i32(bt)?;
                let at = b.emit_branch_placeholder(opcode::JUMP_IF_ZERO);
                labels.push(Label { kind: LabelKind::If { else_jump_at: Some(at) }, end_fixups: Vec::new() });
            }
            Instruction::Else => {
                let label = labels.last_mut().ok_or_else(|| {
                    BvmError::MalformedModule("else with no matching if".into())
                })?;
                let LabelKind::If { else_jump_at } = &mut label.kind else {
                    return Err(BvmError::MalformedModule("else outside an if block".into()));
                };
                let jump_at = else_jump_at.take().ok_or_else(|| {
                    BvmError::MalformedModule("duplicate else for the same if".into())
                })?;
                // Skip the else arm when the true arm falls through.
                let skip_at = b.emit_branch_placeholder(opcode::JUMP);
                label.end_fixups.push(skip_at);
                b.patch_u32(jump_at, b.position());
            }
            Instruction::End => {
                let label = labels.pop().ok_or_else(|| BvmError::MalformedModule("unmatched end".into()))?;
                if let LabelKind::If { else_jump_at: Some(jump_at) } = label.kind {
                    b.patch_u32(jump_at, b.position());
                }
                let end = b.position();
                for at in label.end_fixups {
                    b.patch_u32(at, end);
                }
            }
            Instruction::Br(depth) => emit_branch(&mut b, &mut labels, *depth, opcode::JUMP)?,
            Instruction::BrIf(depth) => emit_branch(&mut b, &mut labels, *depth, opcode::JUMP_IF_NON_ZERO)?,
            Instruction::BrTable(_) => {
                return Err(BvmError::MalformedModule("br_table is not supported".into()));
            }
            Instruction::Return => b.emit_simple(opcode::RETURN),
            Instruction::Unreachable => b.emit_simple(opcode::UNREACHABLE),
            Instruction::Nop => {}
            Instruction::Drop => b.emit_simple(opcode::DROP),
            Instruction::Select => {
                return Err(BvmError::MalformedModule("select is not supported".into()));
            }
            Instruction::Call(func_index) => emit_call(&mut b, *func_index, signatures, num_imports, import_bindings)?,
            Instruction::CallIndirect(_, _) => {
                return Err(BvmError::MalformedModule("call_indirect is not supported".into()));
            }
            Instruction::GetLocal(i) => b.emit_index_op(opcode::LOCAL_GET, *i),
            Instruction::SetLocal(i) => b.emit_index_op(opcode::LOCAL_SET, *i),
            Instruction::TeeLocal(i) => b.emit_index_op(opcode::LOCAL_TEE, *i),
            Instruction::GetGlobal(_) | Instruction::SetGlobal(_) => {
                return Err(BvmError::MalformedModule("globals are not supported".into()));
            }
            Instruction::I32Load(_, offset) => b.emit_index_op(opcode::I32_LOAD, *offset),
            Instruction::I32Store(_, offset) => b.emit_index_op(opcode::I32_STORE, *offset),
            Instruction::I32Const(v) => b.emit_i32_const(*v),
            Instruction::I32Eqz => b.emit_simple(opcode::I32_EQZ),
            Instruction::I32Eq => b.emit_simple(opcode::I32_EQ),
            Instruction::I32Ne => b.emit_simple(opcode::I32_NE),
            Instruction::I32LtS => b.emit_simple(opcode::I32_LT_S),
            Instruction::I32LtU => b.emit_simple(opcode::I32_LT_U),
            Instruction::I32GtS => b.emit_simple(opcode::I32_GT_S),
            Instruction::I32GtU => b.emit_simple(opcode::I32_GT_U),
            Instruction::I32LeS => b.emit_simple(opcode::I32_LE_S),
            Instruction::I32LeU => b.emit_simple(opcode::I32_LE_U),
            Instruction::I32GeS => b.emit_simple(opcode::I32_GE_S),
            Instruction::I32GeU => b.emit_simple(opcode::I32_GE_U),
            Instruction::I32Add => b.emit_simple(opcode::I32_ADD),
            Instruction::I32Sub => b.emit_simple(opcode::I32_SUB),
            Instruction::I32Mul => b.emit_simple(opcode::I32_MUL),
            Instruction::I32DivS => b.emit_simple(opcode::I32_DIV_S),
            Instruction::I32DivU => b.emit_simple(opcode::I32_DIV_U),
            Instruction::I32RemS => b.emit_simple(opcode::I32_REM_S),
            Instruction::I32RemU => b.emit_simple(opcode::I32_REM_U),
            Instruction::I32And => b.emit_simple(opcode::I32_AND),
            Instruction::I32Or => b.emit_simple(opcode::I32_OR),
            Instruction::I32Xor => b.emit_simple(opcode::I32_XOR),
            Instruction::I32Shl => b.emit_simple(opcode::I32_SHL),
            Instruction::I32ShrS => b.emit_simple(opcode::I32_SHR_S),
            Instruction::I32ShrU => b.emit_simple(opcode::I32_SHR_U),
            other => {
                return Err(BvmError::MalformedModule(format!(
                    "unsupported instruction in this WASM subset: {:?}",
                    other
                )));
            }
        }
    }

    if !labels.is_empty() {
        return Err(BvmError::MalformedModule("function body ends with unclosed blocks".into()));
    }
    // Entry-point and internal bodies alike always terminate explicitly; a body
    // that merely falls off its own `end` (no trailing `return`) still needs one.
    b.emit_simple(opcode::RETURN);

    let (bytes, branch_fixups, call_fixups) = b.into_bytes();
    Ok(LoweredBody { bytes, branch_fixups, call_fixups })
}

fn require_empty_or_i32(bt: &BlockType) -> Result<(), BvmError> {
    match bt {
        BlockType::NoResult => Ok(()),
        BlockType::Value(ValueType::I32) => Ok(()),
        BlockType::Value(_) => Err(BvmError::MalformedModule(
            "only i32-valued or empty block/loop/if results are supported".into(),
        )),
    }
}

fn emit_branch(b: &mut CodeBuilder, labels: &mut [Label], depth: u32, opcode: u8) -> Result<(), BvmError> {
    let idx = labels
        .len()
        .checked_sub(1 + depth as usize)
        .ok_or_else(|| BvmError::MalformedModule("branch depth exceeds enclosing blocks".into()))?;
    if let LabelKind::Loop { header } = labels[idx].kind {
        b.emit_branch_known(opcode, header);
    } else {
        let at = b.emit_branch_placeholder(opcode);
        labels[idx].end_fixups.push(at);
    }
    Ok(())
}

fn emit_call(
    b: &mut CodeBuilder,
    func_index: u32,
    signatures: &[FunctionSignature],
    num_imports: u32,
    import_bindings: &[ImportBinding],
) -> Result<(), BvmError> {
    let sig = signatures
        .get(func_index as usize)
        .ok_or_else(|| BvmError::MalformedModule(format!("call to unknown function index {}", func_index)))?;
    if func_index < num_imports {
        let binding = &import_bindings[func_index as usize];
        b.emit_call_host(binding.binding_id, binding.arity, binding.has_ret);
    } else {
        let local_index = func_index - num_imports;
        b.emit_local_call(local_index, sig.params, 0);
    }
    Ok(())
}
