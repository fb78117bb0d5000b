//! The interpreter core: drives a far-call frame's instruction stream, dispatches
//! `CallHost` against the host ABI table, and recurses into nested far calls.
//!
//! Everything consensus-critical outside "decode one instruction, apply it to this
//! frame" lives behind the `HostInterface`/`Metering` seams so this module never
//! touches storage, asset bookkeeping, or a concrete charge schedule directly.

use types::{AssetId, BvmError, ContractId, HostOp, Limits, TypeCode};

use crate::frame::{FarCallFrame, FarCallStack, LocalCallFrame};
use crate::host_interface::HostInterface;
use crate::instr::Instr;
use crate::metering::{MeterResult, Metering};
use crate::module::Module;

/// Fixed length of a SEC1-compressed secp256k1 public key, the only encoding
/// `Env_AddSig` accepts (there is no length argument in its ABI entry).
const PUBKEY_LEN: u32 = 33;

/// Result of a completed top-level (or nested far-call) invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The value left on the operand stack, if any, when the far-call frame's
    /// outermost method returned.
    Completed { result: Option<i32> },
}

enum StepResult {
    Continue,
    Returned(Outcome),
}

/// Owns the far-call stack and drives execution. Stateless beyond that: all
/// persistent effects go through the `HostInterface` passed into `invoke`.
#[derive(Debug)]
pub struct Vm {
    limits: Limits,
    far_calls: FarCallStack,
    code_stack: Vec<Module>,
}

impl Vm {
    pub fn new(limits: Limits) -> Self {
        Self {
            limits,
            far_calls: FarCallStack::new(),
            code_stack: Vec::new(),
        }
    }

    /// Loads `cid`'s module, starts a fresh far-call frame at `method_index`, and
    /// drives it to completion (including any nested far calls it makes).
    pub fn invoke(
        &mut self,
        cid: ContractId,
        method_index: u32,
        args: &[u8],
        host: &mut dyn HostInterface,
        meter: &mut dyn Metering,
    ) -> Result<Outcome, BvmError> {
        self.push_far_call(cid, method_index, args, host)?;
        let outcome = self.run_current_frame(host, meter);
        log::trace!("far call into {} method {} exited: {:?}", cid, method_index, outcome.is_ok());
        self.far_calls.pop();
        self.code_stack.pop();
        outcome
    }

    fn push_far_call(
        &mut self,
        cid: ContractId,
        method_index: u32,
        args: &[u8],
        host: &mut dyn HostInterface,
    ) -> Result<(), BvmError> {
        log::trace!(
            "far call entry: {} method {} at depth {}",
            cid,
            method_index,
            self.far_calls.depth()
        );
        let code = host.load_contract_code(cid)?;
        let module = Module::parse(&code)?;
        let entry = module
            .method_offset(method_index)
            .ok_or_else(|| BvmError::LinkError(format!("contract has no method {}", method_index)))?;

        let mut frame = FarCallFrame::new(cid, module.data(), &self.limits);
        // The entry method receives a single argument: a pointer to the caller-supplied
        // blob. The blob is placed right after the module's own data section and is
        // self-describing — a little-endian u32 length prefix followed by the bytes —
        // since there is no second "length" local to carry it separately. The entry
        // method sees that pointer as local 0, the outermost call having no
        // `LocalCallFrame` (locals_base is 0).
        let arg_offset = module.data().len();
        let available = frame.memory.len().saturating_sub(arg_offset + 4);
        let arg_len = args.len().min(available);
        frame.memory[arg_offset..arg_offset + 4].copy_from_slice(&(arg_len as u32).to_le_bytes());
        frame.memory[arg_offset + 4..arg_offset + 4 + arg_len].copy_from_slice(&args[..arg_len]);
        frame.push(&self.limits, arg_offset as i32)?;
        frame.pc = entry;

        self.far_calls.push(&self.limits, frame)?;
        self.code_stack.push(module);
        Ok(())
    }

    fn run_current_frame(&mut self, host: &mut dyn HostInterface, meter: &mut dyn Metering) -> Result<Outcome, BvmError> {
        loop {
            let pc = self.far_calls.current().expect("frame exists while running").pc as usize;
            let instr = *self
                .code_stack
                .last()
                .expect("module exists while running")
                .code()
                .get(pc)
                .ok_or_else(|| BvmError::BoundsViolation(format!("program counter {} out of range", pc)))?;

            if let MeterResult::Halt = meter.on_instruction(pc as u32, &instr) {
                return Err(BvmError::ChargeExceeded);
            }

            if let StepResult::Returned(outcome) = self.step(instr, host, meter)? {
                return Ok(outcome);
            }
        }
    }

    fn frame_mut(&mut self) -> &mut FarCallFrame {
        self.far_calls.current_mut().expect("frame exists while stepping")
    }

    fn unop(&mut self, f: impl FnOnce(i32) -> i32) -> Result<(), BvmError> {
        let limits = self.limits;
        let frame = self.frame_mut();
        let a = frame.pop()?;
        frame.push(&limits, f(a))?;
        frame.pc += 1;
        Ok(())
    }

    fn binop(&mut self, f: impl FnOnce(i32, i32) -> i32) -> Result<(), BvmError> {
        let limits = self.limits;
        let frame = self.frame_mut();
        let b = frame.pop()?;
        let a = frame.pop()?;
        frame.push(&limits, f(a, b))?;
        frame.pc += 1;
        Ok(())
    }

    fn binop_fallible(&mut self, f: impl FnOnce(i32, i32) -> Result<i32, BvmError>) -> Result<(), BvmError> {
        let limits = self.limits;
        let frame = self.frame_mut();
        let b = frame.pop()?;
        let a = frame.pop()?;
        let v = f(a, b)?;
        let frame = self.frame_mut();
        frame.push(&limits, v)?;
        frame.pc += 1;
        Ok(())
    }

    fn step(&mut self, instr: Instr, host: &mut dyn HostInterface, meter: &mut dyn Metering) -> Result<StepResult, BvmError> {
        use Instr::*;
        let limits = self.limits;
        match instr {
            I32Const(v) => {
                let frame = self.frame_mut();
                frame.push(&limits, v)?;
                frame.pc += 1;
            }
            I32Add => self.binop(|a, b| a.wrapping_add(b))?,
            I32Sub => self.binop(|a, b| a.wrapping_sub(b))?,
            I32Mul => self.binop(|a, b| a.wrapping_mul(b))?,
            I32DivU => self.binop_fallible(|a, b| {
                if b == 0 {
                    return Err(BvmError::InvariantViolation("division by zero".into()));
                }
                Ok(((a as u32) / (b as u32)) as i32)
            })?,
            I32DivS => self.binop_fallible(|a, b| {
                if b == 0 {
                    return Err(BvmError::InvariantViolation("division by zero".into()));
                }
                a.checked_div(b)
                    .ok_or_else(|| BvmError::InvariantViolation("signed division overflow".into()))
            })?,
            I32RemU => self.binop_fallible(|a, b| {
                if b == 0 {
                    return Err(BvmError::InvariantViolation("division by zero".into()));
                }
                Ok(((a as u32) % (b as u32)) as i32)
            })?,
            I32RemS => self.binop_fallible(|a, b| {
                if b == 0 {
                    return Err(BvmError::InvariantViolation("division by zero".into()));
                }
                Ok(a.checked_rem(b).unwrap_or(0))
            })?,
            I32And => self.binop(|a, b| a & b)?,
            I32Or => self.binop(|a, b| a | b)?,
            I32Xor => self.binop(|a, b| a ^ b)?,
            I32Shl => self.binop(|a, b| a.wrapping_shl(b as u32))?,
            I32ShrU => self.binop(|a, b| (a as u32).wrapping_shr(b as u32) as i32)?,
            I32ShrS => self.binop(|a, b| a.wrapping_shr(b as u32))?,
            I32Eqz => self.unop(|a| (a == 0) as i32)?,
            I32Eq => self.binop(|a, b| (a == b) as i32)?,
            I32Ne => self.binop(|a, b| (a != b) as i32)?,
            I32LtU => self.binop(|a, b| ((a as u32) < (b as u32)) as i32)?,
            I32LtS => self.binop(|a, b| (a < b) as i32)?,
            I32GtU => self.binop(|a, b| ((a as u32) > (b as u32)) as i32)?,
            I32GtS => self.binop(|a, b| (a > b) as i32)?,
            I32LeU => self.binop(|a, b| ((a as u32) <= (b as u32)) as i32)?,
            I32LeS => self.binop(|a, b| (a <= b) as i32)?,
            I32GeU => self.binop(|a, b| ((a as u32) >= (b as u32)) as i32)?,
            I32GeS => self.binop(|a, b| (a >= b) as i32)?,
            LocalGet(i) => {
                let frame = self.frame_mut();
                let base = frame.call_stack.last().map(|l| l.locals_base).unwrap_or(0);
                let idx = base + i as usize;
                let value = *frame
                    .stack
                    .get(idx)
                    .ok_or_else(|| BvmError::BoundsViolation(format!("local {} out of range", i)))?;
                frame.push(&limits, value)?;
                frame.pc += 1;
            }
            LocalSet(i) => {
                let frame = self.frame_mut();
                let base = frame.call_stack.last().map(|l| l.locals_base).unwrap_or(0);
                let idx = base + i as usize;
                let value = frame.pop()?;
                if idx >= frame.stack.len() {
                    return Err(BvmError::BoundsViolation(format!("local {} out of range", i)));
                }
                frame.stack[idx] = value;
                frame.pc += 1;
            }
            LocalTee(i) => {
                let frame = self.frame_mut();
                let base = frame.call_stack.last().map(|l| l.locals_base).unwrap_or(0);
                let idx = base + i as usize;
                let value = *frame
                    .stack
                    .last()
                    .ok_or_else(|| BvmError::BoundsViolation("operand stack empty for LocalTee".into()))?;
                if idx >= frame.stack.len() {
                    return Err(BvmError::BoundsViolation(format!("local {} out of range", i)));
                }
                frame.stack[idx] = value;
                frame.pc += 1;
            }
            I32Load(offset) => {
                let frame = self.frame_mut();
                let addr = frame.pop()? as u32;
                let addr = addr
                    .checked_add(offset)
                    .ok_or_else(|| BvmError::BoundsViolation("load address overflowed".into()))?;
                let bytes = frame.mem_slice(addr, 4)?;
                let value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                frame.push(&limits, value)?;
                frame.pc += 1;
            }
            I32Store(offset) => {
                let frame = self.frame_mut();
                let value = frame.pop()?;
                let addr = frame.pop()? as u32;
                let addr = addr
                    .checked_add(offset)
                    .ok_or_else(|| BvmError::BoundsViolation("store address overflowed".into()))?;
                frame.mem_slice_mut(addr, 4)?.copy_from_slice(&value.to_le_bytes());
                frame.pc += 1;
            }
            Drop => {
                let frame = self.frame_mut();
                frame.pop()?;
                frame.pc += 1;
            }
            Jump(target) => {
                self.frame_mut().pc = target;
            }
            JumpIfZero(target) => {
                let frame = self.frame_mut();
                let v = frame.pop()?;
                frame.pc = if v == 0 { target } else { frame.pc + 1 };
            }
            JumpIfNonZero(target) => {
                let frame = self.frame_mut();
                let v = frame.pop()?;
                frame.pc = if v != 0 { target } else { frame.pc + 1 };
            }
            Call { target, arity, locals } => {
                if let MeterResult::Halt = meter.on_call(false) {
                    return Err(BvmError::ChargeExceeded);
                }
                let frame = self.frame_mut();
                let locals_base = frame
                    .stack
                    .len()
                    .checked_sub(arity as usize)
                    .ok_or_else(|| BvmError::BoundsViolation("call arity exceeds operand stack".into()))?;
                for _ in 0..locals {
                    frame.push(&limits, 0)?;
                }
                let return_pc = frame.pc + 1;
                frame.call_stack.push(LocalCallFrame { return_pc, locals_base });
                frame.pc = target;
            }
            Return => {
                let frame = self.frame_mut();
                match frame.call_stack.pop() {
                    Some(local) => {
                        let ret_value = frame.stack.pop();
                        frame.stack.truncate(local.locals_base);
                        if let Some(v) = ret_value {
                            frame.stack.push(v);
                        }
                        frame.pc = local.return_pc;
                    }
                    None => {
                        let result = frame.stack.last().copied();
                        return Ok(StepResult::Returned(Outcome::Completed { result }));
                    }
                }
            }
            CallHost { binding_id, arity, has_ret } => {
                return self.dispatch_host(binding_id, arity, has_ret, host, meter);
            }
            Unreachable => return Err(BvmError::InvariantViolation("unreachable instruction executed".into())),
        }
        Ok(StepResult::Continue)
    }

    fn dispatch_host(
        &mut self,
        binding_id: u32,
        arity: u32,
        has_ret: bool,
        host: &mut dyn HostInterface,
        meter: &mut dyn Metering,
    ) -> Result<StepResult, BvmError> {
        let entry = types::HOST_ABI_TABLE
            .iter()
            .find(|e| e.binding_id == binding_id)
            .ok_or_else(|| BvmError::LinkError(format!("unknown host binding id {}", binding_id)))?;

        let expected_arity: u32 = entry
            .args
            .iter()
            .map(|t| match t {
                TypeCode::I32 => 1,
                TypeCode::I64 => 2,
            })
            .sum();
        if arity != expected_arity || has_ret != entry.ret.is_some() {
            return Err(BvmError::MalformedModule(format!(
                "CallHost signature mismatch for {}",
                entry.name
            )));
        }

        if let MeterResult::Halt = meter.on_host_call(binding_id) {
            return Err(BvmError::ChargeExceeded);
        }

        let limits = self.limits;
        let cid = self.far_calls.current().expect("frame exists while dispatching").contract_id;

        match entry.op {
            HostOp::MemCpy => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (dst, src, len) = (a[0].as_u32(), a[1].as_u32(), a[2].as_u32());
                let data = frame.mem_slice(src, len)?.to_vec();
                frame.mem_slice_mut(dst, len)?.copy_from_slice(&data);
            }
            HostOp::MemSet => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (dst, val, len) = (a[0].as_u32(), a[1].as_i32(), a[2].as_u32());
                frame.mem_slice_mut(dst, len)?.fill((val & 0xff) as u8);
            }
            HostOp::MemCmp => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (pa, pb, len) = (a[0].as_u32(), a[1].as_u32(), a[2].as_u32());
                let sa = frame.mem_slice(pa, len)?.to_vec();
                let sb = frame.mem_slice(pb, len)?;
                let result = match sa.as_slice().cmp(sb) {
                    std::cmp::Ordering::Less => -1,
                    std::cmp::Ordering::Equal => 0,
                    std::cmp::Ordering::Greater => 1,
                };
                frame.push(&limits, result)?;
            }
            HostOp::MemIs0 => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (ptr, len) = (a[0].as_u32(), a[1].as_u32());
                let is_zero = frame.mem_slice(ptr, len)?.iter().all(|&b| b == 0);
                frame.push(&limits, is_zero as i32)?;
            }
            HostOp::LoadVar => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (key_ptr, key_len, out_ptr, out_cap) = (a[0].as_u32(), a[1].as_u32(), a[2].as_u32(), a[3].as_u32());
                let key = frame.mem_slice(key_ptr, key_len)?.to_vec();
                let value = host.load_var(cid, &key);
                if let MeterResult::Halt = meter.on_load_var(value.len()) {
                    return Err(BvmError::ChargeExceeded);
                }
                let frame = self.frame_mut();
                let n = (value.len() as u32).min(out_cap);
                frame.mem_slice_mut(out_ptr, n)?.copy_from_slice(&value[..n as usize]);
                frame.push(&limits, value.len() as i32)?;
            }
            HostOp::SaveVar => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (key_ptr, key_len, val_ptr, val_len) = (a[0].as_u32(), a[1].as_u32(), a[2].as_u32(), a[3].as_u32());
                let key = frame.mem_slice(key_ptr, key_len)?.to_vec();
                let value = frame.mem_slice(val_ptr, val_len)?.to_vec();
                if let MeterResult::Halt = meter.on_save_var(value.len()) {
                    return Err(BvmError::ChargeExceeded);
                }
                host.save_var(cid, key, value)?;
            }
            HostOp::Halt => return Err(BvmError::Halt),
            HostOp::AddSig => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let ptr = a[0].as_u32();
                let pubkey = frame.mem_slice(ptr, PUBKEY_LEN)?.to_vec();
                host.add_sig(&pubkey)?;
            }
            HostOp::FundsLock => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (amount, aid) = (a[0].as_i64() as u64, a[1].as_u32());
                host.funds_lock(cid, AssetId(aid), amount)?;
            }
            HostOp::FundsUnlock => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (amount, aid) = (a[0].as_i64() as u64, a[1].as_u32());
                host.funds_unlock(cid, AssetId(aid), amount)?;
            }
            HostOp::RefAdd => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let target = read_contract_id(frame, a[0].as_u32())?;
                host.ref_add(cid, target)?;
            }
            HostOp::RefRelease => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let target = read_contract_id(frame, a[0].as_u32())?;
                host.ref_release(cid, target)?;
            }
            HostOp::AssetCreate => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (meta_ptr, meta_len) = (a[0].as_u32(), a[1].as_u32());
                let metadata = frame.mem_slice(meta_ptr, meta_len)?.to_vec();
                let (aid, _owner) = host.asset_create(cid, &metadata)?;
                let frame = self.frame_mut();
                frame.push(&limits, aid.0 as i32)?;
            }
            HostOp::AssetEmit => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (aid, delta) = (a[0].as_u32(), a[1].as_i64());
                let ok = host.asset_emit(cid, AssetId(aid), delta)?;
                let frame = self.frame_mut();
                frame.push(&limits, ok as i32)?;
            }
            HostOp::AssetDestroy => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let aid = a[0].as_u32();
                let ok = host.asset_destroy(cid, AssetId(aid))?;
                let frame = self.frame_mut();
                frame.push(&limits, ok as i32)?;
            }
            HostOp::CallFar => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (target_ptr, method_index, arg_ptr, arg_len) =
                    (a[0].as_u32(), a[1].as_u32(), a[2].as_u32(), a[3].as_u32());
                if method_index < 2 {
                    return Err(BvmError::LinkError(
                        "CallFar may not target the constructor or destructor".into(),
                    ));
                }
                let target = read_contract_id(frame, target_ptr)?;
                let call_args = frame.mem_slice(arg_ptr, arg_len)?.to_vec();
                if let MeterResult::Halt = meter.on_call(true) {
                    return Err(BvmError::ChargeExceeded);
                }
                self.push_far_call(target, method_index, &call_args, host)?;
                let result = self.run_current_frame(host, meter);
                self.far_calls.pop();
                self.code_stack.pop();
                result?;
                let frame = self.frame_mut();
                frame.push(&limits, 1)?;
            }
            HostOp::GetHdr => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (height, out_ptr) = (a[0].as_i64() as u32, a[1].as_u32());
                let value = host.get_hdr(height)?;
                let frame = self.frame_mut();
                frame.mem_slice_mut(out_ptr, 8)?.copy_from_slice(&value.to_le_bytes());
                frame.push(&limits, 1)?;
            }
            HostOp::VarsEnum => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (kmin_ptr, kmin_len, kmax_ptr, kmax_len) =
                    (a[0].as_u32(), a[1].as_u32(), a[2].as_u32(), a[3].as_u32());
                let k_min = frame.mem_slice(kmin_ptr, kmin_len)?.to_vec();
                let k_max = frame.mem_slice(kmax_ptr, kmax_len)?.to_vec();
                host.vars_enum(cid, &k_min, &k_max);
            }
            HostOp::VarsMoveNext => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (key_ptr, key_cap, val_ptr, val_cap) =
                    (a[0].as_u32(), a[1].as_u32(), a[2].as_u32(), a[3].as_u32());
                match host.vars_move_next(0) {
                    Some((key, value)) => {
                        let frame = self.frame_mut();
                        let kn = (key.len() as u32).min(key_cap);
                        frame.mem_slice_mut(key_ptr, kn)?.copy_from_slice(&key[..kn as usize]);
                        let vn = (value.len() as u32).min(val_cap);
                        frame.mem_slice_mut(val_ptr, vn)?.copy_from_slice(&value[..vn as usize]);
                        frame.push(&limits, 1)?;
                    }
                    None => {
                        let frame = self.frame_mut();
                        frame.push(&limits, 0)?;
                    }
                }
            }
            HostOp::DocGroup => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                host.doc_group(&a[0].as_u32().to_le_bytes());
            }
            HostOp::DocArray => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                host.doc_array(&a[0].as_u32().to_le_bytes());
            }
            HostOp::DocAddText => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (name, text_ptr) = (a[0].as_u32(), a[1].as_u32());
                let text = read_cstr(frame, text_ptr)?;
                host.doc_add_text(&name.to_le_bytes(), &text);
            }
            HostOp::DocAddBlob => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (name, blob_ptr, blob_len) = (a[0].as_u32(), a[1].as_u32(), a[2].as_u32());
                let blob = frame.mem_slice(blob_ptr, blob_len)?.to_vec();
                host.doc_add_blob(&name.to_le_bytes(), &blob);
            }
            HostOp::DocAddNum32 => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (name, value) = (a[0].as_u32(), a[1].as_i32());
                host.doc_add_num32(&name.to_le_bytes(), value);
            }
            HostOp::DocAddNum64 => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (name, value) = (a[0].as_u32(), a[1].as_i64());
                host.doc_add_num64(&name.to_le_bytes(), value);
            }
            HostOp::DocGetText => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (name, out_ptr, out_cap) = (a[0].as_u32(), a[1].as_u32(), a[2].as_u32());
                let found = host.doc_get_text(&name.to_le_bytes());
                self.write_doc_bytes(found, out_ptr, out_cap)?;
            }
            HostOp::DocGetBlob => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let (name, out_ptr, out_cap) = (a[0].as_u32(), a[1].as_u32(), a[2].as_u32());
                let found = host.doc_get_blob(&name.to_le_bytes());
                self.write_doc_bytes(found, out_ptr, out_cap)?;
            }
            HostOp::DocGetNum32 => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let value = host.doc_get_num32(&a[0].as_u32().to_le_bytes()).unwrap_or(0);
                let frame = self.frame_mut();
                frame.push(&limits, value)?;
            }
            HostOp::DocGetNum64 => {
                let frame = self.frame_mut();
                let a = pop_args(frame, entry.args)?;
                let value = host.doc_get_num64(&a[0].as_u32().to_le_bytes()).unwrap_or(0);
                // I64 results don't fit the single-word push the rest of the ABI uses;
                // push the two words low-then-high, mirroring the I64 argument
                // convention `pop_args` unpacks above.
                let frame = self.frame_mut();
                frame.push(&limits, (value & 0xffff_ffff) as i32)?;
                frame.push(&limits, ((value >> 32) & 0xffff_ffff) as i32)?;
            }
        }

        self.frame_mut().pc += 1;
        Ok(StepResult::Continue)
    }

    fn write_doc_bytes(&mut self, found: Option<Vec<u8>>, out_ptr: u32, out_cap: u32) -> Result<(), BvmError> {
        let limits = self.limits;
        match found {
            Some(bytes) => {
                let frame = self.frame_mut();
                let n = (bytes.len() as u32).min(out_cap);
                frame.mem_slice_mut(out_ptr, n)?.copy_from_slice(&bytes[..n as usize]);
                frame.push(&limits, bytes.len() as i32)?;
            }
            None => {
                let frame = self.frame_mut();
                frame.push(&limits, -1)?;
            }
        }
        Ok(())
    }
}

/// Marshaled host-call argument: a plain i32, or an i64 reassembled from the two i32
/// stack words the compiler pushed for it (low word first, high word second — the
/// same order `Env_DocGetNum64`'s result is pushed back in).
enum HostValue {
    I32(i32),
    I64(i64),
}

impl HostValue {
    fn as_i32(&self) -> i32 {
        match *self {
            HostValue::I32(v) => v,
            HostValue::I64(v) => v as i32,
        }
    }
    fn as_u32(&self) -> u32 {
        self.as_i32() as u32
    }
    fn as_i64(&self) -> i64 {
        match *self {
            HostValue::I64(v) => v,
            HostValue::I32(v) => v as i64,
        }
    }
}

/// Pops `types.len()` logical arguments off `frame`'s operand stack, in the order
/// they were declared (and originally pushed) rather than LIFO pop order.
fn pop_args(frame: &mut FarCallFrame, types: &[TypeCode]) -> Result<Vec<HostValue>, BvmError> {
    let mut out = Vec::with_capacity(types.len());
    for &ty in types.iter().rev() {
        let value = match ty {
            TypeCode::I32 => HostValue::I32(frame.pop()?),
            TypeCode::I64 => {
                let high = frame.pop()? as u32;
                let low = frame.pop()? as u32;
                HostValue::I64((((high as u64) << 32) | low as u64) as i64)
            }
        };
        out.push(value);
    }
    out.reverse();
    Ok(out)
}

fn read_contract_id(frame: &FarCallFrame, ptr: u32) -> Result<ContractId, BvmError> {
    let bytes = frame.mem_slice(ptr, 32)?;
    let mut arr = [0u8; 32];
    arr.copy_from_slice(bytes);
    Ok(ContractId::new(arr))
}

fn read_cstr(frame: &FarCallFrame, ptr: u32) -> Result<Vec<u8>, BvmError> {
    let rest = frame
        .memory
        .get(ptr as usize..)
        .ok_or_else(|| BvmError::BoundsViolation("string pointer out of bounds".into()))?;
    let len = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| BvmError::BoundsViolation("unterminated string".into()))?;
    Ok(rest[..len].to_vec())
}
