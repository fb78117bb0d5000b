//! The top-level invocation driver: checkpoints state, runs one transaction
//! through `vm::Vm`, and either commits or rolls back whole.
//!
//! Grounded in the teacher's `AVM` orchestrator (`crates/avm/src/avm.rs`),
//! which played the same role — the single entry point a caller submits a
//! transaction to — but was built around a page-table memory manager and an
//! open-ended gas counter this VM has no equivalent of. What survives is the
//! shape: one struct owning the state a run touches, one method per
//! transaction kind, checkpoint before, commit-or-rollback after.

use types::{BvmError, ContractId, Limits, VarKey};

use crate::charge::{ChargeMeter, ChargeSchedule};
use crate::host::{BlockHeaderProvider, Host};
use crate::receipt::{Receipt, Success};
use crate::transaction::{Transaction, TransactionKind};

/// Drives transactions against one `state::State`, one block header view,
/// and one charge schedule. Built fresh (or reused) per top-level
/// invocation; nothing here outlives the borrow of `state` it holds.
pub struct Processor<'a> {
    state: &'a mut state::State,
    headers: &'a dyn BlockHeaderProvider,
    schedule: ChargeSchedule,
    limits: Limits,
}

impl<'a> Processor<'a> {
    pub fn new(state: &'a mut state::State, headers: &'a dyn BlockHeaderProvider) -> Self {
        Self {
            state,
            headers,
            schedule: ChargeSchedule::default(),
            limits: Limits::default(),
        }
    }

    pub fn with_schedule(mut self, schedule: ChargeSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Runs `tx` to completion. Always returns a `Receipt` — a failed
    /// invocation is reported, not propagated as a Rust error, since the
    /// whole point of the checkpoint/rollback machinery is that a failure is
    /// an ordinary, fully-handled outcome.
    pub fn submit(&mut self, tx: Transaction) -> Receipt {
        let checkpoint = self.state.checkpoint();
        let mut meter = ChargeMeter::new(self.schedule, tx.charge_budget);

        let outcome = self.run(&tx, &mut meter).and_then(|success| {
            self.finalize_signature(&tx)?;
            Ok(success)
        });

        match &outcome {
            Ok(_) => self.state.finish_invocation(),
            Err(_) => self.state.rollback(checkpoint),
        }

        Receipt::new(tx, outcome, meter.remaining())
    }

    /// Every top-level invocation that isn't a read-only query must close
    /// its books: any `AddSig` calls made during the run must verify against
    /// the supplied signature, and if none was supplied, the run had better
    /// not have locked or unlocked any funds or collected any keys in the
    /// first place.
    fn finalize_signature(&self, tx: &Transaction) -> Result<(), BvmError> {
        if matches!(tx.kind, TransactionKind::ManagerQuery { .. }) {
            return Ok(());
        }
        match &tx.signature {
            Some(sig) => self.state.sigs.finalize(&tx.message, self.state.funds.commitment(), sig),
            None if self.state.sigs.is_empty() && self.state.funds.is_balanced() => Ok(()),
            None => Err(BvmError::SignatureInvalid),
        }
    }

    fn run(&mut self, tx: &Transaction, meter: &mut ChargeMeter) -> Result<Success, BvmError> {
        match &tx.kind {
            TransactionKind::Deploy { code, ctor_args } => self.run_deploy(code, ctor_args, meter),
            TransactionKind::Call { cid, method_index, args } => self.run_call(*cid, *method_index, args, meter),
            TransactionKind::Destroy { cid } => self.run_destroy(*cid, meter),
            TransactionKind::ManagerQuery { cid, method_index, request } => {
                self.run_query(*cid, *method_index, request.clone(), meter)
            }
        }
    }

    /// Runs `method_index` on `cid` through a fresh `Host`/`Vm` pair and
    /// unwraps the single `Outcome` variant the interpreter ever produces.
    fn invoke(&mut self, cid: ContractId, method_index: u32, args: &[u8], meter: &mut ChargeMeter) -> Result<Option<i32>, BvmError> {
        let mut host = Host::new(self.state, self.headers, self.schedule);
        let mut vm = vm::Vm::new(self.limits);
        let vm::Outcome::Completed { result } = vm.invoke(cid, method_index, args, &mut host, meter)?;
        Ok(result)
    }

    fn run_deploy(&mut self, code: &[u8], ctor_args: &[u8], meter: &mut ChargeMeter) -> Result<Success, BvmError> {
        let compiled = compiler::compile(code)?;
        let cid = ContractId::derive(&compiled, ctor_args);
        let key = VarKey::code_record(cid);
        if self.state.vars.exists(&key) {
            return Err(BvmError::LinkError(format!("a contract is already deployed at {}", cid)));
        }
        let prev = self.state.vars.write_or_delete(&key, &compiled)?;
        self.state.undo.push(state::UndoAction::VarWrite { key: key.to_bytes(), prev });

        let result = self.invoke(cid, vm::module::METHOD_CTOR, ctor_args, meter)?;
        Ok(Success::Deployed { cid, result })
    }

    fn run_call(&mut self, cid: ContractId, method_index: u32, args: &[u8], meter: &mut ChargeMeter) -> Result<Success, BvmError> {
        if method_index < 2 {
            return Err(BvmError::LinkError(
                "method 0 and 1 are the constructor and destructor; use Deploy or Destroy".into(),
            ));
        }
        let result = self.invoke(cid, method_index, args, meter)?;
        Ok(Success::Invoked { result })
    }

    fn run_destroy(&mut self, cid: ContractId, meter: &mut ChargeMeter) -> Result<Success, BvmError> {
        if state::is_referenced(&self.state.vars, cid) {
            return Err(BvmError::InvariantViolation(format!(
                "{} is still referenced by another contract",
                cid
            )));
        }
        self.invoke(cid, vm::module::METHOD_DTOR, &[], meter)?;

        let key = VarKey::code_record(cid);
        let prev = self.state.vars.write_or_delete(&key, &[])?;
        self.state.undo.push(state::UndoAction::VarWrite { key: key.to_bytes(), prev });
        Ok(Success::Destroyed { cid })
    }

    fn run_query(
        &mut self,
        cid: ContractId,
        method_index: u32,
        request: crate::doc::RequestDocument,
        meter: &mut ChargeMeter,
    ) -> Result<Success, BvmError> {
        if method_index < 2 {
            return Err(BvmError::LinkError(
                "method 0 and 1 are the constructor and destructor; neither is queryable".into(),
            ));
        }
        let mut host = Host::new(self.state, self.headers, self.schedule).read_only(request);
        let mut vm = vm::Vm::new(self.limits);
        vm.invoke(cid, method_index, &[], &mut host, meter)?;
        Ok(Success::Queried { document: host.response.into_document() })
    }
}
