//! The unit of work a [`crate::processor::Processor`] executes: deploy a new
//! contract, call an existing one, destroy one, or run a read-only manager
//! query.
//!
//! Grounded in the teacher's `Transaction` (`crates/avm/src/transaction.rs`):
//! a plain data struct describing one top-level invocation. Redesigned from
//! the teacher's single `Address`-addressed `(to, from, data, value, nonce)`
//! shape into the four kinds this VM actually distinguishes at the processor
//! boundary — each drives `vm::Vm::invoke` differently (see
//! `crate::processor`), and only `Deploy`/`Call`/`Destroy` may carry a
//! finalizing signature; a manager query never touches the funds or
//! signature accumulators.

use types::ContractId;

use crate::doc::RequestDocument;

#[derive(Debug, Clone)]
pub enum TransactionKind {
    /// Compiles `code` (a WASM module), derives its `ContractId` from the
    /// code and `ctor_args`, and runs the constructor.
    Deploy { code: Vec<u8>, ctor_args: Vec<u8> },
    /// Runs an existing contract's method `method_index`. Must be 2 or
    /// greater — index 0 is the constructor and 1 the destructor, neither
    /// reachable this way.
    Call { cid: ContractId, method_index: u32, args: Vec<u8> },
    /// Runs an existing contract's destructor, provided nothing still
    /// references it, and removes its code record on success.
    Destroy { cid: ContractId },
    /// Runs an existing contract's method through the read-only manager
    /// persona, returning a `Document` instead of mutating state.
    ManagerQuery { cid: ContractId, method_index: u32, request: RequestDocument },
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub kind: TransactionKind,
    /// The charge budget this invocation may spend before `ChargeExceeded`.
    pub charge_budget: u64,
    /// The message a finalizing signature closes over, alongside the
    /// outstanding funds commitment.
    pub message: Vec<u8>,
    pub signature: Option<state::SchnorrSignature>,
}

impl Transaction {
    pub fn deploy(code: Vec<u8>, ctor_args: Vec<u8>, charge_budget: u64) -> Self {
        Self {
            kind: TransactionKind::Deploy { code, ctor_args },
            charge_budget,
            message: Vec::new(),
            signature: None,
        }
    }

    pub fn call(cid: ContractId, method_index: u32, args: Vec<u8>, charge_budget: u64) -> Self {
        Self {
            kind: TransactionKind::Call { cid, method_index, args },
            charge_budget,
            message: Vec::new(),
            signature: None,
        }
    }

    pub fn destroy(cid: ContractId, charge_budget: u64) -> Self {
        Self {
            kind: TransactionKind::Destroy { cid },
            charge_budget,
            message: Vec::new(),
            signature: None,
        }
    }

    pub fn manager_query(cid: ContractId, method_index: u32, request: RequestDocument, charge_budget: u64) -> Self {
        Self {
            kind: TransactionKind::ManagerQuery { cid, method_index, request },
            charge_budget,
            message: Vec::new(),
            signature: None,
        }
    }

    /// Attaches the finalizing signature and the message it closes over.
    /// Meaningless on a `ManagerQuery`, which never arms the signature or
    /// funds accumulators.
    pub fn signed(mut self, message: Vec<u8>, signature: state::SchnorrSignature) -> Self {
        self.message = message;
        self.signature = Some(signature);
        self
    }
}
