//! The result of running one `Transaction` through a `Processor`.
//!
//! Grounded in the teacher's `TransactionReceipt` (`crates/avm/src/receipt.rs`):
//! pairs the transaction with its outcome and `Display`s as a short report.
//! Redesigned around this VM's own `BvmError` and around the manager
//! persona's document as a distinct successful outcome instead of a generic
//! event log — this ABI has no logging host call, so there is nothing to
//! collect one of.

use core::fmt;

use types::{BvmError, ContractId};

use crate::doc::Document;
use crate::transaction::Transaction;

/// What a successful invocation actually produced.
#[derive(Debug, Clone)]
pub enum Success {
    /// A `Call` completed; `result` is whatever the entry method left on top
    /// of its operand stack, if anything.
    Invoked { result: Option<i32> },
    /// A `Deploy` completed; carries the freshly derived contract id so the
    /// caller can address it in later transactions.
    Deployed { cid: ContractId, result: Option<i32> },
    /// A `Destroy` completed and the contract's code record is gone.
    Destroyed { cid: ContractId },
    /// A `ManagerQuery` completed; `document` is its sole observable output.
    Queried { document: Document },
}

#[derive(Debug, Clone)]
pub struct Receipt {
    pub tx: Transaction,
    pub outcome: Result<Success, BvmError>,
    /// Charge left over when the invocation stopped, whichever way it
    /// stopped. Never increases once a run begins; not restored on failure.
    pub charge_remaining: u64,
}

impl Receipt {
    pub fn new(tx: Transaction, outcome: Result<Success, BvmError>, charge_remaining: u64) -> Self {
        Self { tx, outcome, charge_remaining }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Receipt ===")?;
        writeln!(f, "Kind: {:?}", self.tx.kind)?;
        writeln!(f, "Charge remaining: {}", self.charge_remaining)?;
        match &self.outcome {
            Ok(success) => writeln!(f, "Result: {:?}", success),
            Err(e) => writeln!(f, "Error: {}", e),
        }
    }
}
