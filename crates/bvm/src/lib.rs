//! BVM2: a deterministic smart-contract virtual machine. This crate is the
//! top-level processor — it owns the host ABI implementation, the charge
//! meter, and the transaction/receipt shapes a caller actually submits work
//! through. The lower crates (`vm`, `compiler`, `state`, `storage`, `types`)
//! never see a transaction; they only see far calls, modules, and variable
//! keys.

pub mod charge;
pub mod doc;
pub mod host;
pub mod processor;
pub mod receipt;
pub mod transaction;

pub use charge::{ChargeMeter, ChargeSchedule};
pub use doc::{Document, RequestDocument};
pub use host::{BlockHeaderProvider, FixedHeaders, Host};
pub use processor::Processor;
pub use receipt::{Receipt, Success};
pub use transaction::{Transaction, TransactionKind};
