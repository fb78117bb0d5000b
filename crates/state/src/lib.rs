//! Persistent contract state: the variable store and its undo log, plus the
//! asset/reference/funds bookkeeping built on top of them, and the two transient
//! accumulators (funds commitment, signature aggregate) a top-level invocation
//! carries without ever persisting.

pub mod assets;
pub mod funds;
pub mod refs;
pub mod sigs;
pub mod state;
pub mod undo;
pub mod var_store;

pub use assets::{create_asset, destroy_asset, emit_asset};
pub use funds::{lock_amount, unlock_amount, FundsAccumulator};
pub use refs::{is_referenced, ref_add, ref_release};
pub use sigs::{SchnorrSignature, SignatureAccumulator};
pub use state::State;
pub use undo::{UndoAction, UndoLog};
pub use var_store::VariableStore;
