//! The fatal error kinds a contract invocation can fail with. Every one terminates the
//! current top-level invocation and triggers an undo-log rewind; there is no
//! in-contract recovery, so this enum is deliberately flat rather than a tree of
//! nested causes.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BvmError {
    #[error("malformed module: {0}")]
    MalformedModule(String),

    #[error("link error: {0}")]
    LinkError(String),

    #[error("bounds violation: {0}")]
    BoundsViolation(String),

    #[error("charge exceeded")]
    ChargeExceeded,

    #[error("contract called Halt")]
    Halt,

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("block at height {height} is not ready (current tip is earlier)")]
    BlockNotReady { height: u64 },

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("far-call stack exceeded depth {max}")]
    FarCallTooDeep { max: usize },
}
