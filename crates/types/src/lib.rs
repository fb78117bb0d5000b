//! Shared identifiers, keys, limits, host-ABI table and error types for BVM2.
//!
//! This crate has no knowledge of storage or execution; it is the leaf every
//! other crate in the workspace depends on.

pub mod error;
pub mod host_abi;
pub mod ids;
pub mod limits;
pub mod varkey;

pub use error::BvmError;
pub use host_abi::{HostOp, TypeCode, HOST_ABI_TABLE};
pub use ids::{AssetId, ContractId, PeerId, ShaderId};
pub use limits::Limits;
pub use varkey::{VarKey, VarTag};
