//! Everything the interpreter delegates to the surrounding processor: persistent
//! state, asset/funds/reference bookkeeping, signature accumulation, far-call code
//! lookup, and the manager persona's variable enumeration and document builder.
//!
//! Pure memory operations (`MemCpy`, `MemSet`, `MemCmp`, `MemIs0`) are handled by the
//! interpreter directly against the current frame's linear memory and never reach
//! this trait — they touch no state outside the frame, so routing them through a
//! host call would only add indirection.

use std::fmt::Debug;
use types::{AssetId, BvmError, ContractId, PeerId};

pub trait HostInterface: Debug {
    fn load_var(&mut self, cid: ContractId, subkey: &[u8]) -> Vec<u8>;
    fn save_var(&mut self, cid: ContractId, subkey: Vec<u8>, value: Vec<u8>) -> Result<(), BvmError>;

    fn add_sig(&mut self, pubkey: &[u8]) -> Result<(), BvmError>;

    fn funds_lock(&mut self, cid: ContractId, aid: AssetId, amount: u64) -> Result<(), BvmError>;
    fn funds_unlock(&mut self, cid: ContractId, aid: AssetId, amount: u64) -> Result<(), BvmError>;

    fn ref_add(&mut self, cid: ContractId, target: ContractId) -> Result<(), BvmError>;
    fn ref_release(&mut self, cid: ContractId, target: ContractId) -> Result<(), BvmError>;

    fn asset_create(&mut self, cid: ContractId, metadata: &[u8]) -> Result<(AssetId, PeerId), BvmError>;
    fn asset_emit(&mut self, cid: ContractId, aid: AssetId, delta: i64) -> Result<bool, BvmError>;
    fn asset_destroy(&mut self, cid: ContractId, aid: AssetId) -> Result<bool, BvmError>;

    /// Fetches the raw module bytes for a far-call target. The interpreter itself
    /// owns parsing, frame setup, depth capping and the constructor/destructor
    /// driver-boundary check — this call only supplies the bytes.
    fn load_contract_code(&mut self, cid: ContractId) -> Result<Vec<u8>, BvmError>;

    /// Returns a canonical per-block scalar (the value `Shaders_get_Hdr` reduces a
    /// block header to, e.g. its hash) for an already-reached `height`. Fails with
    /// `BlockNotReady` if `height` is beyond the chain's current tip.
    fn get_hdr(&mut self, height: u32) -> Result<i64, BvmError>;

    /// Manager-only: opens a cursor over `[k_min, k_max]` and returns its handle.
    fn vars_enum(&mut self, cid: ContractId, k_min: &[u8], k_max: &[u8]) -> u32;
    /// Manager-only: advances a cursor, returning the next `(key, value)` pair.
    fn vars_move_next(&mut self, cursor: u32) -> Option<(Vec<u8>, Vec<u8>)>;

    /// Manager-only document builder: opens a named group.
    fn doc_group(&mut self, name: &[u8]);
    /// Manager-only document builder: opens a named array.
    fn doc_array(&mut self, name: &[u8]);
    fn doc_add_text(&mut self, name: &[u8], text: &[u8]);
    fn doc_add_blob(&mut self, name: &[u8], blob: &[u8]);
    fn doc_add_num32(&mut self, name: &[u8], value: i32);
    fn doc_add_num64(&mut self, name: &[u8], value: i64);

    /// Reads fields back out of the inbound request document (method arguments
    /// passed to the manager persona).
    fn doc_get_text(&mut self, name: &[u8]) -> Option<Vec<u8>>;
    fn doc_get_blob(&mut self, name: &[u8]) -> Option<Vec<u8>>;
    fn doc_get_num32(&mut self, name: &[u8]) -> Option<i32>;
    fn doc_get_num64(&mut self, name: &[u8]) -> Option<i64>;
}
