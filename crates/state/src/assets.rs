//! Asset lifecycle: create, emit, destroy. All bookkeeping lives directly in the
//! variable store under the `OwnedAsset` tag rather than a separate in-memory
//! registry — the tag's value *is* the signed supply counter, so the existing
//! variable store and undo log already give asset state persistence and rollback
//! for free.

use crate::undo::{UndoAction, UndoLog};
use crate::var_store::VariableStore;
use types::{AssetId, BvmError, ContractId, PeerId, VarKey, VarTag};

const ASSET_COUNTER_SUBKEY: &[u8] = b"\0bvm.actr";

pub(crate) fn owned_asset_key(cid: ContractId, aid: AssetId) -> VarKey {
    VarKey::new(cid, VarTag::OwnedAsset, aid.to_le_bytes().to_vec())
        .expect("4-byte asset id subkey never exceeds the cap")
}

pub(crate) fn encode_supply(supply: i128) -> Vec<u8> {
    supply.to_le_bytes().to_vec()
}

pub(crate) fn decode_supply(raw: &[u8]) -> i128 {
    if raw.len() != 16 {
        return 0;
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(raw);
    i128::from_le_bytes(buf)
}

fn next_asset_id(store: &VariableStore, undo: &mut UndoLog, cid: ContractId) -> Result<AssetId, BvmError> {
    let key = VarKey::new(cid, VarTag::Internal, ASSET_COUNTER_SUBKEY.to_vec())?;
    let raw = store.read_exact(&key);
    let current = if raw.len() == 4 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&raw);
        u32::from_le_bytes(buf)
    } else {
        0
    };
    let next = current
        .checked_add(1)
        .ok_or_else(|| BvmError::InvariantViolation("asset id counter overflowed".into()))?;
    let prev = store.write_or_delete(&key, &next.to_le_bytes())?;
    undo.push(UndoAction::VarWrite { key: key.to_bytes(), prev });
    Ok(AssetId(next))
}

/// Mints a fresh asset owned by `cid`, deriving its owner `PeerId` from `metadata`.
/// Starts with zero supply; a caller typically follows this with an `emit` to set
/// the initial balance.
pub fn create_asset(
    store: &VariableStore,
    undo: &mut UndoLog,
    cid: ContractId,
    metadata: &[u8],
) -> Result<(AssetId, PeerId), BvmError> {
    let aid = next_asset_id(store, undo, cid)?;
    let key = owned_asset_key(cid, aid);
    let prev = store.write_or_delete(&key, &encode_supply(0))?;
    debug_assert!(prev.is_none(), "freshly minted asset id must be unused");
    undo.push(UndoAction::AssetCreate { cid, aid });
    let owner = PeerId::asset_owner(&cid, metadata);
    Ok((aid, owner))
}

/// Adjusts `aid`'s supply by `delta`. Returns `Ok(false)` without mutating anything
/// if `cid` does not own `aid` — ownership is enforced implicitly, since the
/// `OwnedAsset` entry only exists under the owning contract's own namespace.
pub fn emit_asset(
    store: &VariableStore,
    undo: &mut UndoLog,
    cid: ContractId,
    aid: AssetId,
    delta: i128,
) -> Result<bool, BvmError> {
    let key = owned_asset_key(cid, aid);
    let raw = store.read_exact(&key);
    if raw.is_empty() {
        return Ok(false);
    }
    let supply = decode_supply(&raw);
    let new_supply = supply
        .checked_add(delta)
        .ok_or_else(|| BvmError::InvariantViolation("asset supply overflowed".into()))?;
    if new_supply < 0 {
        return Err(BvmError::InvariantViolation("asset supply would go negative".into()));
    }
    store.write_or_delete(&key, &encode_supply(new_supply))?;
    undo.push(UndoAction::AssetEmit { cid, aid, delta });
    Ok(true)
}

/// Destroys `aid`, failing with `InvariantViolation` if supply is nonzero. Returns
/// `Ok(false)` if `cid` does not own `aid`.
pub fn destroy_asset(
    store: &VariableStore,
    undo: &mut UndoLog,
    cid: ContractId,
    aid: AssetId,
) -> Result<bool, BvmError> {
    let key = owned_asset_key(cid, aid);
    let raw = store.read_exact(&key);
    if raw.is_empty() {
        return Ok(false);
    }
    let supply = decode_supply(&raw);
    if supply != 0 {
        return Err(BvmError::InvariantViolation("cannot destroy an asset with nonzero supply".into()));
    }
    store.write_or_delete(&key, &[])?;
    undo.push(UndoAction::AssetDestroy { cid, aid, prev_value: raw });
    Ok(true)
}
