//! Reference counting between contracts. Each `RefAdd`/`RefRelease` pair touches two
//! variables: an outbound count keyed by the referenced contract (so a contract can
//! tell *which* peers it references and how many times), and an inbound aggregate at
//! the referenced contract's own empty-subkey `Refs` entry (so a destructor call can
//! cheaply test "is anything still pointing at me" without a full scan).

use crate::undo::{UndoAction, UndoLog};
use crate::var_store::VariableStore;
use types::{BvmError, ContractId, VarKey, VarTag};

fn decode_count(raw: &[u8]) -> u32 {
    if raw.len() != 4 {
        return 0;
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(raw);
    u32::from_le_bytes(buf)
}

fn write_count(store: &VariableStore, undo: &mut UndoLog, key: &VarKey, count: u32) -> Result<(), BvmError> {
    let bytes = if count == 0 { Vec::new() } else { count.to_le_bytes().to_vec() };
    let prev = store.write_or_delete(key, &bytes)?;
    undo.push(UndoAction::VarWrite { key: key.to_bytes(), prev });
    Ok(())
}

/// Records that `referrer` now holds one more reference to `target`.
pub fn ref_add(
    store: &VariableStore,
    undo: &mut UndoLog,
    referrer: ContractId,
    target: ContractId,
) -> Result<(), BvmError> {
    let outbound = VarKey::new(referrer, VarTag::Refs, target.as_bytes().to_vec())?;
    let outbound_count = decode_count(&store.read_exact(&outbound));
    write_count(store, undo, &outbound, outbound_count + 1)?;

    let inbound = VarKey::new(target, VarTag::Refs, Vec::new())?;
    let inbound_count = decode_count(&store.read_exact(&inbound));
    write_count(store, undo, &inbound, inbound_count + 1)?;
    Ok(())
}

/// Releases one reference `referrer` holds on `target`. Fails with
/// `InvariantViolation` if `referrer` holds no reference to release.
pub fn ref_release(
    store: &VariableStore,
    undo: &mut UndoLog,
    referrer: ContractId,
    target: ContractId,
) -> Result<(), BvmError> {
    let outbound = VarKey::new(referrer, VarTag::Refs, target.as_bytes().to_vec())?;
    let outbound_count = decode_count(&store.read_exact(&outbound));
    if outbound_count == 0 {
        return Err(BvmError::InvariantViolation(format!(
            "{} holds no reference to {} to release",
            referrer, target
        )));
    }
    write_count(store, undo, &outbound, outbound_count - 1)?;

    let inbound = VarKey::new(target, VarTag::Refs, Vec::new())?;
    let inbound_count = decode_count(&store.read_exact(&inbound));
    write_count(store, undo, &inbound, inbound_count.saturating_sub(1))?;
    Ok(())
}

/// Whether any contract still holds a reference to `cid`. A destructor call checks
/// this before it is allowed to run.
pub fn is_referenced(store: &VariableStore, cid: ContractId) -> bool {
    let inbound = VarKey::new(cid, VarTag::Refs, Vec::new()).expect("empty subkey never exceeds the cap");
    store.exists(&inbound)
}
