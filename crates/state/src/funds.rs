//! Funds bookkeeping: a persistent per-`(contract, asset)` locked-amount counter, and
//! a transient Pedersen-style commitment accumulator that every top-level invocation
//! starts fresh and checks against the signed amounts at finalization.

use crate::undo::{UndoAction, UndoLog};
use crate::var_store::VariableStore;
use k256::elliptic_curve::PrimeField;
use k256::{ProjectivePoint, Scalar};
use types::{AssetId, BvmError, ContractId, VarKey, VarTag};

fn locked_key(cid: ContractId, aid: AssetId) -> VarKey {
    VarKey::new(cid, VarTag::LockedAmount, aid.to_le_bytes().to_vec())
        .expect("4-byte asset id subkey never exceeds the cap")
}

fn decode_u128(raw: &[u8]) -> u128 {
    if raw.len() != 16 {
        return 0;
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(raw);
    u128::from_le_bytes(buf)
}

/// Draws `amount` out of `cid`'s available balance for `aid`, failing on underflow:
/// the counter tracks funds still free to spend, so locking spends it down.
pub fn lock_amount(
    store: &VariableStore,
    undo: &mut UndoLog,
    cid: ContractId,
    aid: AssetId,
    amount: u128,
) -> Result<(), BvmError> {
    let key = locked_key(cid, aid);
    let current = decode_u128(&store.read_exact(&key));
    let new_value = current
        .checked_sub(amount)
        .ok_or_else(|| BvmError::InvariantViolation("locked-amount counter underflowed".into()))?;
    let prev = store.write_or_delete(&key, &new_value.to_le_bytes())?;
    undo.push(UndoAction::VarWrite { key: key.to_bytes(), prev });
    Ok(())
}

/// Returns `amount` to `cid`'s available balance for `aid`, failing on overflow.
pub fn unlock_amount(
    store: &VariableStore,
    undo: &mut UndoLog,
    cid: ContractId,
    aid: AssetId,
    amount: u128,
) -> Result<(), BvmError> {
    let key = locked_key(cid, aid);
    let current = decode_u128(&store.read_exact(&key));
    let new_value = current
        .checked_add(amount)
        .ok_or_else(|| BvmError::InvariantViolation("locked-amount counter overflowed".into()))?;
    let prev = store.write_or_delete(&key, &new_value.to_le_bytes())?;
    undo.push(UndoAction::VarWrite { key: key.to_bytes(), prev });
    Ok(())
}

/// A distinct curve point per asset so locks/unlocks of different assets can't cancel
/// each other out in the accumulator. Derived deterministically from the asset id
/// rather than kept in a table, since every participant needs to agree on it without
/// communication.
fn asset_generator(aid: AssetId) -> ProjectivePoint {
    let digest = types::ids::domain_hash(b"bvm.fund.gen", &[&aid.to_le_bytes()]);
    let scalar = Scalar::from_repr(digest.into()).unwrap_or(Scalar::ONE);
    ProjectivePoint::GENERATOR * scalar
}

/// Per-invocation commitment accumulator: `lock` subtracts the asset's commitment,
/// `unlock` adds it back. Never persisted — only the `LockedAmount` variable writes
/// above survive past a single invocation.
#[derive(Debug, Clone)]
pub struct FundsAccumulator {
    point: ProjectivePoint,
}

impl Default for FundsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FundsAccumulator {
    pub fn new() -> Self {
        Self {
            point: ProjectivePoint::IDENTITY,
        }
    }

    pub fn lock(&mut self, aid: AssetId, amount: u64) {
        self.point -= asset_generator(aid) * Scalar::from(amount);
    }

    pub fn unlock(&mut self, aid: AssetId, amount: u64) {
        self.point += asset_generator(aid) * Scalar::from(amount);
    }

    /// The outstanding commitment a finalizing signature must balance against.
    pub fn commitment(&self) -> ProjectivePoint {
        self.point
    }

    pub fn is_balanced(&self) -> bool {
        self.point == ProjectivePoint::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_then_unlock_of_same_amount_balances() {
        let mut acc = FundsAccumulator::new();
        acc.lock(AssetId(0), 500);
        assert!(!acc.is_balanced());
        acc.unlock(AssetId(0), 500);
        assert!(acc.is_balanced());
    }

    #[test]
    fn locked_amount_underflow_is_rejected() {
        let store = VariableStore::new();
        let mut undo = UndoLog::new();
        let cid = ContractId([5; 32]);
        assert!(matches!(
            lock_amount(&store, &mut undo, cid, AssetId(0), 1),
            Err(BvmError::InvariantViolation(_))
        ));
    }

    #[test]
    fn unlock_then_lock_roundtrips_the_counter() {
        let store = VariableStore::new();
        let mut undo = UndoLog::new();
        let cid = ContractId([6; 32]);
        unlock_amount(&store, &mut undo, cid, AssetId(0), 1_000).unwrap();
        lock_amount(&store, &mut undo, cid, AssetId(0), 400).unwrap();
        let raw = store.read_exact(&locked_key(cid, AssetId(0)));
        assert_eq!(decode_u128(&raw), 600);
    }
}
