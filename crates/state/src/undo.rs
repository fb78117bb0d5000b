//! Transactional rollback: every mutation of persistent state pushes an `UndoAction`,
//! and a failed invocation rewinds the log back to the checkpoint taken before it
//! started.
//!
//! Modeled as a tagged sum rather than collapsing everything to a single
//! key/prev-value pair: asset lifecycle events carry enough structure on their own
//! that a reader can tell what actually happened without decoding the variable value.

use crate::var_store::VariableStore;
use types::AssetId;
use types::ContractId;

#[derive(Debug, Clone)]
pub enum UndoAction {
    VarWrite {
        key: Vec<u8>,
        prev: Option<Vec<u8>>,
    },
    AssetCreate {
        cid: ContractId,
        aid: AssetId,
    },
    AssetEmit {
        cid: ContractId,
        aid: AssetId,
        delta: i128,
    },
    AssetDestroy {
        cid: ContractId,
        aid: AssetId,
        prev_value: Vec<u8>,
    },
}

/// A LIFO log of reversible actions. `checkpoint()` marks a position; `rewind_to`
/// replays everything recorded since that position in reverse order and truncates
/// the log back to it.
#[derive(Debug, Default)]
pub struct UndoLog {
    actions: Vec<UndoAction>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self { actions: Vec::new() }
    }

    pub fn checkpoint(&self) -> usize {
        self.actions.len()
    }

    pub fn push(&mut self, action: UndoAction) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Replays everything recorded since `checkpoint`, most recent first, then
    /// truncates the log to `checkpoint`. A no-op if nothing was recorded.
    pub fn rewind_to(&mut self, checkpoint: usize, store: &VariableStore) {
        if self.actions.len() > checkpoint {
            log::debug!(
                "rewinding {} undo action(s) back to checkpoint {}",
                self.actions.len() - checkpoint,
                checkpoint
            );
        }
        while self.actions.len() > checkpoint {
            let action = self.actions.pop().expect("len checked above");
            match action {
                UndoAction::VarWrite { key, prev } => {
                    store.restore(&key, prev);
                }
                UndoAction::AssetCreate { cid, aid } => {
                    let key = crate::assets::owned_asset_key(cid, aid);
                    store.restore(&key.to_bytes(), None);
                }
                UndoAction::AssetEmit { cid, aid, delta } => {
                    let key = crate::assets::owned_asset_key(cid, aid);
                    let raw = store.read_exact(&key);
                    let supply = crate::assets::decode_supply(&raw);
                    let restored = supply - delta;
                    store.restore(&key.to_bytes(), Some(crate::assets::encode_supply(restored)));
                }
                UndoAction::AssetDestroy { cid, aid, prev_value } => {
                    let key = crate::assets::owned_asset_key(cid, aid);
                    store.restore(&key.to_bytes(), Some(prev_value));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{VarKey, VarTag};

    #[test]
    fn var_write_rewind_restores_previous_value() {
        let store = VariableStore::new();
        let mut undo = UndoLog::new();
        let key = VarKey::new(ContractId([7; 32]), VarTag::Internal, b"k".to_vec()).unwrap();

        let cp = undo.checkpoint();
        let prev = store.write_or_delete(&key, b"first").unwrap();
        undo.push(UndoAction::VarWrite { key: key.to_bytes(), prev });

        let prev2 = store.write_or_delete(&key, b"second").unwrap();
        undo.push(UndoAction::VarWrite { key: key.to_bytes(), prev: prev2 });

        assert_eq!(store.read_exact(&key), b"second".to_vec());
        undo.rewind_to(cp, &store);
        assert!(!store.exists(&key));
        assert_eq!(undo.len(), cp);
    }
}
