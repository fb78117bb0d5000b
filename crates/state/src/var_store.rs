//! The variable store: the sole persistent state visible to contracts.
//!
//! Thin typed layer over `storage::Storage` that enforces the variable size caps
//! `LoadVar`/`SaveVar` honor and speaks in `types::VarKey` rather than raw bytes.

use storage::Storage;
use types::{BvmError, Limits, VarKey};

#[derive(Debug, Default)]
pub struct VariableStore {
    storage: Storage,
    limits: Limits,
}

impl VariableStore {
    pub fn new() -> Self {
        Self {
            storage: Storage::new(),
            limits: Limits::default(),
        }
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            storage: Storage::new(),
            limits,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Absent key reads as empty.
    pub fn read_exact(&self, key: &VarKey) -> Vec<u8> {
        self.storage.get(&key.to_bytes()).unwrap_or_default()
    }

    pub fn exists(&self, key: &VarKey) -> bool {
        self.storage.contains(&key.to_bytes())
    }

    /// Writes `value`, or deletes the key if `value` is empty. Returns the previous
    /// value (`None` if the key didn't exist) for the caller to fold into an undo
    /// entry.
    pub fn write_or_delete(&self, key: &VarKey, value: &[u8]) -> Result<Option<Vec<u8>>, BvmError> {
        if value.len() > self.limits.var_size {
            return Err(BvmError::InvariantViolation(format!(
                "variable value of {} bytes exceeds the {}-byte cap",
                value.len(),
                self.limits.var_size
            )));
        }
        let raw_key = key.to_bytes();
        let prev = self.storage.get(&raw_key);
        self.storage.set(&raw_key, value.to_vec());
        Ok(prev)
    }

    /// Direct restore used only by undo replay: writes exactly `value` back (or
    /// deletes if `None`), bypassing the size check since the value was accepted once
    /// already.
    pub fn restore(&self, raw_key: &[u8], value: Option<Vec<u8>>) {
        match value {
            Some(v) => self.storage.set(raw_key, v),
            None => self.storage.remove(raw_key),
        }
    }

    pub fn range(&self, k_min: &[u8], k_max: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.storage.range_inclusive(k_min, k_max)
    }

    pub fn dump(&self) {
        self.storage.dump();
    }
}
