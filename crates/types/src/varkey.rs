//! Variable key construction: `ContractId(32) || tag(1) || subkey(<=256)`.
//!
//! `bvm.h`'s `VarKey::Tag` enumerates four namespaces per contract. Every persistent
//! fact the VM ever records — code, contract state, escrow counters, reference counts,
//! asset ownership — is addressed through one of these four tags.

use crate::error::BvmError;
use crate::ids::ContractId;
use crate::limits::VAR_KEY_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum VarTag {
    /// The contract's own state. The empty subkey holds the contract's code record.
    Internal = 0,
    /// Per-asset escrow counter, subkey = `AssetId` LE bytes.
    LockedAmount = 1,
    /// Reference count, subkey = referenced `ContractId` (outbound) or empty (inbound flag).
    Refs = 2,
    /// Asset ownership marker, subkey = `AssetId` LE bytes, value = signed supply counter.
    OwnedAsset = 3,
}

impl VarTag {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(VarTag::Internal),
            1 => Some(VarTag::LockedAmount),
            2 => Some(VarTag::Refs),
            3 => Some(VarTag::OwnedAsset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VarKey {
    pub cid: ContractId,
    pub tag: VarTag,
    pub subkey: Vec<u8>,
}

impl VarKey {
    pub fn new(cid: ContractId, tag: VarTag, subkey: Vec<u8>) -> Result<Self, BvmError> {
        if subkey.len() > VAR_KEY_SIZE {
            return Err(BvmError::InvariantViolation(format!(
                "variable subkey of {} bytes exceeds the {}-byte cap",
                subkey.len(),
                VAR_KEY_SIZE
            )));
        }
        Ok(Self { cid, tag, subkey })
    }

    /// The contract's own code record: `Internal` tag, empty subkey.
    pub fn code_record(cid: ContractId) -> Self {
        Self {
            cid,
            tag: VarTag::Internal,
            subkey: Vec::new(),
        }
    }

    /// Flattens into the storage-layer key: `cid(32) || tag(1) || subkey`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(33 + self.subkey.len());
        out.extend_from_slice(&self.cid.0);
        out.push(self.tag as u8);
        out.extend_from_slice(&self.subkey);
        out
    }

    /// Parses a flattened storage key back into its components (used by the manager
    /// persona's `VarsEnum`/`VarsMoveNext`, which must report keys back to callers).
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 33 {
            return None;
        }
        let mut cid = [0u8; 32];
        cid.copy_from_slice(&bytes[0..32]);
        let tag = VarTag::from_u8(bytes[32])?;
        let subkey = bytes[33..].to_vec();
        Some(Self {
            cid: ContractId(cid),
            tag,
            subkey,
        })
    }
}
