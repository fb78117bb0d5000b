//! 32-byte content identifiers and the domain-separated hash family used to derive them.
//!
//! `bvm2.cpp`'s `get_Cid`/`get_AssetOwner` hash a literal domain tag followed by
//! length-prefixed fields; we reproduce that shape with `blake2b` standing in for BEAM's
//! internal hash so the derivation stays a single, auditable function (`domain_hash`).

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use core::fmt;

type Blake2b256 = Blake2b<U32>;

/// Hashes `tag` followed by each field in `parts`, each field preceded by its
/// little-endian `u32` length. This is the one hash construction every id in this
/// module builds on, mirroring BEAM's `get_Cid`/`get_AssetOwner` shape.
pub fn domain_hash(tag: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(tag);
    for part in parts {
        hasher.update((part.len() as u32).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

macro_rules! id32 {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(", stringify!($name))?;
                for byte in &self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                write!(f, ")")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    };
}

id32!(ContractId);
id32!(ShaderId);
id32!(PeerId);

impl ContractId {
    /// `H("bvm.cid" || le32(len(code)) || le32(len(ctor_args)) || code || ctor_args)`.
    pub fn derive(code: &[u8], ctor_args: &[u8]) -> Self {
        Self(domain_hash(b"bvm.cid", &[code, ctor_args]))
    }
}

impl ShaderId {
    /// Code-only fingerprint, independent of constructor args, used for shader dedup.
    pub fn derive(code: &[u8]) -> Self {
        Self(domain_hash(b"bvm.shader", &[code]))
    }
}

impl PeerId {
    /// `H("bvm.a.own" || ContractId || metadata_hash)`.
    pub fn asset_owner(cid: &ContractId, metadata: &[u8]) -> Self {
        let metadata_hash = domain_hash(b"bvm.a.meta", &[metadata]);
        Self(domain_hash(b"bvm.a.own", &[&cid.0, &metadata_hash]))
    }
}

/// A contract-scoped asset identifier. Unique within the owning contract's namespace,
/// not globally: ownership lookups are always `(ContractId, OwnedAsset, AssetId)`, so two
/// different contracts may mint an `AssetId` with the same numeric value without collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetId(pub u32);

impl AssetId {
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
