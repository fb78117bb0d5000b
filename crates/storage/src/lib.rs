//! An ordered binary key/value map with range iteration.
//!
//! Redesigned from the teacher's `domain:key` composite-string map into raw `Vec<u8>`
//! keys: BVM2's variable keys are already flat binary blobs (`ContractId || tag ||
//! subkey`, see `types::VarKey`), so there is no domain string to splice in, and the
//! manager persona's `VarsEnum`/`VarsMoveNext` need true lexicographic byte ordering
//! over the raw key, which `BTreeMap<Vec<u8>, _>` gives for free.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Default, Clone)]
pub struct Storage {
    map: RefCell<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl Storage {
    pub fn new() -> Self {
        Self::with_map(BTreeMap::new())
    }

    pub fn with_map(initial: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self {
            map: RefCell::new(initial),
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.map.borrow().get(key).cloned()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.borrow().contains_key(key)
    }

    /// Writes `value`, or deletes the key if `value` is empty.
    pub fn set(&self, key: &[u8], value: Vec<u8>) {
        if value.is_empty() {
            self.map.borrow_mut().remove(key);
        } else {
            self.map.borrow_mut().insert(key.to_vec(), value);
        }
    }

    pub fn remove(&self, key: &[u8]) {
        self.map.borrow_mut().remove(key);
    }

    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.map.borrow().clone()
    }

    /// Inclusive range `[k_min, k_max]`, collected eagerly — backs the manager
    /// persona's `VarsEnum`/`VarsMoveNext` cursor, which owns its own snapshot rather
    /// than borrowing the live map across host calls.
    pub fn range_inclusive(&self, k_min: &[u8], k_max: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.map
            .borrow()
            .range((Bound::Included(k_min.to_vec()), Bound::Included(k_max.to_vec())))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn dump(&self) {
        println!("--- Storage Dump ---");
        for (key, value) in self.map.borrow().iter() {
            let key_hex: String = key.iter().map(|b| format!("{:02x}", b)).collect();
            let value_hex: String = value.iter().map(|b| format!("{:02x}", b)).collect();
            println!("Key: {:<68} | Value ({} bytes): {}", key_hex, value.len(), value_hex);
        }
        println!("--------------------");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_empty_deletes() {
        let s = Storage::new();
        s.set(b"k", vec![1, 2, 3]);
        assert_eq!(s.get(b"k"), Some(vec![1, 2, 3]));
        s.set(b"k", Vec::new());
        assert_eq!(s.get(b"k"), None);
    }

    #[test]
    fn range_is_lexicographic_and_inclusive() {
        let s = Storage::new();
        s.set(&[0, 0], vec![1]);
        s.set(&[0, 1], vec![2]);
        s.set(&[0, 2], vec![3]);
        s.set(&[1, 0], vec![4]);

        let got = s.range_inclusive(&[0, 0], &[0, 2]);
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].0, vec![0, 0]);
        assert_eq!(got[2].0, vec![0, 2]);
    }
}
