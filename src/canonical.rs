//! Canonical serialization for deterministic hashing.
//!
//! Used for the snapshot file checksum and the map view `ETag`.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: struct fields serialize in declaration order
//! - No HashMap in hashed data: catalogs and views use BTreeMap
//! - Stable float format: f64 serializes as shortest round-trip form

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes for hashing.
///
/// Catalog and view types only contain string-keyed maps, so serialization
/// cannot fail for them.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    let bytes = to_canonical_bytes(value);
    xxh64(&bytes, 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_determinism_independent_of_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("room-2", [30.0, 70.0]);
        a.insert("room-1", [54.0, 70.0]);

        let mut b = BTreeMap::new();
        b.insert("room-1", [54.0, 70.0]);
        b.insert("room-2", [30.0, 70.0]);

        assert_eq!(canonical_hash_hex(&a), canonical_hash_hex(&b));
        assert_eq!(canonical_hash_hex(&a).len(), 16);
    }

    #[test]
    fn test_hash_changes_with_content() {
        assert_ne!(canonical_hash(&[54.0, 70.0]), canonical_hash(&[54.0, 70.5]));
    }
}
