//! Identity hints for node descriptions.
//!
//! A `key` given to a [`NodeBuilder`](crate::NodeBuilder) or a `"key"` entry
//! passed to [`build_node`](crate::build_node) is reduced to a [`Key`] here.
//! The `std-hash` feature swaps `ahash` for the standard SipHash hasher.

use std::hash::{Hash, Hasher};

use crate::Key;

#[cfg(not(feature = "std-hash"))]
type KeyHasher = ahash::AHasher;

#[cfg(feature = "std-hash")]
type KeyHasher = std::collections::hash_map::DefaultHasher;

/// Hashes `hint` into a [`Key`]. Equal hints give equal keys within one build.
pub fn hash_key<T: Hash + ?Sized>(hint: &T) -> Key {
    let mut hasher = KeyHasher::default();
    hint.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_hints_hash_like_their_slices() {
        assert_eq!(hash_key("row-1"), hash_key(&String::from("row-1")));
        assert_ne!(hash_key("row-1"), hash_key("row-2"));
    }
}
