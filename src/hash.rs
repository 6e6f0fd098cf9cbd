//! Keccak-256 helpers shared by the leaf hasher, the tree builder and the
//! commitment builder.
//!
//! The receiving chain recomputes every digest produced here, so the
//! primitive is plain Keccak-256 (the pre-standard variant used by the EVM)
//! with no domain separation or salting.

use sha3::{Digest, Keccak256};

/// A 32-byte Keccak-256 digest.
pub type Digest32 = [u8; 32];

/// Hashes an arbitrary byte string with Keccak-256.
pub fn keccak256(bytes: &[u8]) -> Digest32 {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Hashes a leaf payload into its 32-byte leaf digest.
pub fn leaf_hash(payload: &[u8]) -> Digest32 {
    keccak256(payload)
}

/// Combines two sibling digests by hashing their ascending concatenation.
///
/// The result does not depend on argument order, which is what lets a proof
/// carry bare sibling digests without left/right markers.
pub fn hash_pair(a: &Digest32, b: &Digest32) -> Digest32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Keccak256::new();
    hasher.update(lo);
    hasher.update(hi);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn keccak_of_empty_input_matches_known_vector() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn pair_hash_is_hash_of_sorted_concatenation() {
        let low = [0x01u8; 32];
        let high = [0xf0u8; 32];
        let mut joined = Vec::with_capacity(64);
        joined.extend_from_slice(&low);
        joined.extend_from_slice(&high);
        assert_eq!(hash_pair(&high, &low), keccak256(&joined));
    }

    proptest! {
        #[test]
        fn pair_hash_commutes(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
            prop_assert_eq!(hash_pair(&a, &b), hash_pair(&b, &a));
        }
    }
}
