//! Sorted-pair Keccak Merkle tree over leaf digests.
//!
//! Leaves are sorted ascending and deduplicated before layering, siblings
//! are combined with [`hash_pair`], and an unpaired node at the end of a
//! layer is promoted to the next layer unchanged.  Proofs therefore carry
//! bare sibling digests, and a level where the walked node was promoted
//! contributes no proof entry.

use crate::codec::to_hex;
use crate::hash::{hash_pair, Digest32};
use thiserror::Error;

/// Errors raised by tree construction and proof lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    #[error("cannot build a tree without leaves")]
    /// No leaf digests were supplied.
    Empty,
    #[error("leaf {} is not part of the tree", to_hex(.leaf))]
    /// A proof was requested for a digest that is not a leaf.
    NotFound {
        /// Requested leaf digest.
        leaf: Digest32,
    },
}

/// Immutable Merkle tree; `layers[0]` holds the sorted leaves and the last
/// layer holds the root.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    layers: Vec<Vec<Digest32>>,
}

impl MerkleTree {
    /// Builds the tree over `leaves`.  Input order does not affect the root.
    pub fn build(leaves: &[Digest32]) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::Empty);
        }
        let mut base = leaves.to_vec();
        base.sort_unstable();
        base.dedup();

        let mut layers = vec![base];
        while layers[layers.len() - 1].len() > 1 {
            let next = layers[layers.len() - 1]
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two digests"),
                })
                .collect();
            layers.push(next);
        }
        Ok(Self { layers })
    }

    /// Root digest.  For a single-leaf tree this is the leaf itself.
    pub fn root(&self) -> Digest32 {
        self.layers
            .last()
            .and_then(|layer| layer.first())
            .copied()
            .unwrap_or_default()
    }

    /// Number of distinct leaves.
    pub fn leaf_count(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }

    /// Number of layers including the leaf layer and the root layer.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Sibling digests from `leaf` up to the root.
    pub fn proof(&self, leaf: &Digest32) -> Result<Vec<Digest32>, MerkleError> {
        let mut index = self.layers[0]
            .binary_search(leaf)
            .map_err(|_| MerkleError::NotFound { leaf: *leaf })?;
        let mut proof = Vec::with_capacity(self.layers.len().saturating_sub(1));
        for layer in &self.layers[..self.layers.len() - 1] {
            if let Some(sibling) = layer.get(index ^ 1) {
                proof.push(*sibling);
            }
            index /= 2;
        }
        Ok(proof)
    }
}

/// Replays `proof` from `leaf` and checks the result against `root`.
pub fn verify_proof(leaf: &Digest32, proof: &[Digest32], root: &Digest32) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |running, sibling| hash_pair(&running, sibling));
    computed == *root
}
