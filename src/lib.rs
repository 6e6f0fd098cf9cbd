#![deny(missing_docs)]

//! # migration_tree
//!
//! Builds a verifiable commitment to a balance-migration ledger.  Every
//! account of the source ledger becomes a leaf of a sorted-pair Keccak-256
//! Merkle tree; the root is published on the receiving chain and each holder
//! later redeems their balance with the leaf payload, its proof and a set of
//! ed25519 signatures over a commitment that binds the leaf to a recipient.
//!
//! The stages, in data-flow order:
//!
//! * [`ledger`] loads and validates account entries;
//! * [`payload`] packs a record into the bytes the receiving contract decodes;
//! * [`leaf`] hashes payloads into leaves;
//! * [`merkle`] builds the tree and derives proofs;
//! * [`signing`] builds commitments and collects signatures from [`keys`];
//! * [`artifact`] writes the results once everything succeeded.
//!
//! [`pipeline`] chains them in memory, [`fixture`] produces development
//! ledgers and [`commands`] wraps it all for the `migration-tree` binary.
//!
//! ```rust
//! use migration_tree::hash::leaf_hash;
//! use migration_tree::merkle::{verify_proof, MerkleTree};
//!
//! let payloads = [&b"alice"[..], &b"bob"[..], &b"carol"[..]];
//! let leaves: Vec<_> = payloads.iter().map(|p| leaf_hash(p)).collect();
//! let tree = MerkleTree::build(&leaves)?;
//! for leaf in &leaves {
//!     let proof = tree.proof(leaf)?;
//!     assert!(verify_proof(leaf, &proof, &tree.root()));
//! }
//! # Ok::<(), migration_tree::merkle::MerkleError>(())
//! ```

/// Balance conversion between decimal tokens and base units.
pub mod amount;
/// JSON artifact schemas and the atomic writer.
pub mod artifact;
/// `0x` hex helpers.
pub mod codec;
/// Command runners used by the binary.
pub mod commands;
/// Dataset selection and environment overrides.
pub mod config;
/// Development fixture ledgers.
pub mod fixture;
/// Keccak-256 leaf and node hashing.
pub mod hash;
/// Key material and signer lookup.
pub mod keys;
/// Hashed leaf nodes.
pub mod leaf;
/// Ledger entries and validated account records.
pub mod ledger;
/// Lisk32 address codec.
pub mod lisk32;
/// Sorted-pair Merkle tree.
pub mod merkle;
/// Packed leaf payloads.
pub mod payload;
/// End-to-end build pipeline.
pub mod pipeline;
/// Deterministic fixture randomness.
pub mod prng;
/// Redemption commitments and signatures.
pub mod signing;

pub use artifact::{SimpleTreeArtifact, TreeArtifact};
pub use config::{Dataset, PipelineConfig};
pub use hash::{hash_pair, keccak256, leaf_hash, Digest32};
pub use leaf::LeafNode;
pub use ledger::{AccountRecord, AuthKind, LedgerEntry, LedgerError};
pub use lisk32::Address;
pub use merkle::{verify_proof, MerkleError, MerkleTree};
pub use pipeline::{build_artifact, run_build, BuildSummary, PipelineError};
pub use signing::{AuthorizationBundle, SignatureEntry};
