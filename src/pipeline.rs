//! The in-process build pipeline.
//!
//! Loader → encoder → hasher → tree builder → signature collector → writer.
//! Stages hand typed values to each other; the filesystem is touched only to
//! read the ledger and key material and, once everything succeeded, to write
//! the artifacts.

use crate::artifact::{commit_all, ArtifactError, PendingFile, TreeArtifact};
use crate::codec::to_hex;
use crate::config::{ConfigError, PipelineConfig};
use crate::hash::Digest32;
use crate::keys::{KeyError, KeyRing};
use crate::leaf::build_leaves;
use crate::ledger::{load_ledger, AccountRecord, LedgerError};
use crate::merkle::{MerkleError, MerkleTree};
use crate::payload::PayloadError;
use crate::signing::{self, Recipient};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Any failure of a build, fixture or verify run.  All of them abort the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    /// Ledger input was malformed.
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    /// Key material was malformed or incomplete.
    Key(#[from] KeyError),
    #[error(transparent)]
    /// Tree construction or proof derivation failed.
    Merkle(#[from] MerkleError),
    #[error(transparent)]
    /// A payload in an artifact did not decode.
    Payload(#[from] PayloadError),
    #[error(transparent)]
    /// Configuration was invalid.
    Config(#[from] ConfigError),
    #[error(transparent)]
    /// Artifact I/O failed.
    Artifact(#[from] ArtifactError),
    #[error("invalid artifact: {0}")]
    /// An artifact is inconsistent as a whole.
    InvalidArtifact(String),
    #[error("node {node}: {reason}")]
    /// An artifact node failed an offline check.
    Verification {
        /// Position of the node in the artifact.
        node: usize,
        /// What did not match.
        reason: String,
    },
}

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    /// Merkle root as hex.
    pub root: String,
    /// Number of leaves.
    pub leaves: usize,
    /// Number of signatures collected, `0` when signing was skipped.
    pub signatures: usize,
    /// Paths written.
    pub outputs: Vec<PathBuf>,
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "merkle root {} over {} leaves, {} signatures",
            self.root,
            self.leaves,
            self.signatures
        )?;
        for path in &self.outputs {
            write!(f, "\n  wrote {}", path.display())?;
        }
        Ok(())
    }
}

/// Runs every in-memory stage over `records` and returns the full artifact.
///
/// Signatures are collected only when `keys` is provided.
pub fn build_artifact(
    records: Vec<AccountRecord>,
    recipient: &Recipient,
    keys: Option<&KeyRing>,
) -> Result<TreeArtifact, PipelineError> {
    let leaves = build_leaves(records)?;
    let hashes: Vec<Digest32> = leaves.iter().map(|leaf| leaf.hash).collect();
    let tree = MerkleTree::build(&hashes)?;
    info!(
        root = %to_hex(tree.root()),
        leaves = tree.leaf_count(),
        depth = tree.depth(),
        "merkle tree built"
    );
    let bundles = keys
        .map(|ring| signing::collect(&leaves, recipient, ring))
        .transpose()?;
    Ok(TreeArtifact::assemble(&tree, &leaves, bundles.as_deref())?)
}

/// Loads the configured ledger, builds the tree and writes the artifacts.
///
/// Nothing is written unless every stage succeeded, and the artifacts are
/// committed as one set.
pub fn run_build(config: &PipelineConfig) -> Result<BuildSummary, PipelineError> {
    let balances = config.balances_path();
    let records = load_ledger(&balances)?;
    info!(path = %balances.display(), accounts = records.len(), "ledger loaded");

    let ring = match &config.keys_path {
        Some(path) => {
            let ring = KeyRing::load(path)?;
            info!(path = %path.display(), keys = ring.len(), "key material loaded");
            Some(ring)
        }
        None => {
            warn!("no key material configured; authorization signatures are skipped");
            None
        }
    };

    let artifact = build_artifact(records, &config.recipient, ring.as_ref())?;

    let mut files = vec![PendingFile::json(&config.tree_result_path(), &artifact)?];
    if config.emit_simple {
        files.push(PendingFile::json(
            &config.simple_tree_result_path(),
            &artifact.simplify(),
        )?);
    }
    commit_all(&files)?;
    let outputs: Vec<PathBuf> = files.iter().map(|file| file.path().to_path_buf()).collect();

    let summary = BuildSummary {
        root: artifact.merkle_root.clone(),
        leaves: artifact.nodes.len(),
        signatures: artifact
            .signatures
            .as_ref()
            .map(|bundles| bundles.iter().map(|b| b.signatures.len()).sum())
            .unwrap_or(0),
        outputs,
    };
    info!(
        root = %summary.root,
        leaves = summary.leaves,
        signatures = summary.signatures,
        "artifacts written"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_pair;
    use crate::keys::tests::entry;
    use crate::ledger::AuthKind;
    use crate::lisk32::Address;
    use ed25519_dalek::SigningKey;

    fn record(seed: u8) -> AccountRecord {
        let public = SigningKey::from_bytes(&[seed; 32]).verifying_key().to_bytes();
        let target_address = Address::from_public_key(&public);
        AccountRecord {
            source_address: target_address.to_lisk32(),
            target_address,
            balance: seed as f64,
            balance_units: seed as u64 * 100_000_000,
            auth: AuthKind::Regular,
        }
    }

    #[test]
    fn artifact_without_keys_has_no_signatures() {
        let artifact = build_artifact(vec![record(1), record(2)], &[0x34; 20], None).unwrap();
        assert!(artifact.signatures.is_none());
        assert_eq!(artifact.nodes.len(), 2);
        let a = crate::codec::from_hex_array::<32>(&artifact.nodes[0].hash).unwrap();
        let b = crate::codec::from_hex_array::<32>(&artifact.nodes[1].hash).unwrap();
        assert_eq!(artifact.merkle_root, to_hex(hash_pair(&a, &b)));
    }

    #[test]
    fn artifact_with_keys_is_signed_per_node() {
        let ring = KeyRing::from_entries(&[entry(1, false), entry(2, false)]).unwrap();
        let artifact =
            build_artifact(vec![record(2), record(1)], &[0x34; 20], Some(&ring)).unwrap();
        let bundles = artifact.signatures.unwrap();
        assert_eq!(bundles.len(), 2);
        assert!(bundles.iter().all(|b| b.signatures.len() == 1));
    }

    #[test]
    fn missing_owner_key_fails_the_build() {
        let ring = KeyRing::from_entries(&[entry(1, false)]).unwrap();
        let err =
            build_artifact(vec![record(1), record(3)], &[0x34; 20], Some(&ring)).unwrap_err();
        assert!(matches!(err, PipelineError::Key(KeyError::MissingAddress { .. })));
    }

    #[test]
    fn empty_ledger_never_reaches_the_tree() {
        let err = build_artifact(vec![], &[0; 20], None).unwrap_err();
        assert!(matches!(err, PipelineError::Merkle(MerkleError::Empty)));
    }
}
