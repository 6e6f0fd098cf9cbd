//! JSON artifacts written at the end of a run, and the atomic writer.
//!
//! The full artifact carries everything a verifier needs; the reduced one
//! keeps only what a redemption harness submits.  Hex fields are `0x`-prefixed
//! lowercase.  `signatures[i]` belongs to `nodes[i]`.

use crate::codec::to_hex;
use crate::hash::Digest32;
use crate::leaf::LeafNode;
use crate::merkle::{MerkleError, MerkleTree};
use crate::signing::AuthorizationBundle;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures while assembling, writing or reading artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to access {path}: {source}")]
    /// Filesystem failure.
    Io {
        /// File involved.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    #[error("invalid artifact JSON in {path}: {source}")]
    /// Encoding or decoding failure.
    Json {
        /// File involved.
        path: String,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    #[error("no authorization bundle for leaf {}", to_hex(.leaf))]
    /// A leaf has no matching authorization bundle.
    MissingBundle {
        /// Leaf hash without a bundle.
        leaf: Digest32,
    },
    #[error(transparent)]
    /// Proof derivation failed.
    Merkle(#[from] MerkleError),
}

/// One annotated leaf of the full artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeJson {
    /// Lisk32 source address.
    pub lsk_address: String,
    /// 20-byte target address.
    pub address: String,
    /// Balance in whole tokens, as read.
    pub balance: f64,
    /// Balance in base units.
    pub balance_units: u64,
    /// Signature threshold, `0` for regular accounts.
    pub threshold: u32,
    /// Mandatory multisig keys.
    pub mandatory_keys: Vec<String>,
    /// Optional multisig keys.
    pub optional_keys: Vec<String>,
    /// Packed leaf payload.
    pub payload: String,
    /// Keccak-256 of `payload`.
    pub hash: String,
    /// Sibling hashes from leaf to root.
    pub proof: Vec<String>,
}

/// One signature of the full artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureJson {
    /// Signer public key.
    pub public_key: String,
    /// `R` half of the signature.
    pub r: String,
    /// `s` half of the signature.
    pub s: String,
}

/// Signatures collected over one commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleJson {
    /// Signed commitment.
    pub commitment: String,
    /// Signatures in signer order.
    pub signatures: Vec<SignatureJson>,
}

/// The full tree artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeArtifact {
    /// Merkle root.
    pub merkle_root: String,
    /// Leaves in ledger order.
    pub nodes: Vec<NodeJson>,
    /// Authorization bundles aligned with `nodes`; absent when no key
    /// material was available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures: Option<Vec<BundleJson>>,
}

/// One leaf of the reduced artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleNodeJson {
    /// 20-byte target address.
    #[serde(alias = "b32Address")]
    pub address: String,
    /// Balance in base units.
    #[serde(alias = "balanceBeddows")]
    pub balance_units: u64,
    /// Signature threshold.
    #[serde(alias = "numberOfSignatures")]
    pub threshold: u32,
    /// Mandatory multisig keys.
    pub mandatory_keys: Vec<String>,
    /// Optional multisig keys.
    pub optional_keys: Vec<String>,
    /// Sibling hashes from leaf to root.
    pub proof: Vec<String>,
}

/// The reduced tree artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleTreeArtifact {
    /// Merkle root.
    pub merkle_root: String,
    /// Leaves in ledger order.
    pub nodes: Vec<SimpleNodeJson>,
}

impl TreeArtifact {
    /// Merges leaves, proofs and optional bundles into the full artifact.
    ///
    /// Proofs and bundles are matched to leaves by leaf hash.
    pub fn assemble(
        tree: &MerkleTree,
        leaves: &[LeafNode],
        bundles: Option<&[AuthorizationBundle]>,
    ) -> Result<Self, ArtifactError> {
        let nodes = leaves
            .iter()
            .map(|leaf| node_json(tree, leaf))
            .collect::<Result<Vec<_>, _>>()?;
        let signatures = bundles
            .map(|bundles| bundles_in_leaf_order(leaves, bundles))
            .transpose()?;
        Ok(Self {
            merkle_root: to_hex(tree.root()),
            nodes,
            signatures,
        })
    }

    /// Projects the reduced artifact.
    pub fn simplify(&self) -> SimpleTreeArtifact {
        SimpleTreeArtifact {
            merkle_root: self.merkle_root.clone(),
            nodes: self
                .nodes
                .iter()
                .map(|node| SimpleNodeJson {
                    address: node.address.clone(),
                    balance_units: node.balance_units,
                    threshold: node.threshold,
                    mandatory_keys: node.mandatory_keys.clone(),
                    optional_keys: node.optional_keys.clone(),
                    proof: node.proof.clone(),
                })
                .collect(),
        }
    }
}

fn node_json(tree: &MerkleTree, leaf: &LeafNode) -> Result<NodeJson, MerkleError> {
    let record = &leaf.record;
    Ok(NodeJson {
        lsk_address: record.source_address.clone(),
        address: to_hex(record.target_address.as_bytes()),
        balance: record.balance,
        balance_units: record.balance_units,
        threshold: record.auth.threshold(),
        mandatory_keys: record.auth.mandatory_keys().iter().map(to_hex).collect(),
        optional_keys: record.auth.optional_keys().iter().map(to_hex).collect(),
        payload: to_hex(&leaf.payload),
        hash: to_hex(leaf.hash),
        proof: tree.proof(&leaf.hash)?.iter().map(to_hex).collect(),
    })
}

fn bundles_in_leaf_order(
    leaves: &[LeafNode],
    bundles: &[AuthorizationBundle],
) -> Result<Vec<BundleJson>, ArtifactError> {
    let by_leaf: HashMap<Digest32, &AuthorizationBundle> =
        bundles.iter().map(|b| (b.leaf_hash, b)).collect();
    leaves
        .iter()
        .map(|leaf| -> Result<BundleJson, ArtifactError> {
            let bundle = by_leaf
                .get(&leaf.hash)
                .ok_or(ArtifactError::MissingBundle { leaf: leaf.hash })?;
            Ok(BundleJson {
                commitment: to_hex(&bundle.commitment),
                signatures: bundle
                    .signatures
                    .iter()
                    .map(|sig| SignatureJson {
                        public_key: to_hex(sig.public_key),
                        r: to_hex(sig.r),
                        s: to_hex(sig.s),
                    })
                    .collect(),
            })
        })
        .collect()
}

/// One serialised artifact waiting to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    path: PathBuf,
    contents: String,
}

impl PendingFile {
    /// Serialises `value` as pretty JSON destined for `path`.
    pub fn json<T: Serialize>(path: &Path, value: &T) -> Result<Self, ArtifactError> {
        let mut contents =
            serde_json::to_string_pretty(value).map_err(|source| ArtifactError::Json {
                path: path.display().to_string(),
                source,
            })?;
        contents.push('\n');
        Ok(Self {
            path: path.to_path_buf(),
            contents,
        })
    }

    /// Final location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn io_error(&self, source: io::Error) -> ArtifactError {
        ArtifactError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn stage(&self) -> Result<(), ArtifactError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        if self.path.is_dir() {
            return Err(self.io_error(io::Error::new(
                io::ErrorKind::Other,
                "target path is a directory",
            )));
        }
        fs::write(self.tmp_path(), &self.contents).map_err(|err| self.io_error(err))
    }

    fn publish(&self) -> Result<(), ArtifactError> {
        fs::rename(self.tmp_path(), &self.path).map_err(|err| self.io_error(err))
    }
}

/// Writes every file to a `.tmp` sibling, then renames them all into place.
///
/// Renaming starts only once every temp file is on disk.  On failure the
/// temp files are removed and targets already renamed by this call are
/// deleted, so the set lands whole or not at all.
pub fn commit_all(files: &[PendingFile]) -> Result<(), ArtifactError> {
    for (staged, file) in files.iter().enumerate() {
        if let Err(err) = file.stage() {
            discard_temps(&files[..=staged]);
            return Err(err);
        }
    }
    for (published, file) in files.iter().enumerate() {
        if let Err(err) = file.publish() {
            for done in &files[..published] {
                let _ = fs::remove_file(&done.path);
            }
            discard_temps(&files[published..]);
            return Err(err);
        }
    }
    Ok(())
}

fn discard_temps(files: &[PendingFile]) {
    for file in files {
        let _ = fs::remove_file(file.tmp_path());
    }
}

/// Serialises `value` as pretty JSON to a sibling temp file, then renames it
/// over `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    commit_all(&[PendingFile::json(path, value)?])
}

/// Reads a JSON artifact.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Json {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AccountRecord, AuthKind};
    use crate::lisk32::Address;

    fn leaf(seed: u8, auth: AuthKind) -> LeafNode {
        let target_address = Address([seed; 20]);
        LeafNode::from_record(AccountRecord {
            source_address: target_address.to_lisk32(),
            target_address,
            balance: 1.5,
            balance_units: 150_000_000,
            auth,
        })
    }

    fn leaves() -> Vec<LeafNode> {
        vec![
            leaf(1, AuthKind::Regular),
            leaf(
                2,
                AuthKind::Multisig {
                    threshold: 1,
                    mandatory_keys: vec![[7u8; 32]],
                    optional_keys: vec![[8u8; 32]],
                },
            ),
            leaf(3, AuthKind::Regular),
        ]
    }

    fn bundle(leaf: &LeafNode) -> AuthorizationBundle {
        AuthorizationBundle {
            leaf_hash: leaf.hash,
            commitment: vec![leaf.hash[0]; 41],
            signatures: vec![],
        }
    }

    #[test]
    fn nodes_keep_ledger_order_and_field_names() {
        let leaves = leaves();
        let hashes: Vec<Digest32> = leaves.iter().map(|l| l.hash).collect();
        let tree = MerkleTree::build(&hashes).unwrap();
        let artifact = TreeArtifact::assemble(&tree, &leaves, None).unwrap();
        assert_eq!(artifact.nodes.len(), 3);
        assert_eq!(artifact.nodes[1].address, to_hex([2u8; 20]));
        assert_eq!(artifact.nodes[1].mandatory_keys, vec![to_hex([7u8; 32])]);
        assert_eq!(artifact.nodes[1].threshold, 1);

        let json = serde_json::to_value(&artifact).unwrap();
        assert!(json.get("merkleRoot").is_some());
        assert!(json.get("signatures").is_none());
        assert_eq!(json["nodes"][0]["balanceUnits"], 150_000_000u64);
        assert!(json["nodes"][0]["lskAddress"].is_string());
    }

    #[test]
    fn bundles_are_matched_by_leaf_hash() {
        let leaves = leaves();
        let hashes: Vec<Digest32> = leaves.iter().map(|l| l.hash).collect();
        let tree = MerkleTree::build(&hashes).unwrap();
        let mut bundles: Vec<AuthorizationBundle> = leaves.iter().map(bundle).collect();
        bundles.reverse();
        let artifact = TreeArtifact::assemble(&tree, &leaves, Some(&bundles)).unwrap();
        let signatures = artifact.signatures.unwrap();
        for (leaf, entry) in leaves.iter().zip(&signatures) {
            assert_eq!(entry.commitment, to_hex(vec![leaf.hash[0]; 41]));
        }

        bundles.pop();
        let err = TreeArtifact::assemble(&tree, &leaves, Some(&bundles)).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::MissingBundle { leaf } if leaf == leaves[0].hash
        ));
    }

    #[test]
    fn reduced_artifact_drops_intermediate_fields() {
        let leaves = leaves();
        let hashes: Vec<Digest32> = leaves.iter().map(|l| l.hash).collect();
        let tree = MerkleTree::build(&hashes).unwrap();
        let simple = TreeArtifact::assemble(&tree, &leaves, None)
            .unwrap()
            .simplify();
        let json = serde_json::to_value(&simple).unwrap();
        assert!(json["nodes"][0].get("payload").is_none());
        assert!(json["nodes"][0].get("hash").is_none());
        assert!(json["nodes"][0].get("proof").is_some());
    }

    #[test]
    fn atomic_write_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        let leaves = leaves();
        let hashes: Vec<Digest32> = leaves.iter().map(|l| l.hash).collect();
        let tree = MerkleTree::build(&hashes).unwrap();
        let artifact = TreeArtifact::assemble(&tree, &leaves, None).unwrap();
        write_json_atomic(&path, &artifact).unwrap();
        let back: TreeArtifact = read_json(&path).unwrap();
        assert_eq!(back, artifact);
        assert!(!dir.path().join("nested").join("out.json.tmp").exists());
    }

    #[test]
    fn failed_commit_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let blocked = dir.path().join("second.json");
        fs::create_dir_all(blocked.join("occupied")).unwrap();

        let files = vec![
            PendingFile::json(&first, &vec![1u8, 2, 3]).unwrap(),
            PendingFile::json(&blocked, &vec![4u8]).unwrap(),
        ];
        let err = commit_all(&files).unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
        assert!(!first.exists());
        assert!(!dir.path().join("first.json.tmp").exists());
        assert!(!dir.path().join("second.json.tmp").exists());
    }

    #[test]
    fn reduced_node_accepts_harness_field_names() {
        let node: SimpleNodeJson = serde_json::from_value(serde_json::json!({
            "b32Address": "0x0101010101010101010101010101010101010101",
            "balanceBeddows": 150000000u64,
            "numberOfSignatures": 0,
            "mandatoryKeys": [],
            "optionalKeys": [],
            "proof": [],
        }))
        .unwrap();
        assert_eq!(node.balance_units, 150_000_000);
        let written = serde_json::to_value(&node).unwrap();
        assert_eq!(written["address"], node.address.as_str());
        assert!(written.get("b32Address").is_none());
    }
}
