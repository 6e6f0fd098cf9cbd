//! Offline re-check of a written tree artifact.
//!
//! Every node must decode to its recorded fields, hash to its recorded hash
//! and prove into the recorded root.  When signatures are present, each
//! commitment must bind the node's hash to the configured recipient and each
//! signature must verify.  Thresholds are left to the receiving contract.

use crate::artifact::{read_json, BundleJson, NodeJson, TreeArtifact};
use crate::codec::{from_hex, from_hex_array, to_hex};
use crate::config::PipelineConfig;
use crate::hash::{keccak256, Digest32};
use crate::ledger::PublicKey;
use crate::lisk32::Address;
use crate::merkle::verify_proof;
use crate::payload;
use crate::pipeline::PipelineError;
use crate::signing::{commitment, Recipient, SignatureEntry};
use tracing::{debug, info};

/// Counts from a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifySummary {
    /// Nodes checked.
    pub nodes: usize,
    /// Signatures checked.
    pub signatures: usize,
}

/// Verifies the configured dataset's full artifact.
pub fn run_verify_tree(config: &PipelineConfig) -> Result<String, PipelineError> {
    let path = config.tree_result_path();
    let artifact: TreeArtifact = read_json(&path)?;
    let summary = verify_artifact(&artifact, &config.recipient)?;
    info!(
        path = %path.display(),
        nodes = summary.nodes,
        signatures = summary.signatures,
        "artifact verified"
    );
    Ok(format!(
        "{} verified: {} nodes, {} signatures against root {}",
        path.display(),
        summary.nodes,
        summary.signatures,
        artifact.merkle_root
    ))
}

/// Checks every node and bundle of `artifact`.
pub fn verify_artifact(
    artifact: &TreeArtifact,
    recipient: &Recipient,
) -> Result<VerifySummary, PipelineError> {
    let root: Digest32 = from_hex_array(&artifact.merkle_root)
        .map_err(|err| PipelineError::InvalidArtifact(format!("invalid merkleRoot: {err}")))?;
    let mut hashes = Vec::with_capacity(artifact.nodes.len());
    for (index, node) in artifact.nodes.iter().enumerate() {
        hashes.push(verify_node(index, node, &root)?);
    }

    let mut signatures = 0;
    if let Some(bundles) = &artifact.signatures {
        if bundles.len() != artifact.nodes.len() {
            return Err(PipelineError::InvalidArtifact(format!(
                "{} signature bundles for {} nodes",
                bundles.len(),
                artifact.nodes.len()
            )));
        }
        for (index, (bundle, node)) in bundles.iter().zip(&artifact.nodes).enumerate() {
            signatures += verify_bundle(index, bundle, node, &hashes[index], recipient)?;
        }
    }
    Ok(VerifySummary {
        nodes: artifact.nodes.len(),
        signatures,
    })
}

fn verify_node(index: usize, node: &NodeJson, root: &Digest32) -> Result<Digest32, PipelineError> {
    let bytes = parse(index, "payload", from_hex(&node.payload))?;
    let decoded = payload::decode(&bytes)?;

    let address: [u8; 20] = parse(index, "address", from_hex_array(&node.address))?;
    if decoded.address != address {
        return Err(mismatch(index, "payload address differs from node address"));
    }
    if decoded.balance_units != node.balance_units {
        return Err(mismatch(index, "payload balance differs from balanceUnits"));
    }
    if decoded.threshold != node.threshold {
        return Err(mismatch(index, "payload threshold differs from node threshold"));
    }
    let declared = declared_keys(index, node)?;
    let (mandatory, optional) = decoded.split_keys(node.mandatory_keys.len())?;
    if mandatory.iter().chain(optional).ne(declared.iter()) {
        return Err(mismatch(index, "payload keys differ from declared keys"));
    }

    let hash: Digest32 = parse(index, "hash", from_hex_array(&node.hash))?;
    if keccak256(&bytes) != hash {
        return Err(mismatch(index, "hash is not keccak256(payload)"));
    }
    let proof = node
        .proof
        .iter()
        .map(|sibling| parse(index, "proof", from_hex_array(sibling)))
        .collect::<Result<Vec<Digest32>, _>>()?;
    if !verify_proof(&hash, &proof, root) {
        return Err(mismatch(index, "proof does not replay to the merkle root"));
    }
    debug!(node = index, proof_len = proof.len(), "node verified");
    Ok(hash)
}

fn verify_bundle(
    index: usize,
    bundle: &BundleJson,
    node: &NodeJson,
    hash: &Digest32,
    recipient: &Recipient,
) -> Result<usize, PipelineError> {
    let expected = commitment(hash, recipient);
    let recorded = parse(index, "commitment", from_hex(&bundle.commitment))?;
    if recorded != expected {
        return Err(mismatch(
            index,
            format!("commitment differs from {}", to_hex(&expected)),
        ));
    }

    let signed = bundle
        .signatures
        .iter()
        .map(|sig| parse(index, "publicKey", from_hex_array::<32>(&sig.public_key)))
        .collect::<Result<Vec<PublicKey>, _>>()?;
    let signers_match = if node.threshold == 0 {
        let address: [u8; 20] = parse(index, "address", from_hex_array(&node.address))?;
        signed.len() == 1 && Address::from_public_key(&signed[0]).0 == address
    } else {
        signed == declared_keys(index, node)?
    };
    if !signers_match {
        return Err(mismatch(index, "signer set differs from the account's keys"));
    }

    for sig in &bundle.signatures {
        let entry = SignatureEntry {
            public_key: parse(index, "publicKey", from_hex_array(&sig.public_key))?,
            r: parse(index, "r", from_hex_array(&sig.r))?,
            s: parse(index, "s", from_hex_array(&sig.s))?,
        };
        if !entry.verify(&recorded) {
            return Err(mismatch(
                index,
                format!("signature by {} does not verify", sig.public_key),
            ));
        }
    }
    Ok(bundle.signatures.len())
}

fn declared_keys(index: usize, node: &NodeJson) -> Result<Vec<PublicKey>, PipelineError> {
    node.mandatory_keys
        .iter()
        .chain(&node.optional_keys)
        .map(|key| parse(index, "key", from_hex_array(key)))
        .collect()
}

fn parse<T, E: std::fmt::Display>(
    index: usize,
    field: &str,
    result: Result<T, E>,
) -> Result<T, PipelineError> {
    result.map_err(|err| mismatch(index, format!("invalid {field}: {err}")))
}

fn mismatch(node: usize, reason: impl Into<String>) -> PipelineError {
    PipelineError::Verification {
        node,
        reason: reason.into(),
    }
}
