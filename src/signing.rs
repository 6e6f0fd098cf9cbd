//! Redemption commitments and authorization signature collection.
//!
//! For every leaf the commitment is
//! `keccak256(leaf_hash || recipient) || 0x00 * 9`, and the signer set signs
//! those 41 bytes with ed25519.  Multisig accounts get a signature from every
//! declared key; the receiving contract decides whether the threshold is met.

use crate::hash::{keccak256, Digest32};
use crate::keys::{KeyError, KeyRing};
use crate::leaf::LeafNode;
use crate::ledger::PublicKey;
use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};
use tracing::debug;

/// Width of a recipient address.
pub const RECIPIENT_LENGTH: usize = 20;
/// Zero bytes appended to every commitment digest.
pub const COMMITMENT_SUFFIX: [u8; 9] = [0u8; 9];
/// Total commitment width.
pub const COMMITMENT_LENGTH: usize = 32 + COMMITMENT_SUFFIX.len();

/// A 20-byte address on the receiving chain.
pub type Recipient = [u8; RECIPIENT_LENGTH];

/// Builds the commitment binding `leaf_hash` to `recipient`.
pub fn commitment(leaf_hash: &Digest32, recipient: &Recipient) -> Vec<u8> {
    let mut packed = Vec::with_capacity(32 + RECIPIENT_LENGTH);
    packed.extend_from_slice(leaf_hash);
    packed.extend_from_slice(recipient);
    let mut out = Vec::with_capacity(COMMITMENT_LENGTH);
    out.extend_from_slice(&keccak256(&packed));
    out.extend_from_slice(&COMMITMENT_SUFFIX);
    out
}

/// A detached ed25519 signature split into its `R` and `s` halves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    /// Signer public key.
    pub public_key: PublicKey,
    /// First 32 bytes of the signature.
    pub r: [u8; 32],
    /// Last 32 bytes of the signature.
    pub s: [u8; 32],
}

impl SignatureEntry {
    fn from_signature(public_key: PublicKey, signature: &Signature) -> Self {
        Self {
            public_key,
            r: *signature.r_bytes(),
            s: *signature.s_bytes(),
        }
    }

    /// Reassembles the 64-byte signature.
    pub fn signature(&self) -> Signature {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        Signature::from_bytes(&bytes)
    }

    /// Checks the signature over `message` against the entry's public key.
    pub fn verify(&self, message: &[u8]) -> bool {
        VerifyingKey::from_bytes(&self.public_key)
            .map(|key| key.verify(message, &self.signature()).is_ok())
            .unwrap_or(false)
    }
}

/// Commitment and collected signatures for one leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationBundle {
    /// Leaf the bundle authorises.
    pub leaf_hash: Digest32,
    /// Signed commitment bytes.
    pub commitment: Vec<u8>,
    /// Signatures in signer order: owner, or mandatory then optional keys.
    pub signatures: Vec<SignatureEntry>,
}

/// Signs one leaf with every signer its record declares.
pub fn authorize(
    leaf: &LeafNode,
    recipient: &Recipient,
    keys: &KeyRing,
) -> Result<AuthorizationBundle, KeyError> {
    let commitment = commitment(&leaf.hash, recipient);
    let signatures = keys
        .signers_for(&leaf.record)?
        .into_iter()
        .map(|public_key| {
            let signing = keys.signer(&public_key)?;
            Ok(SignatureEntry::from_signature(
                public_key,
                &signing.sign(&commitment),
            ))
        })
        .collect::<Result<Vec<_>, KeyError>>()?;
    Ok(AuthorizationBundle {
        leaf_hash: leaf.hash,
        commitment,
        signatures,
    })
}

/// Signs every leaf, failing before any signature is made if a signer is
/// missing from `keys`.
pub fn collect(
    leaves: &[LeafNode],
    recipient: &Recipient,
    keys: &KeyRing,
) -> Result<Vec<AuthorizationBundle>, KeyError> {
    keys.ensure_covers(leaves.iter().map(|leaf| &leaf.record))?;
    let bundles = leaves
        .iter()
        .map(|leaf| authorize(leaf, recipient, keys))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        bundles = bundles.len(),
        signatures = bundles.iter().map(|b| b.signatures.len()).sum::<usize>(),
        "authorization bundles collected"
    );
    Ok(bundles)
}
