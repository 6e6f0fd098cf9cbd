//! Key-material loading and the signer index used during signature collection.
//!
//! The key file follows the validator-keys layout:
//!
//! ```json
//! { "keys": [ { "address": "lsk...", "publicKey": "<hex>", "privateKey": "<hex>" } ] }
//! ```
//!
//! `privateKey` may be a 32-byte ed25519 seed or the 64-byte `seed || public`
//! form.  Every other field is ignored.

use crate::codec::{from_hex, from_hex_array};
use crate::ledger::{AccountRecord, AuthKind, PublicKey};
use crate::lisk32::Address;
use ed25519_dalek::{SigningKey, KEYPAIR_LENGTH, SECRET_KEY_LENGTH};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors reported while loading key material or resolving signers.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to read key file {path}: {source}")]
    /// The key file could not be read.
    Io {
        /// Key file path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    #[error("invalid key file JSON in {path}: {source}")]
    /// The key file does not match the expected layout.
    Json {
        /// Key file path.
        path: String,
        /// Underlying decode error.
        source: serde_json::Error,
    },
    #[error("key {index}: invalid public key")]
    /// A public key is not 32 bytes of hex.
    InvalidPublicKey {
        /// Position in the key file.
        index: usize,
    },
    #[error("key {index}: invalid private key: {reason}")]
    /// A private key is malformed.
    InvalidPrivateKey {
        /// Position in the key file.
        index: usize,
        /// Why the key was rejected.
        reason: String,
    },
    #[error("key {index}: private key does not belong to the declared public key")]
    /// The private key derives a different public key.
    KeyMismatch {
        /// Position in the key file.
        index: usize,
    },
    #[error("key {index}: declared address {declared} does not match the public key")]
    /// The declared Lisk32 address is not derived from the public key.
    AddressMismatch {
        /// Position in the key file.
        index: usize,
        /// Declared address text.
        declared: String,
    },
    #[error("no private key available for public key 0x{public_key}")]
    /// A declared multisig key has no private key in the key material.
    MissingKey {
        /// Hex of the public key.
        public_key: String,
    },
    #[error("no private key available for account {address}")]
    /// A regular account's owner key is absent from the key material.
    MissingAddress {
        /// Lisk32 address of the account.
        address: String,
    },
}

/// One entry of the key-material file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFileEntry {
    /// Lisk32 address of the key.
    pub address: String,
    /// ed25519 public key as hex.
    pub public_key: String,
    /// ed25519 private key as hex.
    pub private_key: String,
}

#[derive(Debug, Deserialize)]
struct KeyFile {
    keys: Vec<KeyFileEntry>,
}

/// Reads the key-material file.
pub fn read_key_file(path: &Path) -> Result<Vec<KeyFileEntry>, KeyError> {
    let bytes = std::fs::read(path).map_err(|source| KeyError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file: KeyFile = serde_json::from_slice(&bytes).map_err(|source| KeyError::Json {
        path: path.display().to_string(),
        source,
    })?;
    Ok(file.keys)
}

/// Signing keys indexed by public key and by account address.
pub struct KeyRing {
    by_public_key: HashMap<PublicKey, SigningKey>,
    by_address: HashMap<Address, PublicKey>,
}

impl KeyRing {
    /// Validates every entry and builds both indexes.
    pub fn from_entries(entries: &[KeyFileEntry]) -> Result<Self, KeyError> {
        let mut by_public_key = HashMap::with_capacity(entries.len());
        let mut by_address = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let public_key: PublicKey = from_hex_array(&entry.public_key)
                .map_err(|_| KeyError::InvalidPublicKey { index })?;
            let signing = signing_key_from_hex(index, &entry.private_key)?;
            if signing.verifying_key().to_bytes() != public_key {
                return Err(KeyError::KeyMismatch { index });
            }
            let address = Address::from_public_key(&public_key);
            if Address::from_lisk32(&entry.address).ok() != Some(address) {
                return Err(KeyError::AddressMismatch {
                    index,
                    declared: entry.address.clone(),
                });
            }
            by_address.insert(address, public_key);
            by_public_key.insert(public_key, signing);
        }
        Ok(Self {
            by_public_key,
            by_address,
        })
    }

    /// Loads and indexes a key-material file.
    pub fn load(path: &Path) -> Result<Self, KeyError> {
        Self::from_entries(&read_key_file(path)?)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.by_public_key.len()
    }

    /// Returns `true` when no keys are loaded.
    pub fn is_empty(&self) -> bool {
        self.by_public_key.is_empty()
    }

    /// Signing key for a declared public key.
    pub fn signer(&self, public_key: &PublicKey) -> Result<&SigningKey, KeyError> {
        self.by_public_key
            .get(public_key)
            .ok_or_else(|| KeyError::MissingKey {
                public_key: hex::encode(public_key),
            })
    }

    /// Public key that owns a regular account's address.
    pub fn owner_of(&self, address: &Address) -> Result<PublicKey, KeyError> {
        self.by_address
            .get(address)
            .copied()
            .ok_or_else(|| KeyError::MissingAddress {
                address: address.to_lisk32(),
            })
    }

    /// Ordered public keys that must sign for `record`: the owner of a
    /// regular account, or every mandatory then optional key of a multisig.
    pub fn signers_for(&self, record: &AccountRecord) -> Result<Vec<PublicKey>, KeyError> {
        match &record.auth {
            AuthKind::Regular => Ok(vec![self.owner_of(&record.target_address)?]),
            AuthKind::Multisig {
                mandatory_keys,
                optional_keys,
                ..
            } => Ok(mandatory_keys
                .iter()
                .chain(optional_keys.iter())
                .copied()
                .collect()),
        }
    }

    /// Checks up front that every signer of every record is available.
    pub fn ensure_covers<'a>(
        &self,
        records: impl IntoIterator<Item = &'a AccountRecord>,
    ) -> Result<(), KeyError> {
        for record in records {
            for public_key in self.signers_for(record)? {
                self.signer(&public_key)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyRing({} keys, <redacted>)", self.by_public_key.len())
    }
}

fn signing_key_from_hex(index: usize, text: &str) -> Result<SigningKey, KeyError> {
    let invalid = |reason: String| KeyError::InvalidPrivateKey { index, reason };
    let bytes = from_hex(text).map_err(|err| invalid(err.to_string()))?;
    match bytes.len() {
        SECRET_KEY_LENGTH => {
            let mut secret = [0u8; SECRET_KEY_LENGTH];
            secret.copy_from_slice(&bytes);
            Ok(SigningKey::from_bytes(&secret))
        }
        KEYPAIR_LENGTH => {
            let mut pair = [0u8; KEYPAIR_LENGTH];
            pair.copy_from_slice(&bytes);
            SigningKey::from_keypair_bytes(&pair).map_err(|_| KeyError::KeyMismatch { index })
        }
        other => Err(invalid(format!("unexpected length {other}"))),
    }
}
