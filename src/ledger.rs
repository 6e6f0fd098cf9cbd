//! Migration ledger records and the JSON ledger loader.
//!
//! The ledger file is an array of entries:
//!
//! ```json
//! [
//!   { "address": "lsk...", "balance": 12.5 },
//!   { "address": "lsk...", "balance": 3, "threshold": 2,
//!     "mandatoryKeys": ["<hex>"], "optionalKeys": ["<hex>", "<hex>"] }
//! ]
//! ```
//!
//! An entry without a threshold (or with threshold `0`) is a regular
//! single-key account.  The decision is made once here and carried as
//! [`AuthKind`], so no later stage inspects optional fields again.

use crate::amount::{self, AmountError};
use crate::codec::from_hex_array;
use crate::lisk32::{Address, Lisk32Error};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// A 32-byte ed25519 public key.
pub type PublicKey = [u8; 32];

/// Reasons a ledger cannot be turned into account records.  All of them are
/// fatal to a run.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read ledger {path}: {source}")]
    /// The ledger file could not be read.
    Io {
        /// Ledger path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    #[error("invalid ledger JSON in {path}: {source}")]
    /// The ledger file is not an array of well-formed entries.
    Json {
        /// Ledger path.
        path: String,
        /// Underlying decode error.
        source: serde_json::Error,
    },
    #[error("ledger contains no accounts")]
    /// The ledger has no entries.
    Empty,
    #[error("entry {index}: invalid address '{address}': {source}")]
    /// The source address is not a valid Lisk32 address.
    InvalidAddress {
        /// Position of the entry in the ledger.
        index: usize,
        /// Offending address text.
        address: String,
        /// Decoder failure.
        source: Lisk32Error,
    },
    #[error("entry {index}: invalid balance: {source}")]
    /// The balance cannot be converted into base units.
    InvalidBalance {
        /// Position of the entry in the ledger.
        index: usize,
        /// Conversion failure.
        source: AmountError,
    },
    #[error("entry {index}: invalid public key '{key}'")]
    /// A declared key is not 32 bytes of hex.
    InvalidPublicKey {
        /// Position of the entry in the ledger.
        index: usize,
        /// Offending key text.
        key: String,
    },
    #[error("entry {index}: key lists given without a signature threshold")]
    /// A regular entry carries multisig key lists.
    UnexpectedKeys {
        /// Position of the entry in the ledger.
        index: usize,
    },
    #[error("entry {index}: multisig account has no mandatory keys")]
    /// A multisig entry declares no mandatory key.
    NoMandatoryKeys {
        /// Position of the entry in the ledger.
        index: usize,
    },
    #[error("entry {index}: threshold {threshold} exceeds the {keys} declared keys")]
    /// The threshold cannot be met by the declared key set.
    ThresholdOutOfRange {
        /// Position of the entry in the ledger.
        index: usize,
        /// Declared threshold.
        threshold: u32,
        /// Number of mandatory plus optional keys.
        keys: usize,
    },
    #[error("entry {index}: key {key} is declared more than once")]
    /// The same public key appears twice in one account's key set.
    DuplicateKey {
        /// Position of the entry in the ledger.
        index: usize,
        /// Hex of the repeated key.
        key: String,
    },
    #[error("entries {first} and {second} encode to the same leaf payload")]
    /// Two accounts would produce indistinguishable leaves.
    DuplicatePayload {
        /// Earlier entry position.
        first: usize,
        /// Later entry position.
        second: usize,
    },
    #[error("key material holds {available} entries but {required} are required")]
    /// The fixture key source is too small for the requested ledger shape.
    InsufficientKeyMaterial {
        /// Entries needed.
        required: usize,
        /// Entries present.
        available: usize,
    },
}

/// Balance as it appears in the ledger file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BalanceValue {
    /// JSON number, e.g. `12.5`.
    Number(f64),
    /// Decimal string, e.g. `"12.5"`, parsed without float rounding.
    Text(String),
}

/// One raw ledger entry as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Lisk32 source address.
    #[serde(alias = "lskAddress")]
    pub address: String,
    /// Balance in whole tokens.
    pub balance: BalanceValue,
    /// Multisig signature threshold; absent or zero for regular accounts.
    #[serde(
        default,
        alias = "numberOfSignatures",
        skip_serializing_if = "Option::is_none"
    )]
    pub threshold: Option<u32>,
    /// Mandatory multisig keys as hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandatory_keys: Option<Vec<String>>,
    /// Optional multisig keys as hex.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_keys: Option<Vec<String>>,
}

/// How an account authorises redemption of its leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthKind {
    /// Single implicit owner: the key whose address is the account address.
    Regular,
    /// Threshold multisig over an ordered key set.
    Multisig {
        /// Minimum number of valid signatures the verifier will demand.
        threshold: u32,
        /// Always-required keys, in ledger order.
        mandatory_keys: Vec<PublicKey>,
        /// Optional keys, in ledger order.
        optional_keys: Vec<PublicKey>,
    },
}

impl AuthKind {
    /// Signature threshold; `0` for regular accounts.
    pub fn threshold(&self) -> u32 {
        match self {
            Self::Regular => 0,
            Self::Multisig { threshold, .. } => *threshold,
        }
    }

    /// Mandatory keys (empty for regular accounts).
    pub fn mandatory_keys(&self) -> &[PublicKey] {
        match self {
            Self::Regular => &[],
            Self::Multisig { mandatory_keys, .. } => mandatory_keys,
        }
    }

    /// Optional keys (empty for regular accounts).
    pub fn optional_keys(&self) -> &[PublicKey] {
        match self {
            Self::Regular => &[],
            Self::Multisig { optional_keys, .. } => optional_keys,
        }
    }
}

/// A validated ledger account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRecord {
    /// Lisk32 address as written in the ledger.
    pub source_address: String,
    /// 20-byte address carried by `source_address`.
    pub target_address: Address,
    /// Balance in whole tokens, as loaded.
    pub balance: f64,
    /// `floor(balance * 10^8)`.
    pub balance_units: u64,
    /// Authorisation scheme.
    pub auth: AuthKind,
}

impl AccountRecord {
    /// Validates one ledger entry at position `index`.
    pub fn from_entry(index: usize, entry: &LedgerEntry) -> Result<Self, LedgerError> {
        let target_address =
            Address::from_lisk32(&entry.address).map_err(|source| LedgerError::InvalidAddress {
                index,
                address: entry.address.clone(),
                source,
            })?;

        let (balance, balance_units) = match &entry.balance {
            BalanceValue::Number(value) => (*value, amount::units_from_f64(*value)),
            BalanceValue::Text(text) => {
                let units = amount::units_from_decimal_str(text);
                let value = units.as_ref().map(|u| amount::units_to_f64(*u)).unwrap_or(0.0);
                (value, units)
            }
        };
        let balance_units =
            balance_units.map_err(|source| LedgerError::InvalidBalance { index, source })?;

        let mandatory = parse_keys(index, entry.mandatory_keys.as_deref())?;
        let optional = parse_keys(index, entry.optional_keys.as_deref())?;

        let auth = match entry.threshold {
            None | Some(0) => {
                if !mandatory.is_empty() || !optional.is_empty() {
                    return Err(LedgerError::UnexpectedKeys { index });
                }
                AuthKind::Regular
            }
            Some(threshold) => {
                if mandatory.is_empty() {
                    return Err(LedgerError::NoMandatoryKeys { index });
                }
                let keys = mandatory.len() + optional.len();
                if threshold as usize > keys {
                    return Err(LedgerError::ThresholdOutOfRange {
                        index,
                        threshold,
                        keys,
                    });
                }
                let mut seen = HashSet::with_capacity(keys);
                for key in mandatory.iter().chain(optional.iter()) {
                    if !seen.insert(*key) {
                        return Err(LedgerError::DuplicateKey {
                            index,
                            key: hex::encode(key),
                        });
                    }
                }
                AuthKind::Multisig {
                    threshold,
                    mandatory_keys: mandatory,
                    optional_keys: optional,
                }
            }
        };

        Ok(Self {
            source_address: entry.address.clone(),
            target_address,
            balance,
            balance_units,
            auth,
        })
    }
}

fn parse_keys(index: usize, keys: Option<&[String]>) -> Result<Vec<PublicKey>, LedgerError> {
    keys.unwrap_or_default()
        .iter()
        .map(|key| {
            from_hex_array::<32>(key).map_err(|_| LedgerError::InvalidPublicKey {
                index,
                key: key.clone(),
            })
        })
        .collect()
}

/// Validates a parsed ledger, preserving entry order.
pub fn records_from_entries(entries: &[LedgerEntry]) -> Result<Vec<AccountRecord>, LedgerError> {
    if entries.is_empty() {
        return Err(LedgerError::Empty);
    }
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| AccountRecord::from_entry(index, entry))
        .collect()
}

/// Reads raw ledger entries from a JSON file.
pub fn read_entries(path: &Path) -> Result<Vec<LedgerEntry>, LedgerError> {
    let bytes = std::fs::read(path).map_err(|source| LedgerError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| LedgerError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Reads and validates a ledger file.
pub fn load_ledger(path: &Path) -> Result<Vec<AccountRecord>, LedgerError> {
    let entries = read_entries(path)?;
    let records = records_from_entries(&entries)?;
    debug!(path = %path.display(), accounts = records.len(), "ledger loaded");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> String {
        Address::from_public_key(&[1u8; 32]).to_lisk32()
    }

    fn regular(balance: f64) -> LedgerEntry {
        LedgerEntry {
            address: address(),
            balance: BalanceValue::Number(balance),
            threshold: None,
            mandatory_keys: None,
            optional_keys: None,
        }
    }

    fn multisig(threshold: u32, mandatory: &[u8], optional: &[u8]) -> LedgerEntry {
        let keys = |seeds: &[u8]| -> Vec<String> {
            seeds.iter().map(|s| hex::encode([*s; 32])).collect()
        };
        LedgerEntry {
            address: address(),
            balance: BalanceValue::Number(1.0),
            threshold: Some(threshold),
            mandatory_keys: Some(keys(mandatory)),
            optional_keys: Some(keys(optional)),
        }
    }

    #[test]
    fn parses_original_field_names() {
        let json = format!(
            r#"[{{"lskAddress":"{}","balance":0.5,"numberOfSignatures":1,
                "mandatoryKeys":["{}"],"optionalKeys":[]}}]"#,
            address(),
            hex::encode([9u8; 32])
        );
        let entries: Vec<LedgerEntry> = serde_json::from_str(&json).unwrap();
        let records = records_from_entries(&entries).unwrap();
        assert_eq!(records[0].balance_units, 50_000_000);
        assert_eq!(records[0].auth.threshold(), 1);
        assert_eq!(records[0].auth.mandatory_keys(), &[[9u8; 32]]);
    }

    #[test]
    fn string_balances_are_exact() {
        let mut entry = regular(0.0);
        entry.balance = BalanceValue::Text("7.123456789".to_string());
        let record = AccountRecord::from_entry(0, &entry).unwrap();
        assert_eq!(record.balance_units, 712_345_678);
    }

    #[test]
    fn zero_threshold_is_regular() {
        let mut entry = regular(5.0);
        entry.threshold = Some(0);
        let record = AccountRecord::from_entry(0, &entry).unwrap();
        assert_eq!(record.auth, AuthKind::Regular);
        assert_eq!(record.balance_units, 500_000_000);
    }

    #[test]
    fn multisig_keeps_declaration_order() {
        let record = AccountRecord::from_entry(0, &multisig(2, &[3, 1], &[2])).unwrap();
        assert_eq!(record.auth.mandatory_keys(), &[[3u8; 32], [1u8; 32]]);
        assert_eq!(record.auth.optional_keys(), &[[2u8; 32]]);
    }

    #[test]
    fn rejects_inconsistent_multisig() {
        assert!(matches!(
            AccountRecord::from_entry(4, &multisig(3, &[1], &[2])),
            Err(LedgerError::ThresholdOutOfRange {
                index: 4,
                threshold: 3,
                keys: 2
            })
        ));
        assert!(matches!(
            AccountRecord::from_entry(0, &multisig(1, &[], &[2])),
            Err(LedgerError::NoMandatoryKeys { index: 0 })
        ));
        assert!(matches!(
            AccountRecord::from_entry(0, &multisig(2, &[1], &[1])),
            Err(LedgerError::DuplicateKey { .. })
        ));
        let mut keyed_regular = multisig(1, &[1], &[]);
        keyed_regular.threshold = None;
        assert!(matches!(
            AccountRecord::from_entry(0, &keyed_regular),
            Err(LedgerError::UnexpectedKeys { index: 0 })
        ));
    }

    #[test]
    fn rejects_bad_fields() {
        let mut entry = regular(-1.0);
        assert!(matches!(
            AccountRecord::from_entry(2, &entry),
            Err(LedgerError::InvalidBalance { index: 2, .. })
        ));
        entry.balance = BalanceValue::Number(1.0);
        entry.address = "lsknotanaddress".to_string();
        assert!(matches!(
            AccountRecord::from_entry(2, &entry),
            Err(LedgerError::InvalidAddress { index: 2, .. })
        ));
        let mut short_key = multisig(1, &[1], &[]);
        short_key.mandatory_keys = Some(vec!["0xabcd".to_string()]);
        assert!(matches!(
            AccountRecord::from_entry(0, &short_key),
            Err(LedgerError::InvalidPublicKey { .. })
        ));
        assert!(matches!(records_from_entries(&[]), Err(LedgerError::Empty)));
    }
}
