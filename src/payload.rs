//! Leaf payload packing.
//!
//! Payloads are tightly packed (Solidity `abi.encodePacked` layout, no
//! padding between fields):
//!
//! | field          | width | regular | multisig |
//! |----------------|-------|---------|----------|
//! | target address | 20    | yes     | yes      |
//! | balance units  | 8 BE  | yes     | yes      |
//! | threshold      | 32 BE | `0`     | yes      |
//! | mandatory keys | 32 each | -     | yes      |
//! | optional keys  | 32 each | -     | yes      |
//!
//! The receiving contract decodes exactly this layout, so any change here
//! silently invalidates every proof.

use crate::ledger::{AccountRecord, AuthKind, PublicKey};
use crate::lisk32::ADDRESS_LENGTH;
use thiserror::Error;

const UNITS_LENGTH: usize = 8;
const THRESHOLD_LENGTH: usize = 32;
const KEY_LENGTH: usize = 32;
/// Length of a regular account payload.
pub const REGULAR_PAYLOAD_LENGTH: usize = ADDRESS_LENGTH + UNITS_LENGTH + THRESHOLD_LENGTH;

/// Errors raised while decoding a packed payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload is {0} bytes, shorter than the 60-byte header")]
    /// The payload cannot hold address, balance and threshold.
    Truncated(usize),
    #[error("key section of {0} bytes is not a whole number of keys")]
    /// Trailing bytes after the header do not split into 32-byte keys.
    PartialKey(usize),
    #[error("threshold does not fit into 32 bits")]
    /// The 32-byte threshold word carries high-order bits.
    ThresholdOverflow,
    #[error("regular payload carries {0} trailing key bytes")]
    /// A zero threshold was followed by key material.
    KeysWithoutThreshold(usize),
    #[error("multisig split of {mandatory} mandatory keys exceeds {available} keys")]
    /// The caller's mandatory count does not fit the decoded key list.
    KeySplit {
        /// Requested mandatory key count.
        mandatory: usize,
        /// Keys present in the payload.
        available: usize,
    },
}

/// Packs an account record into its leaf payload.
pub fn encode(record: &AccountRecord) -> Vec<u8> {
    let keys = record.auth.mandatory_keys().len() + record.auth.optional_keys().len();
    let mut out = Vec::with_capacity(REGULAR_PAYLOAD_LENGTH + keys * KEY_LENGTH);
    out.extend_from_slice(record.target_address.as_bytes());
    out.extend_from_slice(&record.balance_units.to_be_bytes());
    match &record.auth {
        AuthKind::Regular => out.extend_from_slice(&u256_from_u64(0)),
        AuthKind::Multisig {
            threshold,
            mandatory_keys,
            optional_keys,
        } => {
            out.extend_from_slice(&u256_from_u64(u64::from(*threshold)));
            for key in mandatory_keys.iter().chain(optional_keys.iter()) {
                out.extend_from_slice(key);
            }
        }
    }
    out
}

fn u256_from_u64(value: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&value.to_be_bytes());
    out
}

/// Fields recovered from a packed payload, as the receiving contract sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPayload {
    /// 20-byte target address.
    pub address: [u8; ADDRESS_LENGTH],
    /// Balance in base units.
    pub balance_units: u64,
    /// Signature threshold; `0` for regular accounts.
    pub threshold: u32,
    /// Mandatory keys followed by optional keys.
    pub keys: Vec<PublicKey>,
}

impl DecodedPayload {
    /// Splits the key list into `(mandatory, optional)` given the mandatory count
    /// supplied alongside the payload at redemption.
    pub fn split_keys(
        &self,
        mandatory: usize,
    ) -> Result<(&[PublicKey], &[PublicKey]), PayloadError> {
        if mandatory > self.keys.len() {
            return Err(PayloadError::KeySplit {
                mandatory,
                available: self.keys.len(),
            });
        }
        Ok(self.keys.split_at(mandatory))
    }
}

/// Unpacks a payload produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<DecodedPayload, PayloadError> {
    if bytes.len() < REGULAR_PAYLOAD_LENGTH {
        return Err(PayloadError::Truncated(bytes.len()));
    }
    let (address_bytes, rest) = bytes.split_at(ADDRESS_LENGTH);
    let (units_bytes, rest) = rest.split_at(UNITS_LENGTH);
    let (threshold_bytes, key_bytes) = rest.split_at(THRESHOLD_LENGTH);

    let mut address = [0u8; ADDRESS_LENGTH];
    address.copy_from_slice(address_bytes);
    let mut units = [0u8; UNITS_LENGTH];
    units.copy_from_slice(units_bytes);

    if threshold_bytes[..THRESHOLD_LENGTH - 4].iter().any(|b| *b != 0) {
        return Err(PayloadError::ThresholdOverflow);
    }
    let mut low = [0u8; 4];
    low.copy_from_slice(&threshold_bytes[THRESHOLD_LENGTH - 4..]);
    let threshold = u32::from_be_bytes(low);

    if key_bytes.len() % KEY_LENGTH != 0 {
        return Err(PayloadError::PartialKey(key_bytes.len()));
    }
    if threshold == 0 && !key_bytes.is_empty() {
        return Err(PayloadError::KeysWithoutThreshold(key_bytes.len()));
    }
    let keys = key_bytes
        .chunks_exact(KEY_LENGTH)
        .map(|chunk| {
            let mut key = [0u8; KEY_LENGTH];
            key.copy_from_slice(chunk);
            key
        })
        .collect();

    Ok(DecodedPayload {
        address,
        balance_units: u64::from_be_bytes(units),
        threshold,
        keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lisk32::Address;

    fn record(auth: AuthKind) -> AccountRecord {
        let target_address = Address([0x11; ADDRESS_LENGTH]);
        AccountRecord {
            source_address: target_address.to_lisk32(),
            target_address,
            balance: 5.0,
            balance_units: 500_000_000,
            auth,
        }
    }

    #[test]
    fn regular_layout_is_exact() {
        let bytes = encode(&record(AuthKind::Regular));
        let mut expected = vec![0x11; 20];
        expected.extend_from_slice(&[0, 0, 0, 0, 0x1d, 0xcd, 0x65, 0x00]);
        expected.extend_from_slice(&[0u8; 32]);
        assert_eq!(bytes, expected);
        assert_eq!(bytes.len(), REGULAR_PAYLOAD_LENGTH);
    }

    #[test]
    fn regular_decodes_to_zero_threshold() {
        let decoded = decode(&encode(&record(AuthKind::Regular))).unwrap();
        assert_eq!(decoded.address, [0x11; 20]);
        assert_eq!(decoded.balance_units, 500_000_000);
        assert_eq!(decoded.threshold, 0);
        assert!(decoded.keys.is_empty());
    }

    #[test]
    fn multisig_packs_keys_in_declared_order() {
        let auth = AuthKind::Multisig {
            threshold: 2,
            mandatory_keys: vec![[0xaa; 32]],
            optional_keys: vec![[0x01; 32], [0xbb; 32]],
        };
        let bytes = encode(&record(auth));
        assert_eq!(bytes.len(), 60 + 3 * 32);
        assert_eq!(bytes[59], 2);
        assert_eq!(&bytes[60..92], &[0xaa; 32]);
        assert_eq!(&bytes[92..124], &[0x01; 32]);
        assert_eq!(&bytes[124..], &[0xbb; 32]);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.threshold, 2);
        let (mandatory, optional) = decoded.split_keys(1).unwrap();
        assert_eq!(mandatory, &[[0xaa; 32]]);
        assert_eq!(optional, &[[0x01; 32], [0xbb; 32]]);
    }

    #[test]
    fn decoder_rejects_malformed_payloads() {
        assert_eq!(decode(&[0u8; 59]), Err(PayloadError::Truncated(59)));
        let mut bytes = encode(&record(AuthKind::Regular));
        bytes.push(0);
        assert_eq!(decode(&bytes), Err(PayloadError::PartialKey(1)));
        let mut bytes = encode(&record(AuthKind::Regular));
        bytes.extend_from_slice(&[7u8; 32]);
        assert_eq!(decode(&bytes), Err(PayloadError::KeysWithoutThreshold(32)));
        let mut bytes = encode(&record(AuthKind::Regular));
        bytes[28] = 1;
        assert_eq!(decode(&bytes), Err(PayloadError::ThresholdOverflow));
    }
}
