//! Leaf nodes: a record, its packed payload and the payload's Keccak digest.
//!
//! Later stages correlate records by leaf hash rather than by position, so
//! two accounts encoding to the same payload are rejected here instead of
//! collapsing into one leaf.

use crate::hash::{leaf_hash, Digest32};
use crate::ledger::{AccountRecord, LedgerError};
use crate::payload;
use std::collections::HashMap;

/// One hashed ledger account.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    /// Keccak-256 of `payload`.
    pub hash: Digest32,
    /// Packed payload.
    pub payload: Vec<u8>,
    /// Record the payload was encoded from.
    pub record: AccountRecord,
}

impl LeafNode {
    /// Encodes and hashes a record.
    pub fn from_record(record: AccountRecord) -> Self {
        let payload = payload::encode(&record);
        Self {
            hash: leaf_hash(&payload),
            payload,
            record,
        }
    }
}

/// Builds one leaf per record, keeping ledger order.
pub fn build_leaves(records: Vec<AccountRecord>) -> Result<Vec<LeafNode>, LedgerError> {
    let mut seen: HashMap<Digest32, usize> = HashMap::with_capacity(records.len());
    let mut leaves = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let leaf = LeafNode::from_record(record);
        if let Some(first) = seen.insert(leaf.hash, index) {
            return Err(LedgerError::DuplicatePayload {
                first,
                second: index,
            });
        }
        leaves.push(leaf);
    }
    Ok(leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::keccak256;
    use crate::ledger::AuthKind;
    use crate::lisk32::Address;

    fn record(seed: u8, units: u64) -> AccountRecord {
        let target_address = Address([seed; 20]);
        AccountRecord {
            source_address: target_address.to_lisk32(),
            target_address,
            balance: 0.0,
            balance_units: units,
            auth: AuthKind::Regular,
        }
    }

    #[test]
    fn hash_is_keccak_of_payload() {
        let leaf = LeafNode::from_record(record(1, 10));
        assert_eq!(leaf.hash, keccak256(&leaf.payload));
        assert_eq!(leaf.payload.len(), 60);
    }

    #[test]
    fn identical_payloads_are_rejected() {
        let err = build_leaves(vec![record(1, 10), record(2, 10), record(1, 10)]).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::DuplicatePayload {
                first: 0,
                second: 2
            }
        ));
    }

    #[test]
    fn order_is_preserved() {
        let leaves = build_leaves(vec![record(3, 1), record(1, 1), record(2, 1)]).unwrap();
        let seeds: Vec<u8> = leaves.iter().map(|l| l.record.target_address.0[0]).collect();
        assert_eq!(seeds, vec![3, 1, 2]);
    }
}
