//! Fixture ledger generation from a key-material file.
//!
//! Layout of a generated ledger:
//!
//! * entries `0 .. regular` are regular accounts owned by keys `0 .. regular`;
//! * one multisig entry per archetype follows, each owned by the next unused
//!   key address;
//! * an archetype's mandatory keys are `keys[0 .. mandatory]` and its optional
//!   keys are `keys[mandatory .. mandatory + optional]`, always counted from
//!   the start of the key file.
//!
//! The key-index rule is a fixture convention only.  Signing resolves keys
//! by public key, never by these indexes.

use crate::amount::{units_to_f64, UNITS_PER_TOKEN};
use crate::keys::KeyFileEntry;
use crate::ledger::{BalanceValue, LedgerEntry, LedgerError};
use crate::prng::SimplePrng;
use tracing::debug;

/// Number of regular accounts in the default fixture.
pub const REGULAR_ACCOUNTS: usize = 50;

/// Shape of one generated multisig account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultisigArchetype {
    /// Signature threshold.
    pub threshold: u32,
    /// Number of mandatory keys.
    pub mandatory: usize,
    /// Number of optional keys.
    pub optional: usize,
}

/// Default archetypes: 3 of 3M, 2 of 1M+2O, 5 of 3M+3O, 64 of 64M.
pub const DEFAULT_ARCHETYPES: [MultisigArchetype; 4] = [
    MultisigArchetype {
        threshold: 3,
        mandatory: 3,
        optional: 0,
    },
    MultisigArchetype {
        threshold: 2,
        mandatory: 1,
        optional: 2,
    },
    MultisigArchetype {
        threshold: 5,
        mandatory: 3,
        optional: 3,
    },
    MultisigArchetype {
        threshold: 64,
        mandatory: 64,
        optional: 0,
    },
];

/// Supplies the balance of the account at a ledger position.
pub trait BalanceSource {
    /// Balance, in base units, for the entry at `position`.
    fn balance_units(&mut self, position: usize) -> u64;
}

/// `position + u` tokens with `u` drawn uniformly from `[0, 1)` at 8 decimals.
#[derive(Debug, Clone)]
pub struct SeededBalances {
    prng: SimplePrng,
}

impl SeededBalances {
    /// Creates a balance stream from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            prng: SimplePrng::new(seed),
        }
    }
}

impl BalanceSource for SeededBalances {
    fn balance_units(&mut self, position: usize) -> u64 {
        (position as u64) * UNITS_PER_TOKEN + self.prng.gen_below(UNITS_PER_TOKEN)
    }
}

/// Requested fixture ledger shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureShape {
    /// Number of regular accounts.
    pub regular: usize,
    /// Multisig accounts appended after the regular ones.
    pub archetypes: Vec<MultisigArchetype>,
}

impl Default for FixtureShape {
    fn default() -> Self {
        Self {
            regular: REGULAR_ACCOUNTS,
            archetypes: DEFAULT_ARCHETYPES.to_vec(),
        }
    }
}

impl FixtureShape {
    /// Key-file entries needed to generate this shape.
    pub fn required_keys(&self) -> usize {
        let owners = self.regular + self.archetypes.len();
        let widest = self
            .archetypes
            .iter()
            .map(|a| a.mandatory + a.optional)
            .max()
            .unwrap_or(0);
        owners.max(widest)
    }
}

/// Generates a ledger of `shape` from the key-material entries.
pub fn generate(
    keys: &[KeyFileEntry],
    shape: &FixtureShape,
    balances: &mut impl BalanceSource,
) -> Result<Vec<LedgerEntry>, LedgerError> {
    let required = shape.required_keys();
    if keys.len() < required {
        return Err(LedgerError::InsufficientKeyMaterial {
            required,
            available: keys.len(),
        });
    }

    let mut entries = Vec::with_capacity(shape.regular + shape.archetypes.len());
    for (position, key) in keys.iter().take(shape.regular).enumerate() {
        entries.push(LedgerEntry {
            address: key.address.clone(),
            balance: BalanceValue::Number(units_to_f64(balances.balance_units(position))),
            threshold: None,
            mandatory_keys: None,
            optional_keys: None,
        });
    }

    for archetype in &shape.archetypes {
        let position = entries.len();
        let public_keys = |range: std::ops::Range<usize>| -> Vec<String> {
            keys[range].iter().map(|k| k.public_key.clone()).collect()
        };
        let mandatory_end = archetype.mandatory;
        let optional_end = mandatory_end + archetype.optional;
        entries.push(LedgerEntry {
            address: keys[position].address.clone(),
            balance: BalanceValue::Number(units_to_f64(balances.balance_units(position))),
            threshold: Some(archetype.threshold),
            mandatory_keys: Some(public_keys(0..mandatory_end)),
            optional_keys: Some(public_keys(mandatory_end..optional_end)),
        });
    }

    debug!(
        regular = shape.regular,
        multisig = shape.archetypes.len(),
        "fixture ledger generated"
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::tests::entry;
    use crate::ledger::{records_from_entries, AuthKind};

    struct Flat;

    impl BalanceSource for Flat {
        fn balance_units(&mut self, position: usize) -> u64 {
            position as u64 + 1
        }
    }

    fn key_file(count: u8) -> Vec<KeyFileEntry> {
        (1..=count).map(|seed| entry(seed, false)).collect()
    }

    #[test]
    fn default_shape_needs_sixty_four_keys() {
        assert_eq!(FixtureShape::default().required_keys(), 64);
    }

    #[test]
    fn multisig_keys_are_drawn_from_the_start() {
        let keys = key_file(8);
        let shape = FixtureShape {
            regular: 3,
            archetypes: vec![
                MultisigArchetype {
                    threshold: 2,
                    mandatory: 1,
                    optional: 2,
                },
                MultisigArchetype {
                    threshold: 2,
                    mandatory: 2,
                    optional: 0,
                },
            ],
        };
        let entries = generate(&keys, &shape, &mut Flat).unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[3].address, keys[3].address);
        assert_eq!(entries[4].address, keys[4].address);

        let records = records_from_entries(&entries).unwrap();
        let first = &records[3].auth;
        assert_eq!(first.threshold(), 2);
        assert_eq!(first.mandatory_keys().len(), 1);
        assert_eq!(first.optional_keys().len(), 2);
        assert_eq!(hex::encode(first.optional_keys()[1]), keys[2].public_key);
        assert_eq!(hex::encode(records[4].auth.mandatory_keys()[1]), keys[1].public_key);
        assert_eq!(records[0].auth, AuthKind::Regular);
        assert_eq!(records[2].balance_units, 3);
    }

    #[test]
    fn seeded_balances_are_reproducible_and_bounded() {
        let keys = key_file(70);
        let shape = FixtureShape::default();
        let a = generate(&keys, &shape, &mut SeededBalances::new(5)).unwrap();
        let b = generate(&keys, &shape, &mut SeededBalances::new(5)).unwrap();
        assert_eq!(a, b);
        let records = records_from_entries(&a).unwrap();
        for (position, record) in records.iter().enumerate() {
            assert_eq!(record.balance_units / UNITS_PER_TOKEN, position as u64);
        }
        assert_eq!(records.len(), 54);
        assert_eq!(records[53].auth.mandatory_keys().len(), 64);
    }

    #[test]
    fn too_few_keys_is_malformed() {
        let err = generate(&key_file(10), &FixtureShape::default(), &mut Flat).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientKeyMaterial {
                required: 64,
                available: 10
            }
        ));
    }
}
