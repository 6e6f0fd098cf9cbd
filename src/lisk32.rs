//! Lisk32 address codec.
//!
//! A Lisk32 address is the prefix `lsk` followed by 38 characters of a
//! custom base32 alphabet: 32 characters carry the 20-byte account address,
//! the remaining 6 carry a BCH checksum over those characters.  The 20-byte
//! address itself is the first 20 bytes of `sha256(public_key)`.

use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Human-readable prefix of mainnet and testnet Lisk32 addresses.
pub const LISK32_PREFIX: &str = "lsk";
/// Length of the binary account address.
pub const ADDRESS_LENGTH: usize = 20;

const CHARSET: &[u8; 32] = b"zxvcpmbn3465o978uyrtkqew2adsjhfg";
const GENERATOR: [u32; 5] = [0x3b6a_57b2, 0x2650_8e6d, 0x1ea1_19fa, 0x3d42_33dd, 0x2a14_62b3];
const DATA_CHARS: usize = 32;
const CHECKSUM_CHARS: usize = 6;
const ENCODED_CHARS: usize = DATA_CHARS + CHECKSUM_CHARS;

/// Errors raised while decoding a Lisk32 address string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Lisk32Error {
    #[error("address does not start with 'lsk'")]
    /// The address is missing the `lsk` prefix.
    MissingPrefix,
    #[error("address body must be 38 characters, found {0}")]
    /// The body after the prefix has the wrong length.
    InvalidLength(usize),
    #[error("invalid character '{0}' in address")]
    /// The body contains a character outside the Lisk32 alphabet.
    InvalidCharacter(char),
    #[error("address checksum mismatch")]
    /// The trailing checksum does not match the encoded data.
    InvalidChecksum,
}

/// A 20-byte account address, displayed in Lisk32 form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// Derives the address controlled by an ed25519 public key.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let digest = Sha256::digest(public_key);
        let mut out = [0u8; ADDRESS_LENGTH];
        out.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Self(out)
    }

    /// Parses and checksum-validates a Lisk32 address string.
    pub fn from_lisk32(input: &str) -> Result<Self, Lisk32Error> {
        let body = input
            .strip_prefix(LISK32_PREFIX)
            .ok_or(Lisk32Error::MissingPrefix)?;
        if body.len() != ENCODED_CHARS {
            return Err(Lisk32Error::InvalidLength(body.chars().count()));
        }
        let mut words = Vec::with_capacity(ENCODED_CHARS);
        for ch in body.chars() {
            let index = CHARSET
                .iter()
                .position(|c| char::from(*c) == ch)
                .ok_or(Lisk32Error::InvalidCharacter(ch))?;
            words.push(index as u8);
        }
        if polymod(&words) != 1 {
            return Err(Lisk32Error::InvalidChecksum);
        }
        let bytes = convert_bits(&words[..DATA_CHARS], 5, 8);
        let mut out = [0u8; ADDRESS_LENGTH];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    /// Renders the address in Lisk32 form.
    pub fn to_lisk32(&self) -> String {
        let mut words = convert_bits(&self.0, 8, 5);
        words.extend(create_checksum(&words));
        let mut out = String::with_capacity(LISK32_PREFIX.len() + ENCODED_CHARS);
        out.push_str(LISK32_PREFIX);
        for word in words {
            out.push(char::from(CHARSET[word as usize]));
        }
        out
    }

    /// Raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_lisk32())
    }
}

fn polymod(words: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for &value in words {
        let top = chk >> 25;
        chk = ((chk & 0x1ff_ffff) << 5) ^ u32::from(value);
        for (i, gen) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= gen;
            }
        }
    }
    chk
}

fn create_checksum(words: &[u8]) -> Vec<u8> {
    let mut values = words.to_vec();
    values.extend_from_slice(&[0u8; CHECKSUM_CHARS]);
    let residue = polymod(&values) ^ 1;
    (0..CHECKSUM_CHARS)
        .map(|p| ((residue >> (5 * (CHECKSUM_CHARS - 1 - p))) & 31) as u8)
        .collect()
}

// Regroups a bit stream; input widths here always divide evenly, so no padding
// is emitted.
fn convert_bits(input: &[u8], from: u32, to: u32) -> Vec<u8> {
    let max = (1u32 << to) - 1;
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(input.len() * from as usize / to as usize);
    for &value in input {
        acc = (acc << from) | u32::from(value);
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max) as u8);
        }
        acc &= (1u32 << bits) - 1;
    }
    out
}
