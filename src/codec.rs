//! `0x`-prefixed hex helpers used at the JSON boundary.

use thiserror::Error;

/// Errors raised while decoding a hex field.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HexError {
    #[error("invalid hex: {0}")]
    /// The text is not valid hex.
    Invalid(#[from] hex::FromHexError),
    #[error("expected {expected} bytes, found {found}")]
    /// The decoded byte string has the wrong width.
    Length {
        /// Required width in bytes.
        expected: usize,
        /// Decoded width in bytes.
        found: usize,
    },
}

/// Encodes bytes as lowercase hex with a `0x` prefix.
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decodes hex text, with or without a `0x` prefix.
pub fn from_hex(text: &str) -> Result<Vec<u8>, HexError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    Ok(hex::decode(body)?)
}

/// Decodes hex text into a fixed-width byte array.
pub fn from_hex_array<const N: usize>(text: &str) -> Result<[u8; N], HexError> {
    let bytes = from_hex(text)?;
    let found = bytes.len();
    bytes
        .try_into()
        .map_err(|_| HexError::Length { expected: N, found })
}
