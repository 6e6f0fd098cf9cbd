//! Conversion of decimal token balances into integer base units.
//!
//! Balances arrive as decimal numbers with up to eight significant fraction
//! digits.  Multiplying the binary float by `10^8` misrounds values such as
//! `0.29`, so the conversion works on the shortest decimal rendering of the
//! value and truncates the fraction digit by digit.

use thiserror::Error;

/// Number of fraction digits carried by one base unit.
pub const DECIMALS: usize = 8;
/// Base units per whole token.
pub const UNITS_PER_TOKEN: u64 = 100_000_000;

/// Errors raised while converting a balance into base units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("balance is negative")]
    /// Balances must be non-negative.
    Negative,
    #[error("balance is not a finite number")]
    /// NaN or infinite float input.
    NotFinite,
    #[error("balance '{0}' is not a plain decimal number")]
    /// Text input was empty or contained anything other than digits and one dot.
    InvalidDecimal(String),
    #[error("balance does not fit into 64-bit base units")]
    /// The integer part times `10^8` overflows `u64`.
    Overflow,
}

/// Returns `floor(value * 10^8)` for a decimal string such as `"12.5"`.
pub fn units_from_decimal_str(text: &str) -> Result<u64, AmountError> {
    let text = text.trim();
    if text.starts_with('-') {
        return Err(AmountError::Negative);
    }
    let invalid = || AmountError::InvalidDecimal(text.to_string());
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let mut units: u64 = 0;
    for digit in whole.bytes() {
        units = units
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(digit - b'0')))
            .ok_or(AmountError::Overflow)?;
    }
    units = units
        .checked_mul(UNITS_PER_TOKEN)
        .ok_or(AmountError::Overflow)?;

    let mut scale = UNITS_PER_TOKEN / 10;
    for digit in fraction.bytes().take(DECIMALS) {
        units = units
            .checked_add(u64::from(digit - b'0') * scale)
            .ok_or(AmountError::Overflow)?;
        scale /= 10;
    }
    Ok(units)
}

/// Returns `floor(value * 10^8)` for a float balance.
pub fn units_from_f64(value: f64) -> Result<u64, AmountError> {
    if !value.is_finite() {
        return Err(AmountError::NotFinite);
    }
    if value == 0.0 {
        return Ok(0);
    }
    if value < 0.0 {
        return Err(AmountError::Negative);
    }
    // `Display` for f64 never switches to exponent notation.
    units_from_decimal_str(&value.to_string())
}

/// Renders base units as a decimal token amount without trailing zeros.
pub fn format_units(units: u64) -> String {
    let whole = units / UNITS_PER_TOKEN;
    let fraction = units % UNITS_PER_TOKEN;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{fraction:0width$}", width = DECIMALS);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Converts base units back into a float balance for display fields.
pub fn units_to_f64(units: u64) -> f64 {
    units as f64 / UNITS_PER_TOKEN as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn whole_and_smallest_fraction() {
        assert_eq!(units_from_f64(5.0), Ok(500_000_000));
        assert_eq!(units_from_f64(0.00000001), Ok(1));
        assert_eq!(units_from_decimal_str("0.00000001"), Ok(1));
    }

    #[test]
    fn floors_instead_of_rounding() {
        assert_eq!(units_from_decimal_str("1.999999999"), Ok(199_999_999));
        assert_eq!(units_from_decimal_str("0.000000019"), Ok(1));
    }

    #[test]
    fn binary_float_artifacts_do_not_leak() {
        // 0.29 * 1e8 evaluates to 28999999.999999996 in binary floating point.
        assert_eq!(units_from_f64(0.29), Ok(29_000_000));
        assert_eq!(units_from_f64(12.34567891), Ok(1_234_567_891));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(units_from_f64(-1.5), Err(AmountError::Negative));
        assert_eq!(units_from_f64(f64::NAN), Err(AmountError::NotFinite));
        assert!(matches!(
            units_from_decimal_str("1e5"),
            Err(AmountError::InvalidDecimal(_))
        ));
        assert!(matches!(
            units_from_decimal_str(".5"),
            Err(AmountError::InvalidDecimal(_))
        ));
        assert_eq!(
            units_from_decimal_str("184467440738"),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn formats_without_trailing_zeros() {
        assert_eq!(format_units(500_000_000), "5");
        assert_eq!(format_units(150_000_000), "1.5");
        assert_eq!(format_units(1), "0.00000001");
    }

    proptest! {
        #[test]
        fn decimal_text_floors_to_units(whole in 0u64..1_000_000, frac in 0u64..1_000_000_000) {
            let text = format!("{whole}.{frac:09}");
            let expected = whole * UNITS_PER_TOKEN + frac / 10;
            prop_assert_eq!(units_from_decimal_str(&text), Ok(expected));
        }

        #[test]
        fn formatted_units_parse_back(units in 0u64..u64::MAX / 2) {
            prop_assert_eq!(units_from_decimal_str(&format_units(units)), Ok(units));
        }
    }
}
