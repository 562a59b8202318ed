//! Integer <-> decimal-string conversion at a fixed precision.

use alloy::primitives::utils::{format_units, parse_units, ParseUnits};
use alloy::primitives::U256;

use crate::ports::PortError;

/// Formats `raw` with `decimals` places, trimming trailing zeros but keeping
/// one fractional digit: `1500000 @ 6 -> "1.5"`, `0 -> "0.0"`.
pub fn format_amount(raw: U256, decimals: u8) -> Result<String, PortError> {
    let full = format_units(raw, decimals)
        .map_err(|e| PortError::Validation(format!("cannot format amount: {e}")))?;
    Ok(trim_fraction(full))
}

/// Parses a human amount into base units. Negative amounts are rejected.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, PortError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(PortError::Validation("amount is empty".to_owned()));
    }
    match parse_units(trimmed, decimals)
        .map_err(|e| PortError::Validation(format!("invalid amount '{trimmed}': {e}")))?
    {
        ParseUnits::U256(value) => Ok(value),
        ParseUnits::I256(_) => Err(PortError::Validation(format!(
            "amount must not be negative: {trimmed}"
        ))),
    }
}

/// True for strings `format_amount` can produce.
pub fn is_decimal_string(value: &str) -> bool {
    match value.split_once('.') {
        Some((int, frac)) => {
            !int.is_empty()
                && !frac.is_empty()
                && int.bytes().all(|b| b.is_ascii_digit())
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

fn trim_fraction(mut value: String) -> String {
    if !value.contains('.') {
        value.push_str(".0");
        return value;
    }
    while value.ends_with('0') {
        value.pop();
    }
    if value.ends_with('.') {
        value.push('0');
    }
    value
}
