use alloy::primitives::U256;
use tokenlink_core::{format_amount, is_decimal_string, parse_amount};

#[test]
fn token_balance_with_six_decimals() {
    assert_eq!(format_amount(U256::from(1_500_000u64), 6).expect("format"), "1.5");
}

#[test]
fn native_balance_with_eighteen_decimals() {
    let one_and_quarter = U256::from(1_250_000_000_000_000_000u128);
    assert_eq!(format_amount(one_and_quarter, 18).expect("format"), "1.25");
    assert_eq!(format_amount(U256::ZERO, 18).expect("format"), "0.0");
}

#[test]
fn small_amounts_keep_leading_zeros() {
    assert_eq!(format_amount(U256::from(1u8), 6).expect("format"), "0.000001");
}

#[test]
fn transfer_amount_scales_to_token_precision() {
    assert_eq!(parse_amount("2.5", 6).expect("parse"), U256::from(2_500_000u64));
    assert_eq!(parse_amount(" 10 ", 6).expect("parse"), U256::from(10_000_000u64));
}

#[test]
fn invalid_amounts_are_rejected() {
    assert!(parse_amount("", 6).is_err());
    assert!(parse_amount("abc", 6).is_err());
    assert!(parse_amount("-1", 6).is_err());
}

#[test]
fn formatted_amounts_are_decimal_strings() {
    for raw in [0u64, 1, 999_999, 1_000_000, 123_456_789] {
        let formatted = format_amount(U256::from(raw), 6).expect("format");
        assert!(is_decimal_string(&formatted), "{formatted}");
    }
}
