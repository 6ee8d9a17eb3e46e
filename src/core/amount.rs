//! XMR amount conversion between user-entered decimal strings and atomic units

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::core::errors::WalletError;

/// 1 XMR = 10^12 piconero.
pub const ATOMIC_UNITS_PER_XMR: u64 = 1_000_000_000_000;
const DECIMALS: u32 = 12;

/// Parse "1.25" style input into atomic units.
pub fn parse_amount(raw: &str) -> Result<u64, WalletError> {
    let value = Decimal::from_str(raw.trim())
        .map_err(|e| WalletError::ValidationError(format!("invalid amount '{}': {}", raw, e)))?;

    if value.is_sign_negative() {
        return Err(WalletError::ValidationError(format!("negative amount '{}'", raw)));
    }
    if value.normalize().scale() > DECIMALS {
        return Err(WalletError::ValidationError(format!(
            "amount '{}' has more than {} decimal places",
            raw, DECIMALS
        )));
    }

    value
        .checked_mul(Decimal::from(ATOMIC_UNITS_PER_XMR))
        .and_then(|atomic| atomic.to_u64())
        .ok_or_else(|| WalletError::ValidationError(format!("amount '{}' out of range", raw)))
}

pub fn format_amount(atomic: u64) -> String {
    Decimal::from_i128_with_scale(atomic as i128, DECIMALS).normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1").unwrap(), ATOMIC_UNITS_PER_XMR);
        assert_eq!(parse_amount("0.5").unwrap(), 500_000_000_000);
        assert_eq!(parse_amount(" 0.000000000001 ").unwrap(), 1);
    }

    #[test]
    fn test_parse_amount_rejects_bad_input() {
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("0.0000000000001").is_err());
        assert!(parse_amount("99999999999999999999").is_err());
        assert!(parse_amount("18446745").is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_500_000_000_000), "1.5");
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(1), "0.000000000001");
    }

    proptest! {
        #[test]
        fn formatted_amounts_parse_back(atomic in 0u64..=u64::MAX / 2) {
            prop_assert_eq!(parse_amount(&format_amount(atomic)).unwrap(), atomic);
        }
    }
}
