//! Human-readable amount parsing and fixed-point rendering.
//!
//! Billing managers keep USD fees with 8 decimals (the price feed precision),
//! while native balances are denominated in wei (18 decimals). [`MoneyAmount`]
//! parses what a user typed; [`Denomination`] scales it to an on-chain integer
//! and renders on-chain integers back.
//!
//! # Example
//!
//! ```
//! use subdash_types::amount::Denomination;
//! use alloy_primitives::U256;
//!
//! let fee = Denomination::Usd.parse("$9.99").unwrap();
//! assert_eq!(fee, U256::from(999_000_000u64));
//! assert_eq!(Denomination::Usd.format(fee), "9.99");
//! ```

use alloy_primitives::U256;
use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::LazyLock;

/// Decimals of USD amounts as reported by the price feed.
pub const USD_DECIMALS: u8 = 8;
/// Decimals of the native token.
pub const ETH_DECIMALS: u8 = 18;

/// A parsed, strictly positive decimal amount.
///
/// Preserves the input precision: `"10.50"` has scale 2 and mantissa 1050.
#[derive(Debug, Clone, PartialEq)]
pub struct MoneyAmount(pub Decimal);

impl MoneyAmount {
    /// Number of decimal places in the original input.
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// The value as an unsigned integer without the decimal point.
    pub fn mantissa(&self) -> u128 {
        self.0.mantissa().unsigned_abs()
    }
}

/// Errors produced while validating a user-entered amount.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AmountError {
    /// The input is empty or not a number.
    #[error("Invalid number format")]
    InvalidFormat,
    /// The value is outside the accepted range.
    #[error("Amount must be between {} and {}", limits::MIN_STR, limits::MAX_STR)]
    OutOfRange,
    /// Negative values are not allowed.
    #[error("Negative value is not allowed")]
    Negative,
    /// More decimal places than the denomination supports.
    #[error("Too big of a precision: {money} vs {allowed} allowed")]
    WrongPrecision { money: u32, allowed: u32 },
}

mod limits {
    use super::*;

    pub const MIN_STR: &str = "0.000000000000000001";
    pub const MAX_STR: &str = "999999999";

    pub static MIN: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MIN_STR).expect("valid decimal"));
    pub static MAX: LazyLock<Decimal> =
        LazyLock::new(|| Decimal::from_str(MAX_STR).expect("valid decimal"));
}

static NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,$€£]+").expect("valid regex"));

impl MoneyAmount {
    /// Parses a human-readable amount.
    ///
    /// Currency symbols, thousand separators and whitespace are stripped.
    /// Anything else that is not part of a decimal number makes the input
    /// invalid, so `"12abc"` is rejected rather than read as `12`.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let cleaned = NOISE.replace_all(input.trim(), "");
        if cleaned.is_empty() {
            return Err(AmountError::InvalidFormat);
        }
        let parsed = Decimal::from_str(&cleaned).map_err(|_| AmountError::InvalidFormat)?;
        if parsed.is_sign_negative() && !parsed.is_zero() {
            return Err(AmountError::Negative);
        }
        if parsed < *limits::MIN || parsed > *limits::MAX {
            return Err(AmountError::OutOfRange);
        }
        Ok(MoneyAmount(parsed))
    }
}

impl FromStr for MoneyAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// The unit an on-chain integer is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denomination {
    /// Price-feed USD, 8 decimals.
    Usd,
    /// Native token, 18 decimals.
    Eth,
}

impl Denomination {
    pub fn decimals(&self) -> u8 {
        match self {
            Denomination::Usd => USD_DECIMALS,
            Denomination::Eth => ETH_DECIMALS,
        }
    }

    /// Parses user input into the smallest unit of this denomination.
    pub fn parse(&self, input: &str) -> Result<U256, AmountError> {
        let money = MoneyAmount::parse(input)?;
        self.scale(&money)
    }

    /// Scales an already parsed amount into the smallest unit.
    pub fn scale(&self, money: &MoneyAmount) -> Result<U256, AmountError> {
        let scale = money.scale();
        let allowed = self.decimals() as u32;
        if scale > allowed {
            return Err(AmountError::WrongPrecision {
                money: scale,
                allowed,
            });
        }
        let multiplier = U256::from(10).pow(U256::from(allowed - scale));
        Ok(U256::from(money.mantissa()) * multiplier)
    }

    /// Exact rendering with trailing zeros removed.
    pub fn format(&self, value: U256) -> String {
        format_units(value, self.decimals())
    }

    /// Rendering rounded half-up to a fixed number of places.
    pub fn format_fixed(&self, value: U256, places: u8) -> String {
        format_units_fixed(value, self.decimals(), places)
    }
}

/// Renders `value / 10^decimals` exactly, without trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let (whole, fraction) = split_units(value, decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole
    } else {
        format!("{whole}.{fraction}")
    }
}

/// Renders `value / 10^decimals` rounded half-up to `places` decimal places.
pub fn format_units_fixed(value: U256, decimals: u8, places: u8) -> String {
    if places >= decimals {
        let (whole, fraction) = split_units(value, decimals);
        let padding = "0".repeat((places - decimals) as usize);
        return if places == 0 {
            whole
        } else {
            format!("{whole}.{fraction}{padding}")
        };
    }
    let dropped = U256::from(10).pow(U256::from(decimals - places));
    let half = dropped / U256::from(2);
    let rounded = value.saturating_add(half) / dropped;
    let (whole, fraction) = split_units(rounded, places);
    if places == 0 {
        whole
    } else {
        format!("{whole}.{fraction}")
    }
}

fn split_units(value: U256, decimals: u8) -> (String, String) {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return (digits, String::new());
    }
    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    (whole.to_string(), fraction.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_usd_fee() {
        let fee = Denomination::Usd.parse("10").unwrap();
        assert_eq!(fee, U256::from(1_000_000_000u64));
        let fee = Denomination::Usd.parse("1.5").unwrap();
        assert_eq!(fee, U256::from(150_000_000u64));
    }

    #[test]
    fn test_parse_with_symbols_and_separators() {
        let fee = Denomination::Usd.parse("$1,000.25").unwrap();
        assert_eq!(fee, U256::from(100_025_000_000u64));
    }

    #[test]
    fn test_parse_eth() {
        let wei = Denomination::Eth.parse("0.01").unwrap();
        assert_eq!(wei, U256::from(10_000_000_000_000_000u64));
    }

    #[test]
    fn test_rejects_non_numeric() {
        assert_eq!(
            Denomination::Usd.parse("ten dollars"),
            Err(AmountError::InvalidFormat)
        );
        assert_eq!(Denomination::Usd.parse("12abc"), Err(AmountError::InvalidFormat));
        assert_eq!(Denomination::Eth.parse(""), Err(AmountError::InvalidFormat));
        assert_eq!(Denomination::Eth.parse("   "), Err(AmountError::InvalidFormat));
    }

    #[test]
    fn test_rejects_negative_and_zero() {
        assert_eq!(Denomination::Usd.parse("-1"), Err(AmountError::Negative));
        assert_eq!(Denomination::Usd.parse("0"), Err(AmountError::OutOfRange));
    }

    #[test]
    fn test_rejects_excess_precision() {
        let err = Denomination::Usd.parse("0.123456789").unwrap_err();
        assert_eq!(
            err,
            AmountError::WrongPrecision {
                money: 9,
                allowed: 8
            }
        );
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(150_000_000u64), 8), "1.5");
        assert_eq!(format_units(U256::from(1u64), 8), "0.00000001");
        assert_eq!(format_units(U256::ZERO, 18), "0");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
    }

    #[test]
    fn test_format_units_fixed_rounds() {
        // 0.0123456789 ETH
        let wei = U256::from(12_345_678_900_000_000u64);
        assert_eq!(format_units_fixed(wei, 18, 6), "0.012346");
        assert_eq!(format_units_fixed(wei, 18, 4), "0.0123");
        assert_eq!(format_units_fixed(U256::ZERO, 18, 4), "0.0000");
        assert_eq!(format_units_fixed(U256::from(5u64), 1, 3), "0.500");
    }
}
