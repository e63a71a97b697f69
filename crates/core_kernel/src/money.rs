//! Amount helpers with precise decimal arithmetic
//!
//! Every monetary value on an e-invoice is carried as a `rust_decimal::Decimal`
//! rounded to two decimal places. Rounding uses the midpoint-to-even strategy
//! so totals recomputed here match amounts produced by the invoicing front-ends.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Number of decimal places carried by every invoice amount
pub const AMOUNT_SCALE: u32 = 2;

/// Maximum difference tolerated when comparing stored and recomputed amounts
pub const AMOUNT_TOLERANCE: Decimal = dec!(0.01);

/// ISO 4217 code of the Saudi riyal, the expected document currency
pub const SAUDI_RIYAL: &str = "SAR";

/// Rounds an amount to two decimal places
///
/// The result always carries a scale of two, so `200` becomes `200.00`.
pub fn round_amount(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(AMOUNT_SCALE);
    rounded
}

/// Formats an amount with exactly two decimal digits and a `.` separator
///
/// The output never depends on the process locale.
pub fn format_amount(value: Decimal) -> String {
    format!("{:.2}", round_amount(value))
}

/// Parses an amount previously produced by [`format_amount`]
///
/// The text must carry exactly two decimal digits.
pub fn parse_amount(text: &str) -> Result<Decimal, CoreError> {
    let value = Decimal::from_str(text).map_err(|_| CoreError::invalid_amount(text))?;
    if value.scale() != AMOUNT_SCALE {
        return Err(CoreError::invalid_amount(format!(
            "{} does not have exactly {} decimal digits",
            text, AMOUNT_SCALE
        )));
    }
    Ok(value)
}

/// Returns true when two amounts differ by no more than [`AMOUNT_TOLERANCE`]
pub fn amounts_match(left: Decimal, right: Decimal) -> bool {
    (left - right).abs() <= AMOUNT_TOLERANCE
}

/// A tax percentage (e.g. 15 for 15% VAT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage {
    /// The percentage value (e.g. 15.00 for 15%)
    value: Decimal,
}

impl Percentage {
    /// Creates a percentage from its percent value (e.g. 15 for 15%)
    pub fn from_percentage(percentage: Decimal) -> Self {
        Self { value: percentage }
    }

    /// Returns the percent value
    pub fn as_percentage(&self) -> Decimal {
        self.value
    }

    /// Returns the rate as a fraction (e.g. 0.15 for 15%)
    pub fn as_fraction(&self) -> Decimal {
        self.value / dec!(100)
    }

    /// True when the percentage lies within [0, 100]
    pub fn is_within_bounds(&self) -> bool {
        self.value >= Decimal::ZERO && self.value <= dec!(100)
    }

    /// Applies this rate to an amount, rounding the result to two decimals
    pub fn apply(&self, amount: Decimal) -> Decimal {
        round_amount(amount * self.as_fraction())
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_amount(self.value))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn formatted_amounts_always_have_two_decimals(minor in -1_000_000_000i64..1_000_000_000i64, scale in 0u32..6u32) {
            let value = Decimal::new(minor, scale);
            let text = format_amount(value);
            let (_, fraction) = text.split_once('.').expect("decimal separator");
            prop_assert_eq!(fraction.len(), 2);
            prop_assert_eq!(parse_amount(&text).unwrap(), round_amount(value));
        }

        #[test]
        fn rounding_is_idempotent(minor in -1_000_000_000i64..1_000_000_000i64, scale in 0u32..6u32) {
            let once = round_amount(Decimal::new(minor, scale));
            prop_assert_eq!(round_amount(once), once);
        }
    }
}
