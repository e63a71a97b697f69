//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use domain_einvoicing::InvoiceLine;

/// Strategy for positive quantities with up to three decimals
pub fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000i64).prop_map(|thousandths| Decimal::new(thousandths, 3))
}

/// Strategy for non-negative unit prices with up to three decimals
pub fn unit_price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|thousandths| Decimal::new(thousandths, 3))
}

/// Strategy for the tax rates used in Saudi Arabia
pub fn tax_percent_strategy() -> impl Strategy<Value = Decimal> {
    prop_oneof![Just(dec!(0)), Just(dec!(5)), Just(dec!(15))]
}

/// Strategy for two-decimal amounts
pub fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for a single line with derived amounts computed
pub fn line_strategy() -> impl Strategy<Value = InvoiceLine> {
    ("[a-zA-Z][a-zA-Z ]{0,39}", quantity_strategy(), unit_price_strategy(), tax_percent_strategy())
        .prop_map(|(name, quantity, unit_price, tax)| InvoiceLine::new(name, quantity, unit_price, tax))
}

/// Strategy for a non-empty set of lines
pub fn lines_strategy() -> impl Strategy<Value = Vec<InvoiceLine>> {
    prop::collection::vec(line_strategy(), 1..12)
}

/// Strategy for valid VAT registration numbers
pub fn vat_number_strategy() -> impl Strategy<Value = String> {
    "3[0-9]{14}"
}

/// Strategy for seller names that fit a QR record
pub fn seller_name_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 &.-]{1,80}"
}

/// Strategy for whole-second UTC timestamps between 2020 and 2035
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (1_577_836_800i64..2_051_222_400i64).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}
