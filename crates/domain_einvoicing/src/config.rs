//! Compliance configuration
//!
//! Tunables read by the validator and the XML builder. Every field has a
//! default so a partial configuration source deserializes cleanly.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::SAUDI_RIYAL;

/// Configuration of the compliance pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    /// Oldest issue date accepted, in days before now
    pub max_invoice_age_days: i64,
    /// How far in the future an issue date may lie, in days
    pub future_tolerance_days: i64,
    /// VAT percent rendered in the document-level tax category
    pub standard_vat_percent: Decimal,
    /// Currency every document is expected to use; others produce a warning
    pub expected_currency: String,
    /// Unit code attached to invoiced quantities
    pub unit_code: String,
    /// Upper bound on the human invoice number length
    pub max_invoice_number_length: usize,
    /// Upper bound on a line item name length
    pub max_item_name_length: usize,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            max_invoice_age_days: 365,
            future_tolerance_days: 1,
            standard_vat_percent: dec!(15.00),
            expected_currency: SAUDI_RIYAL.to_string(),
            unit_code: "PCE".to_string(),
            max_invoice_number_length: 127,
            max_item_name_length: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ComplianceConfig::default();
        assert_eq!(config.max_invoice_age_days, 365);
        assert_eq!(config.future_tolerance_days, 1);
        assert_eq!(config.standard_vat_percent, dec!(15));
        assert_eq!(config.expected_currency, "SAR");
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let config: ComplianceConfig =
            serde_json::from_str(r#"{"max_invoice_age_days": 30}"#).unwrap();
        assert_eq!(config.max_invoice_age_days, 30);
        assert_eq!(config.unit_code, "PCE");
    }
}
