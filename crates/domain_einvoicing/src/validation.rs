//! Invoice compliance validation
//!
//! Every rule group runs independently and contributes its own entries, so a
//! single pass reports everything that is wrong with an invoice.
//!
//! # Rule groups
//!
//! ## Identity
//! - Invoice number present and bounded in length
//! - Invoice and seller references are not nil
//!
//! ## Seller
//! - Seller must be supplied and match the invoice's seller reference
//! - Name present, VAT number matches `^3[0-9]{14}$` (ASCII digits only)
//! - Standard types also need street, city and postal code
//!
//! ## Buyer
//! - Standard types need a buyer name and a valid buyer VAT number
//!
//! ## Lines and amounts
//! - At least one line; every derived amount consistent with its inputs
//! - Invoice totals equal the line sums within 0.01
//!
//! ## Currency and dates
//! - 3-letter currency code; anything but the exact expected code (case included) is a warning
//! - Issue date neither too far in the future nor older than the configured age;
//!   a window too wide to represent as a date leaves that side unbounded

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::amounts_match;

use crate::config::ComplianceConfig;
use crate::invoice::{Invoice, InvoiceLine};
use crate::seller::Seller;

static VAT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^3[0-9]{14}$").expect("VAT number pattern is a valid regex"));

/// Returns true for a 15-digit VAT registration number starting with 3
pub fn is_valid_vat_number(value: &str) -> bool {
    VAT_NUMBER.is_match(value)
}

/// How a validation entry affects the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks preparation
    Error,
    /// Reported but never blocks
    Warning,
}

/// A single rule violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Path of the offending field (e.g. `lines[2].quantity`)
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationError {
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Error => write!(f, "{}", self.message),
            Severity::Warning => write!(f, "WARNING: {}", self.message),
        }
    }
}

/// Outcome of validating one invoice
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    entries: Vec<ValidationError>,
}

impl ValidationReport {
    /// Creates an empty (valid) report
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a blocking entry
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.entries.push(ValidationError::error(field, message));
    }

    /// Adds a non-blocking entry
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.entries.push(ValidationError::warning(field, message));
    }

    /// Merges another report into this one
    pub fn merge(&mut self, other: ValidationReport) {
        self.entries.extend(other.entries);
    }

    /// True when no blocking entry was recorded
    pub fn is_valid(&self) -> bool {
        self.entries.iter().all(|e| !e.is_blocking())
    }

    /// Every entry, in the order the rules produced them
    pub fn entries(&self) -> &[ValidationError] {
        &self.entries
    }

    /// Blocking entries only
    pub fn errors(&self) -> Vec<&ValidationError> {
        self.entries.iter().filter(|e| e.is_blocking()).collect()
    }

    /// Non-blocking entries only
    pub fn warnings(&self) -> Vec<&ValidationError> {
        self.entries.iter().filter(|e| !e.is_blocking()).collect()
    }

    /// Messages of the blocking entries
    pub fn blocking_messages(&self) -> Vec<String> {
        self.errors().into_iter().map(|e| e.message.clone()).collect()
    }

    /// Consumes the report, keeping the blocking entries
    pub fn into_blocking(self) -> Vec<ValidationError> {
        self.entries.into_iter().filter(|e| e.is_blocking()).collect()
    }
}

/// Validator for invoices
///
/// Never mutates the invoice and never fails; every problem is returned as
/// data in the report.
///
/// # Examples
///
/// ```rust,ignore
/// let validator = InvoiceValidator::new(ComplianceConfig::default());
/// let report = validator.validate_invoice(&invoice, Some(&seller));
///
/// for error in report.errors() {
///     println!("{}: {}", error.field, error);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InvoiceValidator {
    config: ComplianceConfig,
}

impl InvoiceValidator {
    pub fn new(config: ComplianceConfig) -> Self {
        Self { config }
    }

    /// Validates an invoice against the current time
    pub fn validate_invoice(&self, invoice: &Invoice, seller: Option<&Seller>) -> ValidationReport {
        self.validate_at(invoice, seller, Utc::now())
    }

    /// Validates an invoice, judging the issue date against `now`
    pub fn validate_at(
        &self,
        invoice: &Invoice,
        seller: Option<&Seller>,
        now: DateTime<Utc>,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();

        self.validate_identity(invoice, &mut report);
        self.validate_seller(invoice, seller, &mut report);
        Self::validate_buyer(invoice, &mut report);
        self.validate_lines(invoice, &mut report);
        Self::validate_amounts(invoice, &mut report);
        self.validate_currency(invoice, &mut report);
        self.validate_dates(invoice, now, &mut report);

        report
    }

    fn validate_identity(&self, invoice: &Invoice, report: &mut ValidationReport) {
        let number = invoice.invoice_number.trim();
        if number.is_empty() {
            report.add_error("invoice_number", "Invoice number is required");
        } else if number.chars().count() > self.config.max_invoice_number_length {
            report.add_error(
                "invoice_number",
                format!(
                    "Invoice number must not exceed {} characters",
                    self.config.max_invoice_number_length
                ),
            );
        }

        if invoice.id.is_nil() {
            report.add_error("id", "Invoice UUID is required");
        }
        if invoice.seller_id.is_nil() {
            report.add_error("seller_id", "Invoice must reference a seller");
        }
    }

    fn validate_seller(
        &self,
        invoice: &Invoice,
        seller: Option<&Seller>,
        report: &mut ValidationReport,
    ) {
        let Some(seller) = seller else {
            report.add_error("seller", "Seller information must be loaded before validation");
            return;
        };

        if seller.id != invoice.seller_id {
            report.add_error(
                "seller",
                format!("Seller {} does not own invoice {}", seller.id, invoice.invoice_number),
            );
        }

        if seller.name.trim().is_empty() {
            report.add_error("seller.name", "Seller name is required");
        }

        if !is_valid_vat_number(&seller.vat_number) {
            report.add_error(
                "seller.vat_number",
                "Seller VAT registration number must be 15 digits starting with 3",
            );
        }

        if invoice.invoice_type.is_standard() {
            let address = &seller.address;
            let required = [
                ("seller.address.street", &address.street, "Seller street is required for standard invoices"),
                ("seller.address.city", &address.city, "Seller city is required for standard invoices"),
                (
                    "seller.address.postal_code",
                    &address.postal_code,
                    "Seller postal code is required for standard invoices",
                ),
            ];
            for (field, value, message) in required {
                if is_blank(value.as_deref()) {
                    report.add_error(field, message);
                }
            }
        }
    }

    fn validate_buyer(invoice: &Invoice, report: &mut ValidationReport) {
        if !invoice.invoice_type.is_standard() {
            return;
        }

        if invoice.buyer_name().is_none() {
            report.add_error("buyer_name", "Buyer name is required for standard invoices");
        }

        match invoice.buyer_vat_number() {
            None => report.add_error(
                "buyer_vat_number",
                "Buyer VAT registration number is required for standard invoices",
            ),
            Some(vat) if !is_valid_vat_number(vat) => report.add_error(
                "buyer_vat_number",
                "Buyer VAT registration number must be 15 digits starting with 3",
            ),
            Some(_) => {}
        }
    }

    fn validate_lines(&self, invoice: &Invoice, report: &mut ValidationReport) {
        if invoice.lines.is_empty() {
            report.add_error("lines", "At least one invoice line is required");
            return;
        }

        for (index, line) in invoice.lines.iter().enumerate() {
            self.validate_line(index + 1, line, report);
        }
    }

    fn validate_line(&self, position: usize, line: &InvoiceLine, report: &mut ValidationReport) {
        let field = |name: &str| format!("lines[{}].{}", position, name);

        let name = line.item_name.trim();
        if name.is_empty() {
            report.add_error(field("item_name"), format!("Line {}: item name is required", position));
        } else if name.chars().count() > self.config.max_item_name_length {
            report.add_error(
                field("item_name"),
                format!(
                    "Line {}: item name must not exceed {} characters",
                    position, self.config.max_item_name_length
                ),
            );
        }

        if line.quantity <= Decimal::ZERO {
            report.add_error(field("quantity"), format!("Line {}: quantity must be greater than zero", position));
        }
        if line.unit_price < Decimal::ZERO {
            report.add_error(field("unit_price"), format!("Line {}: unit price cannot be negative", position));
        }
        if line.tax_percent < Decimal::ZERO || line.tax_percent > dec!(100) {
            report.add_error(
                field("tax_percent"),
                format!("Line {}: tax percent must be between 0 and 100", position),
            );
        }

        let derived = [
            ("net_amount", line.net_amount, "net amount"),
            ("vat_amount", line.vat_amount, "VAT amount"),
            ("total_amount", line.total_amount, "total amount"),
        ];
        for (name, value, label) in derived {
            if value < Decimal::ZERO {
                report.add_error(field(name), format!("Line {}: {} cannot be negative", position, label));
            }
        }

        let expected = line.expected_net_amount();
        if !amounts_match(line.net_amount, expected) {
            report.add_error(
                field("net_amount"),
                format!(
                    "Line {}: net amount {} does not match quantity x unit price ({})",
                    position, line.net_amount, expected
                ),
            );
        }
    }

    fn validate_amounts(invoice: &Invoice, report: &mut ValidationReport) {
        if invoice.subtotal < Decimal::ZERO {
            report.add_error("subtotal", "Subtotal cannot be negative");
        }
        if invoice.vat_amount < Decimal::ZERO {
            report.add_error("vat_amount", "VAT amount cannot be negative");
        }
        if invoice.grand_total <= Decimal::ZERO {
            report.add_error("grand_total", "Grand total must be greater than zero");
        }

        let line_net: Decimal = invoice.lines.iter().map(|l| l.net_amount).sum();
        let line_vat: Decimal = invoice.lines.iter().map(|l| l.vat_amount).sum();

        if !amounts_match(invoice.subtotal, line_net) {
            report.add_error(
                "subtotal",
                format!("Subtotal {} does not match the sum of line net amounts ({})", invoice.subtotal, line_net),
            );
        }
        if !amounts_match(invoice.vat_amount, line_vat) {
            report.add_error(
                "vat_amount",
                format!("VAT amount {} does not match the sum of line VAT amounts ({})", invoice.vat_amount, line_vat),
            );
        }
        if !amounts_match(invoice.grand_total, invoice.subtotal + invoice.vat_amount) {
            report.add_error(
                "grand_total",
                format!(
                    "Grand total {} does not equal subtotal plus VAT ({})",
                    invoice.grand_total,
                    invoice.subtotal + invoice.vat_amount
                ),
            );
        }
    }

    fn validate_currency(&self, invoice: &Invoice, report: &mut ValidationReport) {
        let currency = invoice.currency.trim();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            report.add_error("currency", "Currency must be a 3-letter ISO 4217 code");
            return;
        }

        if invoice.currency == self.config.expected_currency {
            return;
        }

        let message = if currency.eq_ignore_ascii_case(&self.config.expected_currency) {
            format!(
                "Currency {:?} must be written as {}; ISO 4217 codes are upper-case",
                invoice.currency, self.config.expected_currency
            )
        } else {
            format!(
                "Currency {} is not {}; the tax authority expects {}",
                currency, self.config.expected_currency, self.config.expected_currency
            )
        };
        report.add_warning("currency", message);
    }

    fn validate_dates(&self, invoice: &Invoice, now: DateTime<Utc>, report: &mut ValidationReport) {
        let latest = Duration::try_days(self.config.future_tolerance_days)
            .and_then(|tolerance| now.checked_add_signed(tolerance));
        if latest.is_some_and(|latest| invoice.issue_date > latest) {
            report.add_error(
                "issue_date",
                format!(
                    "Issue date cannot be more than {} day(s) in the future",
                    self.config.future_tolerance_days
                ),
            );
        }

        let earliest = Duration::try_days(self.config.max_invoice_age_days)
            .and_then(|age| now.checked_sub_signed(age));
        if earliest.is_some_and(|earliest| invoice.issue_date < earliest) {
            report.add_error(
                "issue_date",
                format!(
                    "Issue date cannot be older than {} days",
                    self.config.max_invoice_age_days
                ),
            );
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::InvoiceType;
    use crate::seller::SellerAddress;

    fn seller() -> Seller {
        Seller::new("Acme Trading", "300000000000003")
            .with_address(SellerAddress::new("King Fahd Rd", "Riyadh", "12211"))
    }

    fn simplified(seller: &Seller) -> Invoice {
        let mut invoice = Invoice::new("INV-1", InvoiceType::Simplified, seller.id, Utc::now());
        invoice.add_line(InvoiceLine::new("Coffee", dec!(2), dec!(10), dec!(15)));
        invoice
    }

    fn validator() -> InvoiceValidator {
        InvoiceValidator::default()
    }

    #[test]
    fn test_vat_number_pattern() {
        assert!(is_valid_vat_number("300000000000003"));
        assert!(!is_valid_vat_number("200000000000003"));
        assert!(!is_valid_vat_number("30000000000000"));
        assert!(!is_valid_vat_number("3000000000000031"));
        assert!(!is_valid_vat_number("30000000000000a"));
    }

    #[test]
    fn test_vat_number_rejects_non_ascii_digits() {
        // Arabic-Indic zeros and three
        assert!(!is_valid_vat_number("3٠٠٠٠٠٠٠٠٠٠٠٠٠٣"));
        assert!(!is_valid_vat_number("3００００００００００００００3"));
    }

    #[test]
    fn test_valid_simplified_invoice() {
        let seller = seller();
        let report = validator().validate_invoice(&simplified(&seller), Some(&seller));
        assert!(report.is_valid(), "{:?}", report.blocking_messages());
        assert!(report.entries().is_empty());
    }

    #[test]
    fn test_missing_seller_is_reported() {
        let seller = seller();
        let report = validator().validate_invoice(&simplified(&seller), None);
        assert!(!report.is_valid());
        assert!(report.blocking_messages().iter().any(|m| m.contains("Seller information must be loaded")));
    }

    #[test]
    fn test_rules_are_collected_not_fail_fast() {
        let seller = Seller::new("", "12345");
        let mut invoice = Invoice::new("", InvoiceType::Standard, seller.id, Utc::now());
        invoice.currency = "X".to_string();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        let messages = report.blocking_messages();

        assert!(messages.iter().any(|m| m.contains("Invoice number is required")));
        assert!(messages.iter().any(|m| m.contains("Seller name is required")));
        assert!(messages.iter().any(|m| m.contains("VAT registration number")));
        assert!(messages.iter().any(|m| m.contains("Buyer name is required")));
        assert!(messages.iter().any(|m| m.contains("At least one invoice line")));
        assert!(messages.iter().any(|m| m.contains("3-letter")));
    }

    #[test]
    fn test_foreign_currency_is_a_warning() {
        let seller = seller();
        let mut invoice = simplified(&seller);
        invoice.currency = "USD".to_string();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert!(report.is_valid());
        assert_eq!(report.warnings().len(), 1);
        assert!(report.warnings()[0].to_string().starts_with("WARNING: "));
    }

    #[test]
    fn test_lower_case_currency_is_a_warning() {
        let seller = seller();
        for code in ["sar", "Sar", " SAR"] {
            let mut invoice = simplified(&seller);
            invoice.currency = code.to_string();

            let report = validator().validate_invoice(&invoice, Some(&seller));
            assert!(report.is_valid(), "{}", code);
            assert_eq!(report.warnings().len(), 1, "{}", code);
            assert!(report.warnings()[0].message.contains("upper-case"), "{}", code);
        }
    }

    #[test]
    fn test_out_of_range_date_window_does_not_panic() {
        let seller = seller();
        let now = Utc::now();
        let config = ComplianceConfig {
            max_invoice_age_days: i64::MAX,
            future_tolerance_days: i64::MIN,
            ..ComplianceConfig::default()
        };
        let validator = InvoiceValidator::new(config);
        let mut invoice = simplified(&seller);

        invoice.issue_date = now - Duration::days(3650);
        assert!(validator.validate_at(&invoice, Some(&seller), now).is_valid());

        let huge = ComplianceConfig {
            max_invoice_age_days: 200_000_000,
            future_tolerance_days: 200_000_000,
            ..ComplianceConfig::default()
        };
        invoice.issue_date = now + Duration::days(3650);
        assert!(InvoiceValidator::new(huge).validate_at(&invoice, Some(&seller), now).is_valid());
    }

    #[test]
    fn test_stale_net_amount_is_rejected() {
        let seller = seller();
        let mut invoice = simplified(&seller);
        invoice.lines[0].quantity = dec!(3);

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert!(report
            .errors()
            .iter()
            .any(|e| e.field == "lines[1].net_amount"));
    }

    #[test]
    fn test_issue_date_window() {
        let seller = seller();
        let now = Utc::now();
        let mut invoice = simplified(&seller);

        invoice.issue_date = now + Duration::days(3);
        assert!(!validator().validate_at(&invoice, Some(&seller), now).is_valid());

        invoice.issue_date = now - Duration::days(400);
        assert!(!validator().validate_at(&invoice, Some(&seller), now).is_valid());

        invoice.issue_date = now - Duration::days(30);
        assert!(validator().validate_at(&invoice, Some(&seller), now).is_valid());
    }
}
