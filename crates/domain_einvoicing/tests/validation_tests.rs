//! Validation rule tests for domain_einvoicing

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use core_kernel::{InvoiceId, SellerId};
use domain_einvoicing::{
    ComplianceConfig, InvoiceType, InvoiceValidator, SellerAddress, Severity,
};
use test_utils::{
    assert_has_error_containing, assert_no_blocking_errors, InvoiceBuilder, LineBuilder,
    SellerBuilder, SellerFixtures, TemporalFixtures,
};

fn validator() -> InvoiceValidator {
    InvoiceValidator::new(ComplianceConfig::default())
}

// ============================================================================
// Identity Tests
// ============================================================================

mod identity_tests {
    use super::*;

    #[test]
    fn test_valid_standard_invoice_passes() {
        let seller = SellerFixtures::standard();
        let invoice = InvoiceBuilder::new().for_seller(&seller).with_sample_lines().build();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_no_blocking_errors(&report);
        assert!(report.entries().is_empty());
    }

    #[test]
    fn test_invoice_number_length_is_bounded() {
        let seller = SellerFixtures::standard();
        let invoice = InvoiceBuilder::new()
            .for_seller(&seller)
            .with_number("N".repeat(128))
            .with_sample_lines()
            .build();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "Invoice number must not exceed 127");
    }

    #[test]
    fn test_nil_identifiers_are_rejected() {
        let seller = SellerFixtures::standard();
        let mut invoice = InvoiceBuilder::new().for_seller(&seller).with_sample_lines().build();
        invoice.id = InvoiceId::nil();
        invoice.seller_id = SellerId::nil();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "Invoice UUID is required");
        assert_has_error_containing(&report, "Invoice must reference a seller");
    }

    #[test]
    fn test_validation_does_not_mutate() {
        let seller = SellerFixtures::standard();
        let mut invoice = InvoiceBuilder::new().for_seller(&seller).with_sample_lines().build();
        invoice.lines[0].quantity = dec!(5);
        let before = invoice.clone();

        let _ = validator().validate_invoice(&invoice, Some(&seller));
        assert_eq!(invoice, before);
    }
}

// ============================================================================
// Seller Tests
// ============================================================================

mod seller_tests {
    use super::*;

    #[test]
    fn test_missing_seller_graph() {
        let invoice = InvoiceBuilder::new().with_sample_lines().build();
        let report = validator().validate_invoice(&invoice, None);
        assert_has_error_containing(&report, "Seller information must be loaded");
    }

    #[test]
    fn test_seller_must_own_invoice() {
        let seller = SellerFixtures::standard();
        let invoice = InvoiceBuilder::new().for_seller(&seller).with_sample_lines().build();
        let other = SellerBuilder::new().with_id(SellerId::new_v7()).build();

        let report = validator().validate_invoice(&invoice, Some(&other));
        assert_has_error_containing(&report, "does not own invoice");
    }

    #[test]
    fn test_seller_vat_pattern() {
        for bad in ["12345", "200000000000003", "3000000000000031", "3 0000000000000"] {
            let seller = SellerBuilder::new().with_vat_number(bad).build();
            let invoice = InvoiceBuilder::new().for_seller(&seller).with_sample_lines().build();

            let report = validator().validate_invoice(&invoice, Some(&seller));
            assert_has_error_containing(&report, "Seller VAT registration number");
        }
    }

    #[test]
    fn test_standard_invoice_requires_seller_address() {
        let seller = SellerBuilder::new().without_address().build();
        let invoice = InvoiceBuilder::new().for_seller(&seller).with_sample_lines().build();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "Seller street is required");
        assert_has_error_containing(&report, "Seller city is required");
        assert_has_error_containing(&report, "Seller postal code is required");
    }

    #[test]
    fn test_simplified_invoice_accepts_missing_address() {
        let seller = SellerBuilder::new().without_address().build();
        let invoice = InvoiceBuilder::simplified().for_seller(&seller).with_sample_lines().build();

        assert_no_blocking_errors(&validator().validate_invoice(&invoice, Some(&seller)));
    }

    #[test]
    fn test_partial_address_names_missing_fields_only() {
        let address = SellerAddress {
            street: Some("King Fahd Road".to_string()),
            city: Some("   ".to_string()),
            ..Default::default()
        };
        let seller = SellerBuilder::new().with_address(address).build();
        let invoice = InvoiceBuilder::new()
            .with_type(InvoiceType::StandardCreditNote)
            .for_seller(&seller)
            .with_sample_lines()
            .build();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        let messages = report.blocking_messages();
        assert!(!messages.iter().any(|m| m.contains("street")));
        assert_has_error_containing(&report, "Seller city is required");
    }
}

// ============================================================================
// Buyer Tests
// ============================================================================

mod buyer_tests {
    use super::*;

    #[test]
    fn test_standard_invoice_missing_buyer_name() {
        let seller = SellerFixtures::standard();
        let invoice = InvoiceBuilder::new()
            .for_seller(&seller)
            .without_buyer()
            .with_sample_lines()
            .build();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "Buyer name is required");
        assert_has_error_containing(&report, "Buyer VAT registration number is required");
    }

    #[test]
    fn test_buyer_restored_and_bad_seller_vat() {
        let seller = SellerBuilder::new().with_vat_number("12345").build();
        let invoice = InvoiceBuilder::new().for_seller(&seller).with_sample_lines().build();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "VAT registration number");
        assert!(!report
            .blocking_messages()
            .iter()
            .any(|m| m.contains("Buyer name is required")));
    }

    #[test]
    fn test_buyer_vat_pattern() {
        let seller = SellerFixtures::standard();
        let invoice = InvoiceBuilder::new()
            .for_seller(&seller)
            .with_buyer("Gulf Supplies LLC", Some("411111111111113"))
            .with_sample_lines()
            .build();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "Buyer VAT registration number must be 15 digits");
    }

    #[test]
    fn test_every_standard_variant_requires_buyer() {
        let seller = SellerFixtures::standard();
        for invoice_type in [
            InvoiceType::Standard,
            InvoiceType::StandardCreditNote,
            InvoiceType::StandardDebitNote,
        ] {
            let invoice = InvoiceBuilder::new()
                .with_type(invoice_type)
                .for_seller(&seller)
                .without_buyer()
                .with_sample_lines()
                .build();
            assert!(!validator().validate_invoice(&invoice, Some(&seller)).is_valid());
        }
    }

    #[test]
    fn test_simplified_variants_do_not_require_buyer() {
        let seller = SellerFixtures::standard();
        for invoice_type in [
            InvoiceType::Simplified,
            InvoiceType::SimplifiedCreditNote,
            InvoiceType::SimplifiedDebitNote,
        ] {
            let invoice = InvoiceBuilder::simplified()
                .with_type(invoice_type)
                .for_seller(&seller)
                .with_sample_lines()
                .build();
            assert_no_blocking_errors(&validator().validate_invoice(&invoice, Some(&seller)));
        }
    }
}

// ============================================================================
// Line and Amount Tests
// ============================================================================

mod line_tests {
    use super::*;

    #[test]
    fn test_at_least_one_line() {
        let seller = SellerFixtures::standard();
        let invoice = InvoiceBuilder::new().for_seller(&seller).build();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "At least one invoice line is required");
        assert_has_error_containing(&report, "Grand total must be greater than zero");
    }

    #[test]
    fn test_line_field_rules() {
        let seller = SellerFixtures::standard();
        let mut invoice = InvoiceBuilder::new()
            .for_seller(&seller)
            .with_line(LineBuilder::new().with_item_name(" ").with_quantity(dec!(0)))
            .with_line(LineBuilder::new().with_unit_price(dec!(-1)))
            .with_line(LineBuilder::new().with_tax_percent(dec!(101)))
            .build();
        invoice.lines[2].vat_amount = dec!(-1);

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "Line 1: item name is required");
        assert_has_error_containing(&report, "Line 1: quantity must be greater than zero");
        assert_has_error_containing(&report, "Line 2: unit price cannot be negative");
        assert_has_error_containing(&report, "Line 3: tax percent must be between 0 and 100");
        assert_has_error_containing(&report, "Line 3: VAT amount cannot be negative");
    }

    #[test]
    fn test_item_name_length_is_bounded() {
        let seller = SellerFixtures::standard();
        let invoice = InvoiceBuilder::new()
            .for_seller(&seller)
            .with_line(LineBuilder::new().with_item_name("x".repeat(1001)))
            .build();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "item name must not exceed 1000");
    }

    #[test]
    fn test_net_amount_tolerance() {
        let seller = SellerFixtures::standard();
        let mut invoice = InvoiceBuilder::new().for_seller(&seller).with_sample_lines().build();

        invoice.lines[0].net_amount += dec!(0.01);
        invoice.subtotal += dec!(0.01);
        invoice.grand_total += dec!(0.01);
        assert_no_blocking_errors(&validator().validate_invoice(&invoice, Some(&seller)));

        invoice.lines[0].net_amount += dec!(0.01);
        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "Line 1: net amount");
    }

    #[test]
    fn test_totals_must_match_lines() {
        let seller = SellerFixtures::standard();
        let mut invoice = InvoiceBuilder::new().for_seller(&seller).with_sample_lines().build();
        invoice.subtotal = dec!(600.00);
        invoice.vat_amount = dec!(90.00);

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "Subtotal 600.00 does not match");
        assert_has_error_containing(&report, "VAT amount 90.00 does not match");
        assert_has_error_containing(&report, "Grand total 805.00 does not equal");
    }
}

// ============================================================================
// Currency and Date Tests
// ============================================================================

mod currency_and_date_tests {
    use super::*;

    #[test]
    fn test_non_sar_currency_is_warning_only() {
        let seller = SellerFixtures::standard();
        let invoice = InvoiceBuilder::new()
            .for_seller(&seller)
            .with_currency("USD")
            .with_sample_lines()
            .build();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_no_blocking_errors(&report);

        let warnings = report.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Warning);
        assert_eq!(warnings[0].field, "currency");
        assert!(warnings[0].to_string().starts_with("WARNING: "));
    }

    #[test]
    fn test_malformed_currency_is_an_error() {
        let seller = SellerFixtures::standard();
        for currency in ["", "SA", "SARS", "S4R"] {
            let invoice = InvoiceBuilder::new()
                .for_seller(&seller)
                .with_currency(currency)
                .with_sample_lines()
                .build();
            let report = validator().validate_invoice(&invoice, Some(&seller));
            assert_has_error_containing(&report, "3-letter ISO 4217");
        }
    }

    #[test]
    fn test_future_issue_date() {
        let seller = SellerFixtures::standard();
        let invoice = InvoiceBuilder::new()
            .for_seller(&seller)
            .with_issue_date(TemporalFixtures::too_far_ahead())
            .with_sample_lines()
            .build();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "in the future");
    }

    #[test]
    fn test_issue_date_within_tolerance() {
        let seller = SellerFixtures::standard();
        let now = Utc::now();
        let invoice = InvoiceBuilder::new()
            .for_seller(&seller)
            .with_issue_date(now + Duration::hours(20))
            .with_sample_lines()
            .build();

        assert_no_blocking_errors(&validator().validate_at(&invoice, Some(&seller), now));
    }

    #[test]
    fn test_issue_date_too_old() {
        let seller = SellerFixtures::standard();
        let invoice = InvoiceBuilder::new()
            .for_seller(&seller)
            .with_issue_date(TemporalFixtures::too_old())
            .with_sample_lines()
            .build();

        let report = validator().validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "older than 365 days");
    }

    #[test]
    fn test_configured_maximum_age() {
        let seller = SellerFixtures::standard();
        let config = ComplianceConfig {
            max_invoice_age_days: 30,
            ..Default::default()
        };
        let invoice = InvoiceBuilder::new()
            .for_seller(&seller)
            .with_issue_date(Utc::now() - Duration::days(45))
            .with_sample_lines()
            .build();

        let report = InvoiceValidator::new(config).validate_invoice(&invoice, Some(&seller));
        assert_has_error_containing(&report, "older than 30 days");
    }
}
