//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for invoice amounts, documents and
//! validation reports that give more meaningful messages than standard
//! assertions.

use quick_xml::events::Event;
use quick_xml::Reader;
use rust_decimal::Decimal;

use core_kernel::round_amount;
use domain_einvoicing::{Invoice, ValidationReport};

/// Asserts that an amount equals the expected value at two decimals
///
/// # Panics
///
/// Panics if the amounts differ once rounded to two decimal places
pub fn assert_amount_eq(actual: Decimal, expected: Decimal) {
    assert_eq!(
        round_amount(actual),
        round_amount(expected),
        "Amounts differ: actual={}, expected={}",
        actual,
        expected
    );
}

/// Asserts that an invoice's totals equal the rounded sums of its lines
pub fn assert_totals_consistent(invoice: &Invoice) {
    let net: Decimal = invoice.lines.iter().map(|l| l.net_amount).sum();
    let vat: Decimal = invoice.lines.iter().map(|l| l.vat_amount).sum();

    assert_amount_eq(invoice.subtotal, net);
    assert_amount_eq(invoice.vat_amount, vat);
    assert_eq!(
        invoice.grand_total,
        invoice.subtotal + invoice.vat_amount,
        "Grand total {} is not subtotal {} + VAT {}",
        invoice.grand_total,
        invoice.subtotal,
        invoice.vat_amount
    );
}

/// Asserts that `xml` parses to the end with balanced elements and a single root
pub fn assert_well_formed_xml(xml: &str) {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Ok(Event::Empty(_)) if depth == 0 => roots += 1,
            Ok(Event::End(_)) => {
                depth = depth.checked_sub(1).expect("closing tag without an open element");
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!(
                "XML is not well-formed at byte {}: {}",
                reader.buffer_position(),
                e
            ),
        }
    }

    assert_eq!(depth, 0, "XML ended with {} unclosed element(s)", depth);
    assert_eq!(roots, 1, "XML must have exactly one root element, found {}", roots);
}

/// Asserts that a report has no blocking entries
pub fn assert_no_blocking_errors(report: &ValidationReport) {
    assert!(
        report.is_valid(),
        "Expected no blocking validation errors, got: {:?}",
        report.blocking_messages()
    );
}

/// Asserts that some blocking message contains `fragment`
pub fn assert_has_error_containing(report: &ValidationReport, fragment: &str) {
    let messages = report.blocking_messages();
    assert!(
        messages.iter().any(|m| m.contains(fragment)),
        "No blocking error contains {:?}; errors were: {:?}",
        fragment,
        messages
    );
}
