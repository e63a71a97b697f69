//! Core Kernel - Foundational types and utilities for the e-invoicing system
//!
//! This crate provides the fundamental building blocks used by the compliance domain:
//! - Strongly-typed identifiers for invoices, lines, sellers and certificates
//! - Amount helpers with precise decimal rounding and invariant formatting
//! - Issue-timestamp formatting shared by the QR payload and the XML document

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod error;

pub use money::{
    Percentage, round_amount, format_amount, parse_amount, amounts_match,
    AMOUNT_SCALE, AMOUNT_TOLERANCE, SAUDI_RIYAL,
};
pub use temporal::{format_qr_timestamp, parse_qr_timestamp, format_issue_date, format_issue_time, age_in_days};
pub use identifiers::{InvoiceId, InvoiceLineId, SellerId, CertificateId};
pub use error::CoreError;
