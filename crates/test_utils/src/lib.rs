//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! e-invoicing test suites.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built sellers, timestamps and signing certificates
//! - `builders`: Builder patterns for invoices, lines and sellers
//! - `assertions`: Custom assertion helpers for amounts, XML and reports
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use assertions::*;
pub use generators::*;
