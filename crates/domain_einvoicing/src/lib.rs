//! E-Invoicing Domain - Invoice Compliance Pipeline
//!
//! This crate turns a draft invoice (seller, buyer, line items) into the
//! artifacts a tax authority's clearance/reporting API accepts: a signed UBL
//! XML document, a TLV QR payload, and a chained SHA-256 invoice hash.
//!
//! # Components
//!
//! - **Validator**: business-compliance rules, collected rather than fail-fast
//! - **QrEncoder**: five-record Tag-Length-Value payload, base64-encoded
//! - **XmlBuilder**: namespace-qualified UBL invoice document
//! - **Hasher**: base64 SHA-256 digest of a document
//! - **Signer**: enveloped XML digital signature (RSA-SHA256)
//! - **CompliancePipeline**: sequences the above for one invoice
//!
//! Every component is stateless; distinct invoices can be prepared
//! concurrently without coordination.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_einvoicing::{CompliancePipeline, ComplianceConfig, InvoicePreparationInput};
//!
//! let pipeline = CompliancePipeline::new(ComplianceConfig::default());
//! let mut input = InvoicePreparationInput::new(invoice, seller, certificate, password);
//!
//! let prepared = pipeline.prepare_for_submission(&mut input)?;
//! submit(&prepared.signed_xml, input.invoice.id);
//! ```

pub mod invoice;
pub mod seller;
pub mod certificate;
pub mod config;
pub mod validation;
pub mod qr;
pub mod c14n;
pub mod xml;
pub mod hashing;
pub mod signing;
pub mod pipeline;
pub mod error;

pub use invoice::{Invoice, InvoiceLine, InvoiceType, InvoiceStatus, InvoiceTotals};
pub use seller::{Seller, SellerAddress};
pub use certificate::{Certificate, CertificateEnvironment};
pub use config::ComplianceConfig;
pub use validation::{InvoiceValidator, ValidationError, ValidationReport, Severity};
pub use qr::{QrEncoder, QrPayload, QrError, TlvRecord};
pub use xml::{InvoiceXmlBuilder, InvoiceDocument, UblExtension, ExtensionContent};
pub use hashing::InvoiceHasher;
pub use signing::{InvoiceSigner, SigningCredentials, SigningError, SignatureVerification};
pub use pipeline::{CompliancePipeline, InvoicePreparationInput, PreparedInvoice};
pub use error::ComplianceError;
