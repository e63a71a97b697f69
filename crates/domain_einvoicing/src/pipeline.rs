//! Compliance pipeline
//!
//! Sequences the stateless components for one invoice:
//!
//! 1. Validate the invoice graph
//! 2. Recompute line amounts and invoice totals
//! 3. Encode the QR payload
//! 4. Build the XML with an empty hash, hash it, build it again with the hash
//! 5. Sign the hashed document
//!
//! Every step works on a copy; the caller's invoice only changes once all
//! of them succeeded.

use chrono::Utc;
use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use core_kernel::InvoiceId;

use crate::certificate::Certificate;
use crate::config::ComplianceConfig;
use crate::error::ComplianceError;
use crate::hashing::InvoiceHasher;
use crate::invoice::{Invoice, InvoiceStatus, InvoiceTotals};
use crate::qr::QrEncoder;
use crate::seller::Seller;
use crate::signing::InvoiceSigner;
use crate::validation::{InvoiceValidator, ValidationReport};
use crate::xml::InvoiceXmlBuilder;

/// Everything needed to prepare one invoice
pub struct InvoicePreparationInput {
    pub invoice: Invoice,
    pub seller: Seller,
    pub certificate: Certificate,
    pub certificate_password: SecretString,
}

impl InvoicePreparationInput {
    pub fn new(
        invoice: Invoice,
        seller: Seller,
        certificate: Certificate,
        certificate_password: SecretString,
    ) -> Self {
        Self {
            invoice,
            seller,
            certificate,
            certificate_password,
        }
    }
}

/// Artifacts produced for submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedInvoice {
    pub invoice_id: InvoiceId,
    pub status: InvoiceStatus,
    /// Base64 SHA-256 hash, the next invoice's PIH
    pub invoice_hash: String,
    /// Base64 TLV QR payload
    pub qr_code: String,
    /// Signed UBL document
    pub signed_xml: String,
}

/// Orchestrates validation, QR, XML, hashing and signing
#[derive(Debug, Clone, Default)]
pub struct CompliancePipeline {
    validator: InvoiceValidator,
    xml_builder: InvoiceXmlBuilder,
}

impl CompliancePipeline {
    pub fn new(config: ComplianceConfig) -> Self {
        Self {
            validator: InvoiceValidator::new(config.clone()),
            xml_builder: InvoiceXmlBuilder::new(config),
        }
    }

    /// Turns a draft (or re-prepared) invoice into signed, hashed artifacts
    ///
    /// On success the invoice carries the QR payload, hash and signed XML and
    /// its status is `Validated`. On failure it is left untouched.
    #[instrument(skip(self, input), fields(invoice_id = %input.invoice.id))]
    pub fn prepare_for_submission(
        &self,
        input: &mut InvoicePreparationInput,
    ) -> Result<PreparedInvoice, ComplianceError> {
        let InvoicePreparationInput {
            invoice,
            seller,
            certificate,
            certificate_password,
        } = input;

        if !invoice.status.can_prepare() {
            return Err(ComplianceError::consistency(format!(
                "Invoice {} is {:?} and can no longer be prepared",
                invoice.invoice_number, invoice.status
            )));
        }
        if certificate.seller_id != seller.id {
            return Err(ComplianceError::consistency(format!(
                "Certificate {} does not belong to seller {}",
                certificate.id, seller.id
            )));
        }

        let report = self.validator.validate_invoice(invoice, Some(&*seller));
        for warning in report.warnings() {
            warn!(field = %warning.field, "{}", warning.message);
        }
        if !report.is_valid() {
            let errors = report.into_blocking();
            info!(error_count = errors.len(), "Invoice failed validation");
            return Err(ComplianceError::validation_failed(errors));
        }

        let mut working = invoice.clone();
        for line in &mut working.lines {
            line.recalculate();
        }
        if working.lines.is_empty() {
            return Err(ComplianceError::missing(format!(
                "Invoice {} has no lines",
                working.invoice_number
            )));
        }
        working.apply_totals(InvoiceTotals::from_lines(&working.lines));

        let qr_code = QrEncoder::encode(
            &seller.name,
            &seller.vat_number,
            working.issue_date,
            working.grand_total,
            working.vat_amount,
        )?;

        let unhashed = self.xml_builder.build_unhashed(&working, seller, &qr_code)?;
        let invoice_hash = InvoiceHasher::hash(&unhashed.render());
        debug!(%invoice_hash, "Invoice hashed");

        let hashed = self
            .xml_builder
            .build_hashed(&working, seller, &invoice_hash, &qr_code)?;
        let signed_xml = InvoiceSigner::sign_document(&hashed, certificate, certificate_password)?.render();

        working.qr_code = Some(qr_code.clone());
        working.invoice_hash = Some(invoice_hash.clone());
        working.xml_content = Some(signed_xml.clone());
        working.status = InvoiceStatus::Validated;
        working.updated_at = Utc::now();
        *invoice = working;

        info!(grand_total = %invoice.grand_total, "Invoice prepared for submission");

        Ok(PreparedInvoice {
            invoice_id: invoice.id,
            status: invoice.status,
            invoice_hash,
            qr_code,
            signed_xml,
        })
    }

    /// Runs validation alone; nothing on the invoice changes
    #[instrument(skip(self, invoice, seller), fields(invoice_id = %invoice.id))]
    pub fn validate_only(&self, invoice: &Invoice, seller: &Seller) -> ValidationReport {
        let report = self.validator.validate_invoice(invoice, Some(seller));
        debug!(
            is_valid = report.is_valid(),
            errors = report.errors().len(),
            warnings = report.warnings().len(),
            "Invoice validated"
        );
        report
    }

    /// Chains `current` to `previous` through the previous-invoice hash
    #[instrument(skip(self, current, previous), fields(invoice_id = %current.id, previous_id = %previous.id))]
    pub fn link_to_previous(&self, current: &mut Invoice, previous: &Invoice) -> Result<(), ComplianceError> {
        current.link_to_previous(previous)?;
        info!("Invoice linked to previous invoice");
        Ok(())
    }
}
