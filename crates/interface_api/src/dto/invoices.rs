//! Invoice DTOs

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use domain_einvoicing::{
    Certificate, Invoice, Seller, SignatureVerification, ValidationError, ValidationReport,
};

#[derive(Debug, Deserialize)]
pub struct ValidateInvoiceRequest {
    pub invoice: Invoice,
    pub seller: Seller,
}

#[derive(Debug, Deserialize)]
pub struct PrepareInvoiceRequest {
    pub invoice: Invoice,
    pub seller: Seller,
    pub certificate: Certificate,
    pub certificate_password: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct LinkInvoicesRequest {
    pub current: Invoice,
    pub previous: Invoice,
}

#[derive(Debug, Deserialize)]
pub struct VerifySignatureRequest {
    pub signed_xml: String,
}

#[derive(Debug, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl From<&ValidationError> for ValidationIssue {
    fn from(error: &ValidationError) -> Self {
        Self {
            field: error.field.clone(),
            message: error.message.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl From<ValidationReport> for ValidationResponse {
    fn from(report: ValidationReport) -> Self {
        Self {
            is_valid: report.is_valid(),
            errors: report.errors().into_iter().map(ValidationIssue::from).collect(),
            warnings: report.warnings().into_iter().map(ValidationIssue::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifySignatureResponse {
    pub digest_valid: bool,
    pub signature_valid: bool,
}

impl From<SignatureVerification> for VerifySignatureResponse {
    fn from(verification: SignatureVerification) -> Self {
        Self {
            digest_valid: verification.digest_valid,
            signature_valid: verification.signature_valid,
        }
    }
}
