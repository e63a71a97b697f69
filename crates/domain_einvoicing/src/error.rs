//! E-invoicing domain errors
//!
//! Every failure the compliance pipeline can raise falls into one of the
//! kinds below. None of them is retried here; callers fix their inputs and
//! invoke the pipeline again.

use thiserror::Error;

use crate::qr::QrError;
use crate::signing::SigningError;
use crate::validation::ValidationError;

/// Errors that can occur in the e-invoicing domain
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// One or more blocking business-rule violations
    #[error("Invoice validation failed: {}", join_messages(.errors))]
    ValidationFailure {
        errors: Vec<ValidationError>,
    },

    /// The invoice graph is incomplete (e.g. no lines)
    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    /// Certificate, key or signature computation failure
    #[error("Cryptographic failure: {message}")]
    Cryptographic {
        message: String,
        #[source]
        source: SigningError,
    },

    /// The document does not have the shape the signer expects
    #[error("Structural failure: {0}")]
    Structural(String),

    /// Hash chain or lifecycle state is inconsistent
    #[error("Consistency failure: {0}")]
    Consistency(String),

    /// A QR value could not be TLV-encoded
    #[error("QR encoding failed: {0}")]
    Encoding(#[from] QrError),
}

impl ComplianceError {
    /// Creates a ValidationFailure from the blocking entries of a report
    pub fn validation_failed(errors: Vec<ValidationError>) -> Self {
        ComplianceError::ValidationFailure { errors }
    }

    /// Creates a MissingPrerequisite error
    pub fn missing(message: impl Into<String>) -> Self {
        ComplianceError::MissingPrerequisite(message.into())
    }

    /// Creates a Cryptographic error with its underlying cause
    pub fn cryptographic(message: impl Into<String>, source: SigningError) -> Self {
        ComplianceError::Cryptographic {
            message: message.into(),
            source,
        }
    }

    /// Creates a Structural error
    pub fn structural(message: impl Into<String>) -> Self {
        ComplianceError::Structural(message.into())
    }

    /// Creates a Consistency error
    pub fn consistency(message: impl Into<String>) -> Self {
        ComplianceError::Consistency(message.into())
    }

    /// Messages of a ValidationFailure, empty for every other kind
    pub fn validation_messages(&self) -> Vec<String> {
        match self {
            ComplianceError::ValidationFailure { errors } => {
                errors.iter().map(|e| e.message.clone()).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
