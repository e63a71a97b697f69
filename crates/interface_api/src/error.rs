//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use domain_einvoicing::ComplianceError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Compliance(#[from] ComplianceError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Option<Vec<String>>) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", None),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
            ApiError::Compliance(err) => match err {
                ComplianceError::ValidationFailure { errors } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "validation_error",
                    Some(errors.iter().map(|e| e.to_string()).collect()),
                ),
                ComplianceError::MissingPrerequisite(_) => {
                    (StatusCode::BAD_REQUEST, "missing_prerequisite", None)
                }
                ComplianceError::Consistency(_) => (StatusCode::BAD_REQUEST, "consistency_error", None),
                ComplianceError::Encoding(_) => (StatusCode::BAD_REQUEST, "encoding_error", None),
                ComplianceError::Cryptographic { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "cryptographic_error", None)
                }
                ComplianceError::Structural(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "structural_error", None)
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, details) = self.parts();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_einvoicing::ValidationError;

    #[test]
    fn test_validation_failure_is_unprocessable() {
        let err = ApiError::from(ComplianceError::validation_failed(vec![ValidationError::error(
            "buyer_name",
            "Buyer name is required for standard invoices",
        )]));
        let (status, kind, details) = err.parts();

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(kind, "validation_error");
        assert_eq!(details.map(|d| d.len()), Some(1));
    }

    #[test]
    fn test_status_per_kind() {
        let cases = [
            (ComplianceError::missing("no lines"), StatusCode::BAD_REQUEST),
            (ComplianceError::consistency("cleared"), StatusCode::BAD_REQUEST),
            (ComplianceError::structural("no slot"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).parts().0, expected);
        }
    }
}
