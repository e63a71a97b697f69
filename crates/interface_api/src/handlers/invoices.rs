//! Invoice handlers

use axum::{extract::State, Json};
use tracing::info;

use domain_einvoicing::{Invoice, InvoicePreparationInput, InvoiceSigner, PreparedInvoice};

use crate::dto::invoices::*;
use crate::{error::ApiError, AppState};

/// Validates an invoice without changing it
pub async fn validate_invoice(
    State(state): State<AppState>,
    Json(request): Json<ValidateInvoiceRequest>,
) -> Json<ValidationResponse> {
    let report = state.pipeline.validate_only(&request.invoice, &request.seller);
    Json(report.into())
}

/// Produces the signed XML, QR payload and hash for an invoice
pub async fn prepare_invoice(
    State(state): State<AppState>,
    Json(request): Json<PrepareInvoiceRequest>,
) -> Result<Json<PreparedInvoice>, ApiError> {
    let pipeline = state.pipeline.clone();
    let mut input = InvoicePreparationInput::new(
        request.invoice,
        request.seller,
        request.certificate,
        request.certificate_password,
    );

    // Key decryption and RSA signing are CPU bound
    let prepared = tokio::task::spawn_blocking(move || pipeline.prepare_for_submission(&mut input))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    info!(invoice_id = %prepared.invoice_id, "Invoice prepared");
    Ok(Json(prepared))
}

/// Chains the current invoice to its predecessor's hash
pub async fn link_invoices(
    State(state): State<AppState>,
    Json(request): Json<LinkInvoicesRequest>,
) -> Result<Json<Invoice>, ApiError> {
    let LinkInvoicesRequest { mut current, previous } = request;
    state.pipeline.link_to_previous(&mut current, &previous)?;
    Ok(Json(current))
}

/// Checks the digest and RSA signature of a signed document
pub async fn verify_signature(
    Json(request): Json<VerifySignatureRequest>,
) -> Result<Json<VerifySignatureResponse>, ApiError> {
    if request.signed_xml.trim().is_empty() {
        return Err(ApiError::BadRequest("signed_xml is required".to_string()));
    }

    let verification = tokio::task::spawn_blocking(move || InvoiceSigner::verify(&request.signed_xml))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(verification.into()))
}
