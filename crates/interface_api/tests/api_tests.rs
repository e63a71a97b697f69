//! HTTP API tests for interface_api
//!
//! Drives the router in-process; no socket is bound.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use interface_api::{config::ApiConfig, create_router};
use test_utils::{CertificateFixtures, InvoiceBuilder, SellerFixtures};

fn app() -> Router {
    create_router(ApiConfig::default())
}

async fn post_json(path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn prepare_body(builder: InvoiceBuilder) -> Value {
    let seller = SellerFixtures::standard();
    let certificate = CertificateFixtures::active_for(seller.id);
    json!({
        "invoice": builder.for_seller(&seller).build(),
        "seller": seller,
        "certificate": certificate,
        "certificate_password": CertificateFixtures::PASSWORD,
    })
}

// ============================================================================
// Health Tests
// ============================================================================

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

// ============================================================================
// Validate Endpoint Tests
// ============================================================================

mod validate_tests {
    use super::*;

    #[tokio::test]
    async fn test_valid_invoice() {
        let seller = SellerFixtures::standard();
        let invoice = InvoiceBuilder::new().for_seller(&seller).with_sample_lines().build();

        let (status, body) =
            post_json("/api/v1/invoices/validate", json!({ "invoice": invoice, "seller": seller })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_valid"], true);
        assert_eq!(body["errors"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_missing_buyer_is_reported() {
        let seller = SellerFixtures::standard();
        let invoice = InvoiceBuilder::new()
            .for_seller(&seller)
            .without_buyer()
            .with_sample_lines()
            .build();

        let (status, body) =
            post_json("/api/v1/invoices/validate", json!({ "invoice": invoice, "seller": seller })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_valid"], false);
        let messages: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|e| e["message"].as_str())
            .collect();
        assert!(messages.iter().any(|m| m.contains("Buyer name is required")));
    }

    #[tokio::test]
    async fn test_foreign_currency_is_a_warning() {
        let seller = SellerFixtures::standard();
        let invoice = InvoiceBuilder::new()
            .for_seller(&seller)
            .with_currency("USD")
            .with_sample_lines()
            .build();

        let (_, body) =
            post_json("/api/v1/invoices/validate", json!({ "invoice": invoice, "seller": seller })).await;

        assert_eq!(body["is_valid"], true);
        assert_eq!(body["warnings"].as_array().map(Vec::len), Some(1));
    }
}

// ============================================================================
// Prepare Endpoint Tests
// ============================================================================

mod prepare_tests {
    use super::*;

    #[tokio::test]
    async fn test_prepare_returns_artifacts() {
        let (status, body) =
            post_json("/api/v1/invoices/prepare", prepare_body(InvoiceBuilder::new().with_sample_lines())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "validated");
        for field in ["invoice_hash", "qr_code", "signed_xml"] {
            assert!(!body[field].as_str().unwrap_or_default().is_empty(), "{} is empty", field);
        }
    }

    #[tokio::test]
    async fn test_invalid_invoice_is_unprocessable() {
        let (status, body) =
            post_json("/api/v1/invoices/prepare", prepare_body(InvoiceBuilder::new().without_buyer().with_sample_lines()))
                .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");
        assert!(!body["details"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cleared_invoice_is_a_bad_request() {
        let (status, body) = post_json(
            "/api/v1/invoices/prepare",
            prepare_body(
                InvoiceBuilder::new()
                    .with_status(domain_einvoicing::InvoiceStatus::Cleared)
                    .with_sample_lines(),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "consistency_error");
    }

    #[tokio::test]
    async fn test_mismatched_key_is_a_server_error() {
        let mut body = prepare_body(InvoiceBuilder::new().with_sample_lines());
        body["certificate"] = json!(CertificateFixtures::mismatched_for(SellerFixtures::seller_id()));

        let (status, body) = post_json("/api/v1/invoices/prepare", body).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "cryptographic_error");
        assert!(body["message"].as_str().unwrap().contains("no usable private key"));
    }
}

// ============================================================================
// Link and Verify Endpoint Tests
// ============================================================================

mod link_and_verify_tests {
    use super::*;

    #[tokio::test]
    async fn test_link_requires_hashed_previous() {
        let previous = InvoiceBuilder::new().with_number("A").with_sample_lines().build();
        let current = InvoiceBuilder::new().with_number("B").with_sample_lines().build();

        let (status, body) =
            post_json("/api/v1/invoices/link", json!({ "current": current, "previous": previous })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "consistency_error");
    }

    #[tokio::test]
    async fn test_link_copies_previous_hash() {
        let mut previous = InvoiceBuilder::new().with_number("A").with_sample_lines().build();
        previous.invoice_hash = Some("NWZlY2ViNjZmZmM4NmYzOGQ5NTI3ODZjNmQ2OTZjNzk=".to_string());
        let current = InvoiceBuilder::new().with_number("B").with_sample_lines().build();

        let (status, body) =
            post_json("/api/v1/invoices/link", json!({ "current": current, "previous": previous })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["previous_invoice_hash"], "NWZlY2ViNjZmZmM4NmYzOGQ5NTI3ODZjNmQ2OTZjNzk=");
    }

    #[tokio::test]
    async fn test_prepared_document_verifies() {
        let (_, prepared) =
            post_json("/api/v1/invoices/prepare", prepare_body(InvoiceBuilder::new().with_sample_lines())).await;

        let (status, body) =
            post_json("/api/v1/invoices/verify", json!({ "signed_xml": prepared["signed_xml"] })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["digest_valid"], true);
        assert_eq!(body["signature_valid"], true);
    }

    #[tokio::test]
    async fn test_verify_requires_a_document() {
        let (status, body) = post_json("/api/v1/invoices/verify", json!({ "signed_xml": "  " })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }
}
