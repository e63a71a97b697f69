//! HTTP API Layer
//!
//! In-house REST surface over the e-invoicing compliance pipeline, using Axum.
//! Submission to the tax authority is not part of this crate; callers take
//! the prepared artifacts to their own submission client.
//!
//! # Architecture
//!
//! - **Handlers**: validate, prepare, link and verify
//! - **Middleware**: request logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use domain_einvoicing::CompliancePipeline;

use crate::config::ApiConfig;
use crate::handlers::{health, invoices};
use crate::middleware::request_logging_middleware;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CompliancePipeline>,
    pub config: ApiConfig,
}

/// Creates the main API router
pub fn create_router(config: ApiConfig) -> Router {
    let state = AppState {
        pipeline: Arc::new(CompliancePipeline::new(config.compliance.clone())),
        config,
    };

    let public_routes = Router::new().route("/health", get(health::health_check));

    let invoice_routes = Router::new()
        .route("/validate", post(invoices::validate_invoice))
        .route("/prepare", post(invoices::prepare_invoice))
        .route("/link", post(invoices::link_invoices))
        .route("/verify", post(invoices::verify_signature));

    let api_routes = Router::new()
        .nest("/invoices", invoice_routes)
        .layer(axum_middleware::from_fn(request_logging_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
