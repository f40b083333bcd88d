//! HTTP API Layer
//!
//! This crate provides the REST API for the claims records service using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for claims, bulk data and the dashboard
//! - **Middleware**: Authentication, authorization, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let store = Arc::new(PostgresClaimStore::new(pool));
//! let app = create_router(store, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderName,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_claims::ClaimStore;

use crate::config::ApiConfig;
use crate::handlers::{claims, dashboard, data, health};
use crate::middleware::{audit_middleware, auth_middleware, require_data_admin, REQUEST_ID_HEADER};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ClaimStore>,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `store` - Claim storage
/// * `config` - API configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(store: Arc<dyn ClaimStore>, config: ApiConfig) -> Router {
    let upload_limit = config.upload_body_limit();
    let state = AppState { store, config };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Claims routes
    let claims_routes = Router::new()
        .route("/", get(claims::list_claims))
        .route("/:id", get(claims::get_claim))
        .route("/:id/status", put(claims::update_status))
        .route("/:id/flags", post(claims::flag_claim))
        .route("/:id/notes", post(claims::add_note));

    // Bulk data routes (data admins only)
    let data_routes = Router::new()
        .route(
            "/import",
            post(data::import_data).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/export", get(data::export_data))
        .route("/stats", get(data::data_stats))
        .route("/claims", delete(data::purge_data))
        .route_layer(axum_middleware::from_fn(require_data_admin));

    let dashboard_routes = Router::new()
        .route("/", get(dashboard::dashboard))
        .route_layer(axum_middleware::from_fn(require_data_admin));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/claims", claims_routes)
        .nest("/data", data_routes)
        .nest("/dashboard", dashboard_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
