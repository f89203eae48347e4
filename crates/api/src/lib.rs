//! HTTP API server with observability for the onboarding orchestrator.
//!
//! Exposes the registration saga, the document signing flow and operator
//! discovery as REST endpoints, with structured logging (tracing) and
//! Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{HttpServiceClient, Orchestrator, ServiceClient};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::TokenVerifier;
use config::Config;
use routes::orchestrator::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<C: ServiceClient + Clone + 'static>(
    state: Arc<AppState<C>>,
    metrics_handle: PrometheusHandle,
    max_upload_bytes: usize,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orchestrator/register",
            post(routes::orchestrator::register::<C>),
        )
        .route(
            "/orchestrator/authenticate_doc",
            post(routes::orchestrator::authenticate_doc::<C>),
        )
        .route(
            "/orchestrator/operators",
            get(routes::orchestrator::operators::<C>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over any service client.
pub fn create_state<C: ServiceClient + Clone>(client: C, config: &Config) -> Arc<AppState<C>> {
    Arc::new(AppState {
        orchestrator: Orchestrator::new(client, &config.services),
        tokens: TokenVerifier::hs256(&config.jwt_secret),
    })
}

/// Creates the default application state talking HTTP to the configured services.
pub fn create_default_state(config: &Config) -> Arc<AppState<HttpServiceClient>> {
    let client = HttpServiceClient::new(Arc::new(config.services.clone()));
    create_state(client, config)
}
