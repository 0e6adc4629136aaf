//! HTTP API for the Plaudit endorsement service.
//!
//! Every route is served both at the root and under `/api`:
//! - `POST /oauth/start`, `POST /oauth/callback`: sign-in
//! - `POST /endorse`, `DELETE /endorse`, `GET /endorse`: record, withdraw, check
//! - `GET /my-endorsements`: the caller's endorsements
//! - `GET /stats`: global or per-proposal totals
//! - `GET /health`, `GET /metrics`

pub mod error;
pub mod handlers;
pub mod server;

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use plaudit_node::EndorsementService;

pub use error::RpcError;
pub use server::RpcServer;

/// How long browsers may cache a preflight answer.
const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

#[derive(Clone)]
pub struct RpcState {
    pub service: EndorsementService,
    pub metrics_enabled: bool,
}

fn routes() -> Router<RpcState> {
    Router::new()
        .route("/oauth/start", post(handlers::start_auth))
        .route("/oauth/callback", post(handlers::complete_auth))
        .route(
            "/endorse",
            post(handlers::endorse)
                .delete(handlers::unendorse)
                .get(handlers::check_endorsement),
        )
        .route("/my-endorsements", get(handlers::my_endorsements))
        .route("/stats", get(handlers::stats))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
}

/// Build the router with CORS restricted to `allowed_origin`.
pub fn build_router(state: RpcState, allowed_origin: &str) -> Result<Router, RpcError> {
    let origin = HeaderValue::from_str(allowed_origin)
        .map_err(|e| RpcError::Config(format!("allowed origin {allowed_origin:?}: {e}")))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(CORS_MAX_AGE);

    Ok(Router::new()
        .merge(routes())
        .nest("/api", routes())
        .fallback(handlers::not_found)
        .layer(cors)
        .with_state(state))
}
