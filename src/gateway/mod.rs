//! HTTP Gateway
//!
//! ```text
//! POST /api/v1/transfer               JWT   create
//! GET  /api/v1/transfer/{id}          JWT   lookup
//! GET  /api/v1/account/{id}/balance   JWT   derived balance
//! POST /api/v1/webhook                -     provider status update
//! GET  /api/v1/health                 -     store probe
//! GET  /metrics                       -     Prometheus text
//! ```

pub mod auth;
pub mod handlers;
pub mod state;
pub mod types;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    body::Body,
    http::Request,
    middleware::{Next, from_fn, from_fn_with_state},
    response::Response,
    routing::{get, post},
};
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
pub use state::AppState;

/// Log method, path, status and latency of every request
async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "HTTP request"
    );
    response
}

/// Build the full router
pub fn router(state: Arc<AppState>) -> Router {
    let private_routes = Router::new()
        .route("/transfer", post(handlers::create_transfer))
        .route("/transfer/{id}", get(handlers::get_transfer))
        .route("/account/{id}/balance", get(handlers::get_account_balance))
        .layer(from_fn_with_state(state.clone(), auth::jwt_auth_middleware));

    let public_routes = Router::new()
        .route("/webhook", post(handlers::webhook))
        .route("/health", get(handlers::health_check));

    Router::new()
        .nest("/api/v1", private_routes.merge(public_routes))
        .route("/metrics", get(handlers::metrics))
        .fallback(handlers::not_found)
        .layer(from_fn(log_requests))
        .with_state(state)
}

/// Start HTTP Gateway server; returns once `shutdown` resolves and
/// in-flight requests have drained
pub async fn run_server<F>(
    config: &GatewayConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.inspect_err(|e| {
        tracing::error!(
            addr = %addr,
            error = %e,
            "Failed to bind; port may already be in use"
        );
    })?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("Private API: /api/v1/transfer, /api/v1/account/* (bearer token)");
    tracing::info!("Webhook: /api/v1/webhook");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
