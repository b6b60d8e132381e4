//! HTTP handlers
//!
//! Thin adapters: decode the request, call the engine, wrap the result in
//! `ApiResponse`. Engine errors map through `From<TransferError>`.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use super::auth::Claims;
use super::state::AppState;
use super::types::{ApiError, ApiResponse, ApiResult, created, error_codes, ok};
use crate::transfer::api::{
    BalanceResponse, CreateTransferRequest, CreateTransferResponse, WebhookAck, WebhookEvent,
};
use crate::transfer::{Transfer, TransferId};

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// `POST /api/v1/transfer`
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateTransferRequest>, JsonRejection>,
) -> ApiResult<CreateTransferResponse> {
    let req = json_body(payload)?;
    tracing::debug!(
        sub = %claims.sub,
        from = %req.source_account_id,
        to = %req.destination_account_id,
        "Create transfer request"
    );

    let id = state.service.create_transfer(req.into()).await?;
    created(CreateTransferResponse::pending(id))
}

/// `GET /api/v1/transfer/{id}`
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Transfer> {
    let transfer = state.service.get_transfer(&TransferId::from(id)).await?;
    ok(transfer)
}

/// `GET /api/v1/account/{id}/balance`
pub async fn get_account_balance(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> ApiResult<BalanceResponse> {
    let balance = state.service.get_account_balance(&account_id).await?;
    ok(BalanceResponse {
        account_id,
        balance,
    })
}

/// `POST /api/v1/webhook`
///
/// Called by the payment provider; no bearer token.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WebhookEvent>, JsonRejection>,
) -> ApiResult<WebhookAck> {
    let event = json_body(payload)?;
    tracing::info!(
        transfer_id = %event.transfer_id,
        status = %event.status,
        "Webhook received"
    );

    state
        .service
        .update_transfer_status(&TransferId::from(event.transfer_id), &event.status)
        .await?;
    ok(WebhookAck::UPDATED)
}

/// Health check response data
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Ledger store backend
    pub store: &'static str,
    pub version: &'static str,
    /// Monitors not yet finished
    pub live_monitors: usize,
}

/// `GET /api/v1/health`
///
/// - Healthy: 200 OK + {code: 0, data: {...}}
/// - Unhealthy: 503 Service Unavailable
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let store = state.service.store();
    if let Err(e) = store.health_check().await {
        tracing::error!(store = store.name(), error = %e, "[HEALTH] Ledger store probe failed");
        return Err(ApiError::service_unavailable("unavailable"));
    }

    ok(HealthResponse {
        store: store.name(),
        version: env!("CARGO_PKG_VERSION"),
        live_monitors: state.service.monitors().live(),
    })
}

/// `GET /metrics`
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics {
        Some(ref handle) => handle.render().into_response(),
        None => ApiError::service_unavailable("metrics recorder not installed").into_response(),
    }
}

/// Fallback for unknown routes
pub async fn not_found() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error(
            error_codes::ROUTE_NOT_FOUND,
            "Route not found",
        )),
    )
}
