//! HTTP handlers.
//!
//! Reads are served from the live market state; trader writes go
//! through the `TraderTracker` so the store stays authoritative.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use super::error::ApiError;
use super::ApiState;
use crate::domain::token::TokenData;
use crate::domain::trader::{ProfitTier, TraderAddress, TraderData, TraderTransaction};
use crate::ports::repository::TraderRepository;
use crate::state::MarketSnapshot;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct SolPriceRequest {
    pub price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitRequest {
    pub total_profit: f64,
}

// ── Probes ──────────────────────────────────────────────────

/// GET /live - 200 while the process runs.
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /ready - 200 only when the trader store answers.
pub async fn ready<R: TraderRepository>(State(api): State<ApiState<R>>) -> impl IntoResponse {
    if api.tracker.repository().is_healthy().await {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

/// GET /metrics - Prometheus text exposition.
pub async fn metrics<R: TraderRepository>(
    State(api): State<ApiState<R>>,
) -> ApiResult<impl IntoResponse> {
    let registry = api
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("metrics are disabled".to_string()))?;
    let body = registry
        .render()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

// ── Market state ────────────────────────────────────────────

/// GET /state
pub async fn snapshot<R: TraderRepository>(
    State(api): State<ApiState<R>>,
) -> Json<MarketSnapshot> {
    Json(api.tracker.state().snapshot().await)
}

/// GET /tokens - newest first.
pub async fn list_tokens<R: TraderRepository>(
    State(api): State<ApiState<R>>,
) -> Json<Vec<TokenData>> {
    Json(api.tracker.state().tokens().await)
}

/// POST /tokens - 201 for a new mint, 200 when it replaced one.
pub async fn push_token<R: TraderRepository>(
    State(api): State<ApiState<R>>,
    Json(token): Json<TokenData>,
) -> ApiResult<StatusCode> {
    if token.mint.is_empty() {
        return Err(ApiError::BadRequest("mint must not be empty".to_string()));
    }
    let is_new = api.tracker.state().push_token(token).await;
    Ok(if is_new { StatusCode::CREATED } else { StatusCode::OK })
}

/// PUT /sol-price
pub async fn set_sol_price<R: TraderRepository>(
    State(api): State<ApiState<R>>,
    Json(req): Json<SolPriceRequest>,
) -> ApiResult<StatusCode> {
    api.tracker
        .state()
        .set_sol_price(req.price)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Traders ─────────────────────────────────────────────────

/// GET /traders - cached tiered traders.
pub async fn list_traders<R: TraderRepository>(
    State(api): State<ApiState<R>>,
) -> Json<Vec<TraderData>> {
    Json(api.tracker.state().traders().await)
}

/// POST /traders
pub async fn register_trader<R: TraderRepository>(
    State(api): State<ApiState<R>>,
    Json(data): Json<TraderData>,
) -> ApiResult<(StatusCode, Json<TraderData>)> {
    if data.address.is_empty() {
        return Err(ApiError::BadRequest("address must not be empty".to_string()));
    }
    let created = api.tracker.register_trader(&data).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /traders/:address
pub async fn get_trader<R: TraderRepository>(
    State(api): State<ApiState<R>>,
    Path(address): Path<String>,
) -> ApiResult<Json<TraderData>> {
    api.tracker
        .lookup(&address)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("trader {address}")))
}

/// DELETE /traders/:address
pub async fn forget_trader<R: TraderRepository>(
    State(api): State<ApiState<R>>,
    Path(address): Path<String>,
) -> ApiResult<StatusCode> {
    api.tracker.forget(&address).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /traders/:address/transactions - `null` when the trader dropped out.
pub async fn record_transaction<R: TraderRepository>(
    State(api): State<ApiState<R>>,
    Path(address): Path<String>,
    Json(transaction): Json<TraderTransaction>,
) -> ApiResult<Json<Option<TraderData>>> {
    let trader = api.tracker.record_transaction(&address, &transaction).await?;
    Ok(Json(trader))
}

/// PUT /traders/:address/profit - `null` when the trader dropped out.
pub async fn reclassify<R: TraderRepository>(
    State(api): State<ApiState<R>>,
    Path(address): Path<String>,
    Json(req): Json<ProfitRequest>,
) -> ApiResult<Json<Option<TraderData>>> {
    if !req.total_profit.is_finite() {
        return Err(ApiError::BadRequest("totalProfit must be finite".to_string()));
    }
    let trader = api.tracker.reclassify(&address, req.total_profit).await?;
    Ok(Json(trader))
}

/// GET /tiers/:tier
pub async fn tier_members<R: TraderRepository>(
    State(api): State<ApiState<R>>,
    Path(tier): Path<String>,
) -> ApiResult<Json<Vec<TraderAddress>>> {
    let tier: ProfitTier = tier
        .parse()
        .map_err(|e: crate::domain::trader::ParseEnumError| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(api.tracker.state().traders_in_tier(tier).await))
}

// ── Subscriptions ───────────────────────────────────────────

/// PUT /subscriptions/tokens/:mint
pub async fn subscribe_token<R: TraderRepository>(
    State(api): State<ApiState<R>>,
    Path(mint): Path<String>,
) -> StatusCode {
    if api.tracker.state().subscribe_token(&mint).await {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

/// DELETE /subscriptions/tokens/:mint
pub async fn unsubscribe_token<R: TraderRepository>(
    State(api): State<ApiState<R>>,
    Path(mint): Path<String>,
) -> StatusCode {
    if api.tracker.state().unsubscribe_token(&mint).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// PUT /subscriptions/traders/:address
pub async fn subscribe_trader<R: TraderRepository>(
    State(api): State<ApiState<R>>,
    Path(address): Path<String>,
) -> StatusCode {
    if api.tracker.state().subscribe_trader(&address).await {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

/// DELETE /subscriptions/traders/:address
pub async fn unsubscribe_trader<R: TraderRepository>(
    State(api): State<ApiState<R>>,
    Path(address): Path<String>,
) -> StatusCode {
    if api.tracker.state().unsubscribe_trader(&address).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
