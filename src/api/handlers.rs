use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::TradingRules;
use crate::engine::{EngineError, FlowError, OrderEntryEngine, OrderPreview};
use crate::models::{OrderDraft, OrderType, Quote, SymbolInfo};

use super::responses::*;

/// Shared application state
pub type AppState = Arc<OrderEntryEngine>;

/// Query parameters for symbol search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Convert EngineError to HTTP response
impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::UnknownSymbol(_) => StatusCode::NOT_FOUND,
            EngineError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::StaleOrder(_) => StatusCode::CONFLICT,
            EngineError::Flow(FlowError::OtpFormat { .. }) => StatusCode::BAD_REQUEST,
            EngineError::Flow(_) => StatusCode::CONFLICT,
            EngineError::SubmissionLost(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: self.to_string(),
            fields: self.field_errors().cloned(),
        });

        (status, body).into_response()
    }
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// Search listed symbols by code or company name
#[utoipa::path(
    get,
    path = "/api/v1/symbols",
    tag = "Market",
    params(
        ("q" = Option<String>, Query, description = "Case-insensitive substring of symbol or name")
    ),
    responses(
        (status = 200, description = "Matching symbols", body = Vec<SymbolInfo>)
    )
)]
pub async fn search_symbols(
    State(engine): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<SymbolInfo>> {
    Json(engine.search_symbols(&query.q))
}

/// Get the current quote for a symbol
#[utoipa::path(
    get,
    path = "/api/v1/quotes/{symbol}",
    tag = "Market",
    params(
        ("symbol" = String, Path, description = "Symbol code (e.g., VNM)")
    ),
    responses(
        (status = 200, description = "Quote snapshot", body = Quote),
        (status = 404, description = "Unknown symbol", body = ErrorResponse)
    )
)]
pub async fn get_quote(
    State(engine): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Quote>, EngineError> {
    Ok(Json(engine.quote(&symbol)?))
}

/// List supported order types
#[utoipa::path(
    get,
    path = "/api/v1/order-types",
    tag = "Orders",
    responses(
        (status = 200, description = "Order type catalogue", body = Vec<OrderTypeResponse>)
    )
)]
pub async fn list_order_types() -> Json<Vec<OrderTypeResponse>> {
    Json(OrderType::ALL.into_iter().map(OrderTypeResponse::from).collect())
}

/// Trading rules in force (lot size, fee rate, OTP length, price ticks)
#[utoipa::path(
    get,
    path = "/api/v1/rules",
    tag = "Orders",
    responses(
        (status = 200, description = "Trading rules", body = TradingRules)
    )
)]
pub async fn get_trading_rules(State(engine): State<AppState>) -> Json<TradingRules> {
    Json(engine.config().trading.clone())
}

/// Derived values and validation for a draft
#[utoipa::path(
    post,
    path = "/api/v1/orders/preview",
    tag = "Orders",
    request_body = OrderDraft,
    responses(
        (status = 200, description = "Derived values and field errors", body = OrderPreview),
        (status = 404, description = "Unknown symbol", body = ErrorResponse)
    )
)]
pub async fn preview_order(
    State(engine): State<AppState>,
    Json(draft): Json<OrderDraft>,
) -> Result<Json<OrderPreview>, EngineError> {
    Ok(Json(engine.preview(draft)?))
}

/// Validate a draft and open a confirmation session in the review step
#[utoipa::path(
    post,
    path = "/api/v1/confirmations",
    tag = "Confirmations",
    request_body = OrderDraft,
    responses(
        (status = 201, description = "Session opened", body = SessionResponse),
        (status = 404, description = "Unknown symbol", body = ErrorResponse),
        (status = 422, description = "Draft not admissible", body = ErrorResponse)
    )
)]
pub async fn open_confirmation(
    State(engine): State<AppState>,
    Json(draft): Json<OrderDraft>,
) -> Result<(StatusCode, Json<SessionResponse>), EngineError> {
    let flow = engine.open_confirmation(draft)?;
    Ok((StatusCode::CREATED, Json(flow.into())))
}

/// Get a confirmation session
#[utoipa::path(
    get,
    path = "/api/v1/confirmations/{id}",
    tag = "Confirmations",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session found", body = SessionResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn get_confirmation(
    State(engine): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, EngineError> {
    Ok(Json(engine.session(id)?.into()))
}

/// Move from review to the OTP step
#[utoipa::path(
    post,
    path = "/api/v1/confirmations/{id}/continue",
    tag = "Confirmations",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Now in the OTP step", body = SessionResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Not in the review step", body = ErrorResponse)
    )
)]
pub async fn continue_confirmation(
    State(engine): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, EngineError> {
    Ok(Json(engine.proceed(id)?.into()))
}

/// Go back from the OTP step to review
#[utoipa::path(
    post,
    path = "/api/v1/confirmations/{id}/back",
    tag = "Confirmations",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Back in review", body = SessionResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Not in the OTP step", body = ErrorResponse)
    )
)]
pub async fn back_confirmation(
    State(engine): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, EngineError> {
    Ok(Json(engine.back(id)?.into()))
}

/// Enter the OTP
#[utoipa::path(
    post,
    path = "/api/v1/confirmations/{id}/otp",
    tag = "Confirmations",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    request_body = OtpRequest,
    responses(
        (status = 200, description = "OTP recorded", body = SessionResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Not in the OTP step", body = ErrorResponse)
    )
)]
pub async fn enter_otp(
    State(engine): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<OtpRequest>,
) -> Result<Json<SessionResponse>, EngineError> {
    Ok(Json(engine.enter_otp(id, &request.code)?.into()))
}

/// Submit the order; responds once the submission has resolved
#[utoipa::path(
    post,
    path = "/api/v1/confirmations/{id}/submit",
    tag = "Confirmations",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Submission resolved (success or error step)", body = SessionResponse),
        (status = 400, description = "OTP incomplete", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Not in the OTP step, submission in flight, or order stale", body = ErrorResponse),
        (status = 500, description = "Submission task ended without an outcome", body = ErrorResponse)
    )
)]
pub async fn submit_confirmation(
    State(engine): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, EngineError> {
    Ok(Json(engine.submit(id).await?.into()))
}

/// Dismiss a failed submission
#[utoipa::path(
    post,
    path = "/api/v1/confirmations/{id}/acknowledge",
    tag = "Confirmations",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session cancelled", body = SessionResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Not in the error step", body = ErrorResponse)
    )
)]
pub async fn acknowledge_confirmation(
    State(engine): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, EngineError> {
    Ok(Json(engine.acknowledge(id)?.into()))
}

/// Cancel a session from review or OTP
#[utoipa::path(
    post,
    path = "/api/v1/confirmations/{id}/cancel",
    tag = "Confirmations",
    params(
        ("id" = Uuid, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session cancelled", body = SessionResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
        (status = 409, description = "Session can no longer be cancelled", body = ErrorResponse)
    )
)]
pub async fn cancel_confirmation(
    State(engine): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, EngineError> {
    Ok(Json(engine.cancel(id)?.into()))
}
