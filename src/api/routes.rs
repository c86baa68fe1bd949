use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::engine::OrderEntryEngine;

use super::handlers::*;
use super::openapi::ApiDoc;

/// Create the API router with Swagger UI
pub fn create_router(engine: Arc<OrderEntryEngine>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health_check))
        // Market data
        .route("/api/v1/symbols", get(search_symbols))
        .route("/api/v1/quotes/:symbol", get(get_quote))
        // Order composition
        .route("/api/v1/order-types", get(list_order_types))
        .route("/api/v1/rules", get(get_trading_rules))
        .route("/api/v1/orders/preview", post(preview_order))
        // Confirmation sessions
        .route("/api/v1/confirmations", post(open_confirmation))
        .route("/api/v1/confirmations/:id", get(get_confirmation))
        .route("/api/v1/confirmations/:id/continue", post(continue_confirmation))
        .route("/api/v1/confirmations/:id/back", post(back_confirmation))
        .route("/api/v1/confirmations/:id/otp", post(enter_otp))
        .route("/api/v1/confirmations/:id/submit", post(submit_confirmation))
        .route("/api/v1/confirmations/:id/acknowledge", post(acknowledge_confirmation))
        .route("/api/v1/confirmations/:id/cancel", post(cancel_confirmation))
        .with_state(engine)
}
