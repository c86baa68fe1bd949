use utoipa::OpenApi;

use crate::api::handlers;
use crate::api::responses::*;
use crate::config::TradingRules;
use crate::engine::{
    DerivedValues, OrderField, OrderPreview, OrderSummary, QuickQuantity, StepKind,
};
use crate::models::{
    AccountSnapshot, OrderAck, OrderData, OrderDraft, OrderSide, OrderType, QuickFill, Quote,
    SymbolInfo,
};

/// OpenAPI specification
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Order Entry API",
        version = "0.1.0",
        description = "Order validation and OTP confirmation for HOSE equities",
        license(
            name = "MIT"
        )
    ),
    paths(
        handlers::health_check,
        handlers::search_symbols,
        handlers::get_quote,
        handlers::list_order_types,
        handlers::get_trading_rules,
        handlers::preview_order,
        handlers::open_confirmation,
        handlers::get_confirmation,
        handlers::continue_confirmation,
        handlers::back_confirmation,
        handlers::enter_otp,
        handlers::submit_confirmation,
        handlers::acknowledge_confirmation,
        handlers::cancel_confirmation,
    ),
    components(
        schemas(
            OrderSide,
            OrderType,
            OrderDraft,
            OrderData,
            OrderAck,
            QuickFill,
            Quote,
            SymbolInfo,
            AccountSnapshot,
            TradingRules,
            DerivedValues,
            QuickQuantity,
            OrderPreview,
            OrderSummary,
            OrderField,
            StepKind,
            OtpRequest,
            SessionResponse,
            OrderTypeResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Market", description = "Symbol search and quotes"),
        (name = "Orders", description = "Order composition and validation"),
        (name = "Confirmations", description = "Review, OTP and submission of validated orders"),
    )
)]
pub struct ApiDoc;
