use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::engine::{ConfirmationFlow, OrderSummary, StepKind, ValidationResult};
use crate::models::{OrderAck, OrderData, OrderType};

/// OTP typed into a confirmation session
#[derive(Debug, Deserialize, ToSchema)]
pub struct OtpRequest {
    /// Non-digits are dropped, extra digits are cut
    #[schema(example = "123456")]
    pub code: String,
}

/// Confirmation session as shown to the client
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub step: StepKind,
    pub order: OrderData,
    /// Computed once from the frozen order
    pub summary: OrderSummary,
    /// Digits entered so far while in the OTP step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_digits: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack: Option<OrderAck>,
    /// Submission failure, shown verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub settled: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl From<ConfirmationFlow> for SessionResponse {
    fn from(flow: ConfirmationFlow) -> Self {
        Self {
            session_id: flow.id(),
            step: flow.step_kind(),
            order: flow.order().clone(),
            summary: *flow.summary(),
            otp_digits: flow.otp_code().map(str::len),
            otp_error: flow.otp_error().map(ToString::to_string),
            ack: flow.ack().cloned(),
            error: flow.submission_error().map(ToString::to_string),
            settled: flow.is_settled(),
            created_at: flow.created_at(),
            last_activity: flow.last_activity(),
        }
    }
}

/// Entry in the order type catalogue
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderTypeResponse {
    pub order_type: OrderType,
    pub description: String,
    pub market_priced: bool,
    pub requires_limit_price: bool,
    pub requires_stop_price: bool,
}

impl From<OrderType> for OrderTypeResponse {
    fn from(order_type: OrderType) -> Self {
        Self {
            order_type,
            description: order_type.description().to_string(),
            market_priced: order_type.is_market_priced(),
            requires_limit_price: order_type.requires_limit_price(),
            requires_stop_price: order_type.requires_stop_price(),
        }
    }
}

/// Error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// Field-keyed validation errors, when the request was refused for them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<ValidationResult>,
}
