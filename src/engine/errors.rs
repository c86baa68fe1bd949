//! Error types for order entry
//!
//! Validation failures are field-scoped values, never raised as panics or
//! early returns from the composer. Flow errors describe a rejected
//! confirmation transition; the session stays where it was. Submission
//! errors are terminal for a confirmation session.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Order form fields that can carry a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum OrderField {
    Symbol,
    Quantity,
    Price,
    StopPrice,
}

/// Reason a single field is not admissible
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("symbol is required")]
    MissingSymbol,

    #[error("minimum quantity is {lot_size}")]
    BelowMinimumLot { lot_size: i64 },

    #[error("not a multiple of {lot_size}")]
    NotLotMultiple { lot_size: i64 },

    #[error("insufficient buying power")]
    InsufficientBuyingPower { requested: i64, max_quantity: i64 },

    #[error("exceeds holding")]
    ExceedsHolding { requested: i64, held: i64 },

    #[error("outside floor-ceiling band")]
    OutsidePriceBand { price: i64, floor: i64, ceiling: i64 },

    #[error("stop price is required")]
    MissingStopPrice,
}

impl Serialize for ValidationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Field-keyed validation outcome; empty means the order is admissible
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct ValidationResult(BTreeMap<OrderField, ValidationError>);

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error, replacing any earlier error for the same field
    pub fn insert(&mut self, field: OrderField, error: ValidationError) {
        self.0.insert(field, error);
    }

    pub fn get(&self, field: OrderField) -> Option<&ValidationError> {
        self.0.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = OrderField> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (OrderField, &ValidationError)> {
        self.0.iter().map(|(field, error)| (*field, error))
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, error) in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {}", field, error)?;
            first = false;
        }
        Ok(())
    }
}

/// Failure reported for a submission; shown to the user verbatim
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SubmissionError {
    /// The service refused the order (bad OTP, exchange reject, ...)
    #[error("Order rejected: {0}")]
    Rejected(String),

    /// No answer within the configured bound
    #[error("Submission timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("Submission service unavailable: {0}")]
    Unavailable(String),
}

/// Confirmation step names, used when reporting rejected transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Review,
    Otp,
    Processing,
    Success,
    Error,
    Cancelled,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::Review => "review",
            StepKind::Otp => "otp",
            StepKind::Processing => "processing",
            StepKind::Success => "success",
            StepKind::Error => "error",
            StepKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// User or system actions on a confirmation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    Continue,
    Back,
    EnterOtp,
    Submit,
    Resolve,
    Acknowledge,
    Cancel,
}

impl fmt::Display for FlowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowAction::Continue => "continue",
            FlowAction::Back => "back",
            FlowAction::EnterOtp => "enter_otp",
            FlowAction::Submit => "submit",
            FlowAction::Resolve => "resolve",
            FlowAction::Acknowledge => "acknowledge",
            FlowAction::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

/// A confirmation transition that was refused; the session did not move
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("Cannot {action} from the {step} step")]
    InvalidTransition { step: StepKind, action: FlowAction },

    #[error("OTP must be exactly {expected} digits")]
    OtpFormat { expected: usize },

    #[error("A submission is already in flight")]
    SubmissionInFlight,
}

/// Errors surfaced by the order entry facade
///
/// # Error Categories
///
/// - **Validation Errors**: `Rejected`, `StaleOrder`, `UnknownSymbol`
/// - **State Errors**: `SessionNotFound`, `Flow`
/// - **Internal Errors**: `SubmissionLost`
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Confirmation session not found: {0}")]
    SessionNotFound(Uuid),

    /// The draft did not pass validation
    #[error("Order rejected: {0}")]
    Rejected(ValidationResult),

    /// The frozen order no longer passes validation against fresh snapshots
    #[error("Order is stale: {0}")]
    StaleOrder(ValidationResult),

    #[error(transparent)]
    Flow(#[from] FlowError),

    /// The background submission task ended without reporting an outcome
    #[error("Submission for session {0} was lost")]
    SubmissionLost(Uuid),
}

impl EngineError {
    /// Returns true if this is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            EngineError::Rejected(_) | EngineError::StaleOrder(_) | EngineError::UnknownSymbol(_)
        )
    }

    /// Returns true if this is a state error (session missing or wrong step)
    pub fn is_state_error(&self) -> bool {
        matches!(self, EngineError::SessionNotFound(_) | EngineError::Flow(_))
    }

    /// Field errors attached to the error, if any
    pub fn field_errors(&self) -> Option<&ValidationResult> {
        match self {
            EngineError::Rejected(result) | EngineError::StaleOrder(result) => Some(result),
            _ => None,
        }
    }
}
