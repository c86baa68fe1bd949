//! Order Entry Engine Module
//!
//! - `errors` - Error taxonomy (validation, flow, submission)
//! - `fees` - Fee, lot-size and price-tick arithmetic
//! - `validation` - Admissibility rules over a draft
//! - `composer` - Order form state and derived values
//! - `confirmation` - Confirmation state machine
//! - `entry` - Facade owning collaborators and live sessions

pub mod composer;
pub mod confirmation;
pub mod entry;
pub mod errors;
pub mod fees;
pub mod validation;

// Re-export commonly used types for convenience
pub use composer::{DerivedValues, OrderComposer, QuickQuantity};
pub use confirmation::{ConfirmationFlow, ConfirmationStep, SubmissionTicket};
pub use entry::{OrderEntryEngine, OrderPreview};
pub use errors::{
    EngineError, FlowAction, FlowError, OrderField, StepKind, SubmissionError, ValidationError,
    ValidationResult,
};
pub use fees::OrderSummary;
pub use validation::{build_order, validate_draft};
