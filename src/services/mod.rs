//! Collaborators the order entry engine talks to
//!
//! Quote and account reads are synchronous snapshot reads. Submission is the
//! only asynchronous call and is made at most once per confirmation session.

pub mod account;
pub mod market;
pub mod submission;

use async_trait::async_trait;

use crate::engine::errors::SubmissionError;
use crate::models::{OrderAck, OrderData, Quote, SymbolInfo};

pub use account::InMemoryAccountService;
pub use market::InMemoryQuoteSource;
pub use submission::SimulatedSubmissionService;

/// Quote source - price snapshots and symbol lookup
pub trait QuoteSource: Send + Sync {
    /// Current quote for a symbol, `None` when the symbol is not listed
    fn get_quote(&self, symbol: &str) -> Option<Quote>;

    /// Listed symbols whose code or company name contains `query` (case-insensitive)
    fn search(&self, query: &str) -> Vec<SymbolInfo>;

    /// Every listed symbol
    fn list(&self) -> Vec<SymbolInfo> {
        self.search("")
    }
}

/// Account service - cash balance and holdings
pub trait AccountService: Send + Sync {
    /// Available cash balance
    fn balance(&self) -> i64;

    /// Quantity held of a symbol
    fn holding(&self, symbol: &str) -> i64;
}

/// Submission service - sends a frozen order together with its OTP
///
/// OTP verification happens behind this call; a wrong code comes back as
/// `SubmissionError::Rejected`.
#[async_trait]
pub trait SubmissionService: Send + Sync {
    async fn submit(&self, order: &OrderData, otp: &str) -> Result<OrderAck, SubmissionError>;
}
