use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account figures the composer checks an order against.
///
/// Read once per composition session; never mutated by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct AccountSnapshot {
    /// Available cash balance
    pub balance: i64,
    /// Quantity held of the selected symbol
    pub holding: i64,
}

impl AccountSnapshot {
    pub fn new(balance: i64, holding: i64) -> Self {
        Self { balance, holding }
    }
}
