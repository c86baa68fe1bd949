use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Price snapshot for one symbol, read once per symbol selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Quote {
    pub symbol: String,
    /// Last traded price
    pub last: i64,
    pub ceiling: i64,
    pub floor: i64,
    /// Reference (previous close) price
    pub reference: i64,
    pub volume: u64,
}

impl Quote {
    /// floor <= reference <= ceiling
    pub fn is_consistent(&self) -> bool {
        self.floor <= self.reference && self.reference <= self.ceiling
    }

    /// Check whether a price sits inside the floor-ceiling band (inclusive)
    pub fn within_band(&self, price: i64) -> bool {
        price >= self.floor && price <= self.ceiling
    }
}

/// Listed symbol metadata used by symbol search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SymbolInfo {
    pub symbol: String,
    pub name: String,
}

impl SymbolInfo {
    /// Case-insensitive substring match on symbol or company name
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.symbol.to_lowercase().contains(&query) || self.name.to_lowercase().contains(&query)
    }
}
