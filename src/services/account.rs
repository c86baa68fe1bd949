use dashmap::DashMap;
use parking_lot::RwLock;

use super::AccountService;

/// Single in-memory cash account
///
/// Symbols without an explicit position report `default_holding`.
pub struct InMemoryAccountService {
    balance: RwLock<i64>,
    holdings: DashMap<String, i64>,
    default_holding: i64,
}

impl InMemoryAccountService {
    pub fn new(balance: i64, default_holding: i64) -> Self {
        Self {
            balance: RwLock::new(balance),
            holdings: DashMap::new(),
            default_holding,
        }
    }

    pub fn set_balance(&self, balance: i64) {
        *self.balance.write() = balance;
    }

    pub fn set_holding(&self, symbol: &str, quantity: i64) {
        self.holdings.insert(symbol.to_uppercase(), quantity);
    }
}

impl AccountService for InMemoryAccountService {
    fn balance(&self) -> i64 {
        *self.balance.read()
    }

    fn holding(&self, symbol: &str) -> i64 {
        self.holdings
            .get(&symbol.to_uppercase())
            .map(|quantity| *quantity)
            .unwrap_or(self.default_holding)
    }
}
