//! Order composer
//!
//! Owns the order-in-progress and everything derived from it. The quote is
//! read once per symbol selection and the balance once per composer, so
//! derived values and validation are pure functions of the draft and those
//! two snapshots.

use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::config::TradingRules;
use crate::models::{
    AccountSnapshot, OrderData, OrderDraft, OrderSide, OrderType, QuickFill, Quote,
};
use crate::services::{AccountService, QuoteSource};

use super::errors::{EngineError, ValidationResult};
use super::fees::{
    calculate_fee, effective_price, max_quantity, order_value, price_tick, quick_quantity,
    total_cost,
};
use super::validation;

/// Values recomputed from the draft on every edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DerivedValues {
    pub effective_price: i64,
    pub order_value: i64,
    pub fee: i64,
    pub total_cost: i64,
    pub max_quantity: i64,
}

/// One quick-fill shortcut and the quantity it would set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct QuickQuantity {
    pub percent: QuickFill,
    pub quantity: i64,
}

pub struct OrderComposer {
    rules: TradingRules,
    quotes: Arc<dyn QuoteSource>,
    accounts: Arc<dyn AccountService>,
    draft: OrderDraft,
    quote: Option<Quote>,
    account: AccountSnapshot,
}

impl OrderComposer {
    /// Open an empty order form; reads the cash balance once
    pub fn open(
        rules: TradingRules,
        quotes: Arc<dyn QuoteSource>,
        accounts: Arc<dyn AccountService>,
    ) -> Self {
        let account = AccountSnapshot::new(accounts.balance(), 0);
        let draft = OrderDraft::new(rules.default_quantity);
        Self {
            rules,
            quotes,
            accounts,
            draft,
            quote: None,
            account,
        }
    }

    /// Load a complete draft, fetching the quote for its symbol.
    ///
    /// Entered prices are kept as given; unlike [`select_symbol`](Self::select_symbol)
    /// nothing is reset to quote-derived defaults.
    pub fn load_draft(&mut self, draft: OrderDraft) -> Result<(), EngineError> {
        let symbol = draft
            .symbol
            .as_deref()
            .map(str::trim)
            .filter(|symbol| !symbol.is_empty())
            .map(str::to_string);

        match symbol {
            Some(symbol) => {
                let quote = self.fetch_quote(&symbol)?;
                self.account.holding = self.accounts.holding(&quote.symbol);
                self.draft = OrderDraft {
                    symbol: Some(quote.symbol.clone()),
                    ..draft
                };
                self.quote = Some(quote);
            }
            None => {
                self.draft = OrderDraft {
                    symbol: None,
                    ..draft
                };
                self.quote = None;
                self.account.holding = 0;
            }
        }
        Ok(())
    }

    /// Switch to a symbol: price resets to the last price, stop price to 95% of it
    pub fn select_symbol(&mut self, symbol: &str) -> Result<(), EngineError> {
        let quote = self.fetch_quote(symbol.trim())?;
        self.account.holding = self.accounts.holding(&quote.symbol);

        self.draft.symbol = Some(quote.symbol.clone());
        self.draft.price = quote.last;
        self.draft.stop_price = Some(default_stop_price(quote.last));

        tracing::debug!(
            symbol = %quote.symbol,
            last = quote.last,
            holding = self.account.holding,
            "Symbol selected"
        );
        self.quote = Some(quote);
        Ok(())
    }

    fn fetch_quote(&self, symbol: &str) -> Result<Quote, EngineError> {
        self.quotes
            .get_quote(symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))
    }

    pub fn set_side(&mut self, side: OrderSide) {
        self.draft.side = side;
    }

    pub fn set_order_type(&mut self, order_type: OrderType) {
        self.draft.order_type = order_type;
    }

    pub fn set_quantity(&mut self, quantity: i64) {
        self.draft.quantity = quantity;
    }

    pub fn set_price(&mut self, price: i64) {
        self.draft.price = price;
    }

    pub fn set_stop_price(&mut self, stop_price: Option<i64>) {
        self.draft.stop_price = stop_price;
    }

    /// Step the quantity by whole lots, never below one lot and, when the
    /// side has any capacity, never above it
    pub fn adjust_quantity(&mut self, delta_lots: i64) {
        let lot = self.rules.lot_size;
        let mut quantity = self
            .draft
            .quantity
            .saturating_add(delta_lots.saturating_mul(lot))
            .max(lot);

        let max = self.max_quantity();
        if max > 0 {
            quantity = quantity.min(max);
        }
        self.draft.quantity = quantity;
    }

    /// Step the limit price by price ticks, clamped into the band.
    /// No-op until a symbol is selected.
    pub fn adjust_price(&mut self, delta_ticks: i64) {
        let Some(quote) = &self.quote else {
            return;
        };
        let tick = price_tick(quote.last, &self.rules);
        self.draft.price = self
            .draft
            .price
            .saturating_add(delta_ticks.saturating_mul(tick))
            .clamp(quote.floor, quote.ceiling);
    }

    pub fn apply_quick_fill(&mut self, fill: QuickFill) {
        self.draft.quantity = quick_quantity(self.max_quantity(), fill, self.rules.lot_size);
    }

    pub fn quick_quantities(&self) -> Vec<QuickQuantity> {
        let max = self.max_quantity();
        QuickFill::ALL
            .iter()
            .map(|&fill| QuickQuantity {
                percent: fill,
                quantity: quick_quantity(max, fill, self.rules.lot_size),
            })
            .collect()
    }

    fn effective_price(&self) -> i64 {
        let last = self.quote.as_ref().map_or(0, |quote| quote.last);
        effective_price(self.draft.order_type, self.draft.price, last)
    }

    fn max_quantity(&self) -> i64 {
        max_quantity(
            self.draft.side,
            self.account.balance,
            self.account.holding,
            self.effective_price(),
            &self.rules,
        )
    }

    pub fn derived(&self) -> DerivedValues {
        let price = self.effective_price();
        let value = order_value(self.draft.quantity, price);
        let fee = calculate_fee(value, self.rules.fee_rate);
        DerivedValues {
            effective_price: price,
            order_value: value,
            fee,
            total_cost: total_cost(self.draft.side, value, fee),
            max_quantity: self.max_quantity(),
        }
    }

    /// Field-keyed errors for the current draft; empty means admissible
    pub fn validate(&self) -> ValidationResult {
        let result = validation::validate_draft(
            &self.draft,
            self.quote.as_ref(),
            &self.account,
            &self.rules,
        );
        if !result.is_empty() {
            tracing::debug!(errors = %result, "Draft not admissible");
        }
        result
    }

    /// Freeze the draft into an order once it validates
    pub fn build_order(&self) -> Result<OrderData, ValidationResult> {
        validation::build_order(&self.draft, self.quote.as_ref(), &self.account, &self.rules)
    }

    pub fn draft(&self) -> &OrderDraft {
        &self.draft
    }

    pub fn quote(&self) -> Option<&Quote> {
        self.quote.as_ref()
    }

    pub fn account(&self) -> &AccountSnapshot {
        &self.account
    }

    pub fn rules(&self) -> &TradingRules {
        &self.rules
    }
}

/// 95% of the last price, rounded half up
fn default_stop_price(last: i64) -> i64 {
    last.saturating_mul(95).saturating_add(50) / 100
}
