//! Fee, lot-size and price-tick arithmetic shared by the composer and the
//! confirmation flow. All amounts are whole currency units.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::TradingRules;
use crate::models::{OrderData, OrderSide, OrderType, QuickFill};

/// Price an order is valued at: the last quote for market and auction
/// orders, the entered limit price otherwise
pub fn effective_price(order_type: OrderType, limit_price: i64, last_price: i64) -> i64 {
    if order_type.is_market_priced() {
        last_price
    } else {
        limit_price
    }
}

pub fn order_value(quantity: i64, price: i64) -> i64 {
    quantity.saturating_mul(price)
}

/// Flat fee on the order value, rounded to the nearest unit (halves away from zero)
pub fn calculate_fee(order_value: i64, fee_rate: Decimal) -> i64 {
    match Decimal::from(order_value).checked_mul(fee_rate) {
        Some(fee) => to_whole_units(fee.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)),
        None if (order_value < 0) != fee_rate.is_sign_negative() => i64::MIN,
        None => i64::MAX,
    }
}

/// Cash out for a buy (value plus fee), cash in for a sell (value minus fee)
pub fn total_cost(side: OrderSide, order_value: i64, fee: i64) -> i64 {
    match side {
        OrderSide::Buy => order_value.saturating_add(fee),
        OrderSide::Sell => order_value.saturating_sub(fee),
    }
}

/// Largest lot-multiple quantity the balance can pay for, fee included
pub fn max_buy_quantity(balance: i64, price: i64, fee_rate: Decimal, lot_size: i64) -> i64 {
    if price <= 0 {
        return 0;
    }
    let Some(cost_per_share) = Decimal::from(price).checked_mul(Decimal::ONE + fee_rate) else {
        return 0;
    };
    if cost_per_share <= Decimal::ZERO {
        return 0;
    }
    let affordable = to_whole_units((Decimal::from(balance) / cost_per_share).floor());
    adjust_to_lot(affordable, lot_size)
}

/// Quantity ceiling for the side: buying power for buys, holding for sells
pub fn max_quantity(
    side: OrderSide,
    balance: i64,
    holding: i64,
    price: i64,
    rules: &TradingRules,
) -> i64 {
    match side {
        OrderSide::Buy => max_buy_quantity(balance, price, rules.fee_rate, rules.lot_size),
        // fees come out of the proceeds, so no headroom is needed
        OrderSide::Sell => holding,
    }
}

/// Round a quantity down to a lot multiple; never negative
pub fn adjust_to_lot(quantity: i64, lot_size: i64) -> i64 {
    if lot_size <= 0 || quantity <= 0 {
        return 0;
    }
    (quantity / lot_size) * lot_size
}

/// Proposed quantity for a quick-fill shortcut, at least one lot
pub fn quick_quantity(max_quantity: i64, fill: QuickFill, lot_size: i64) -> i64 {
    let share = max_quantity.saturating_mul(fill.percent()) / 100;
    adjust_to_lot(share, lot_size).max(lot_size)
}

/// Price step used by the +/- price buttons
pub fn price_tick(last_price: i64, rules: &TradingRules) -> i64 {
    if last_price >= rules.tick_threshold {
        rules.tick_large
    } else {
        rules.tick_small
    }
}

fn to_whole_units(value: Decimal) -> i64 {
    value.to_i64().unwrap_or(if value.is_sign_negative() { i64::MIN } else { i64::MAX })
}

/// Money figures shown alongside an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderSummary {
    pub order_value: i64,
    pub fee: i64,
    pub total_cost: i64,
}

impl OrderSummary {
    pub fn compute(side: OrderSide, quantity: i64, price: i64, fee_rate: Decimal) -> Self {
        let value = order_value(quantity, price);
        let fee = calculate_fee(value, fee_rate);
        Self {
            order_value: value,
            fee,
            total_cost: total_cost(side, value, fee),
        }
    }

    /// Summary of a frozen order; never reads a live quote
    pub fn for_order(order: &OrderData, fee_rate: Decimal) -> Self {
        Self::compute(order.side(), order.quantity(), order.price(), fee_rate)
    }
}
