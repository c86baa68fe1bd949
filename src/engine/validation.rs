//! Order admissibility rules
//!
//! Every rule is a pure predicate over the current draft, quote and account
//! snapshot. `validate_draft` is the single entry point: it evaluates the
//! symbol rule first and, when a symbol is present, every remaining rule,
//! collecting one error per field.
//!
//! When several quantity rules fail at once the later rule wins, in this
//! order: lot size, buying power / holding.

use crate::config::TradingRules;
use crate::models::{AccountSnapshot, OrderData, OrderDraft, OrderSide, OrderType, Quote};

use super::errors::{OrderField, ValidationError, ValidationResult};
use super::fees::{effective_price, max_quantity};

// ============================================================================
// Individual Validation Functions
// ============================================================================

/// A symbol must be selected and quoted
pub fn validate_symbol(symbol: Option<&str>, quote: Option<&Quote>) -> Result<(), ValidationError> {
    match (symbol, quote) {
        (Some(symbol), Some(quote)) if !symbol.trim().is_empty() && quote.symbol == symbol => Ok(()),
        _ => Err(ValidationError::MissingSymbol),
    }
}

/// Quantity must be a positive multiple of the lot size (same rule for buy and sell)
pub fn validate_lot_size(quantity: i64, lot_size: i64) -> Result<(), ValidationError> {
    if quantity % lot_size != 0 {
        return Err(ValidationError::NotLotMultiple { lot_size });
    }
    if quantity < lot_size {
        return Err(ValidationError::BelowMinimumLot { lot_size });
    }
    Ok(())
}

/// A buy may not exceed the quantity the balance can pay for
pub fn validate_buying_power(quantity: i64, max_quantity: i64) -> Result<(), ValidationError> {
    if quantity > max_quantity {
        return Err(ValidationError::InsufficientBuyingPower {
            requested: quantity,
            max_quantity,
        });
    }
    Ok(())
}

/// A sell may not exceed the quantity held
pub fn validate_holding(quantity: i64, held: i64) -> Result<(), ValidationError> {
    if quantity > held {
        return Err(ValidationError::ExceedsHolding {
            requested: quantity,
            held,
        });
    }
    Ok(())
}

/// Entered prices must sit inside the floor-ceiling band.
///
/// Market and auction orders are priced at execution and are exempt, as are
/// plain stop orders.
pub fn validate_price_band(
    order_type: OrderType,
    price: i64,
    quote: &Quote,
) -> Result<(), ValidationError> {
    if order_type.requires_limit_price() && !quote.within_band(price) {
        return Err(ValidationError::OutsidePriceBand {
            price,
            floor: quote.floor,
            ceiling: quote.ceiling,
        });
    }
    Ok(())
}

/// Stop and stop-limit orders need a positive stop price
pub fn validate_stop_price(
    order_type: OrderType,
    stop_price: Option<i64>,
) -> Result<(), ValidationError> {
    if order_type.requires_stop_price() && !matches!(stop_price, Some(p) if p > 0) {
        return Err(ValidationError::MissingStopPrice);
    }
    Ok(())
}

// ============================================================================
// Composite Validation Function
// ============================================================================

/// Validate a draft against the current quote and account snapshot
///
/// # Validations Performed
/// 1. Symbol selected (short-circuits everything else)
/// 2. Quantity is a lot multiple and at least one lot
/// 3. Buy quantity within buying power
/// 4. Sell quantity within holding
/// 5. LO / STOP_LIMIT price inside the floor-ceiling band
/// 6. STOP / STOP_LIMIT stop price present
pub fn validate_draft(
    draft: &OrderDraft,
    quote: Option<&Quote>,
    account: &AccountSnapshot,
    rules: &TradingRules,
) -> ValidationResult {
    let mut result = ValidationResult::new();

    let quote = match quote {
        Some(quote) if validate_symbol(draft.symbol.as_deref(), Some(quote)).is_ok() => quote,
        _ => {
            // nothing downstream is defined without a quoted symbol
            result.insert(OrderField::Symbol, ValidationError::MissingSymbol);
            return result;
        }
    };

    let price = effective_price(draft.order_type, draft.price, quote.last);
    let max_qty = max_quantity(draft.side, account.balance, account.holding, price, rules);

    if let Err(err) = validate_lot_size(draft.quantity, rules.lot_size) {
        result.insert(OrderField::Quantity, err);
    }

    let capacity = match draft.side {
        OrderSide::Buy => validate_buying_power(draft.quantity, max_qty),
        OrderSide::Sell => validate_holding(draft.quantity, account.holding),
    };
    if let Err(err) = capacity {
        result.insert(OrderField::Quantity, err);
    }

    if let Err(err) = validate_price_band(draft.order_type, draft.price, quote) {
        result.insert(OrderField::Price, err);
    }

    if let Err(err) = validate_stop_price(draft.order_type, draft.stop_price) {
        result.insert(OrderField::StopPrice, err);
    }

    result
}

/// Freeze a draft into an order, or return the field errors that block it
pub fn build_order(
    draft: &OrderDraft,
    quote: Option<&Quote>,
    account: &AccountSnapshot,
    rules: &TradingRules,
) -> Result<OrderData, ValidationResult> {
    let errors = validate_draft(draft, quote, account, rules);
    match (errors.is_empty(), draft.symbol.as_ref(), quote) {
        (true, Some(symbol), Some(quote)) => {
            let stop_price = if draft.order_type.requires_stop_price() {
                draft.stop_price
            } else {
                None
            };
            Ok(OrderData::new(
                symbol.clone(),
                draft.side,
                draft.order_type,
                draft.quantity,
                effective_price(draft.order_type, draft.price, quote.last),
                stop_price,
            ))
        }
        _ => Err(errors),
    }
}

// ============================================================================
// Tests
// ============================================================================
