use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Order side: Buy or Sell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    #[default]
    Buy,
    Sell,
}

/// Order types accepted by the order form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
pub enum OrderType {
    /// Limit order
    #[default]
    #[serde(rename = "LO")]
    Limit,
    /// Market order, priced at execution
    #[serde(rename = "MP")]
    Market,
    /// At-the-open auction order
    #[serde(rename = "ATO")]
    AtOpen,
    /// At-the-close auction order
    #[serde(rename = "ATC")]
    AtClose,
    /// Stop order, triggered at the stop price
    #[serde(rename = "STOP")]
    Stop,
    /// Stop order that rests as a limit order once triggered
    #[serde(rename = "STOP_LIMIT")]
    StopLimit,
}

impl OrderType {
    pub const ALL: [OrderType; 6] = [
        OrderType::Limit,
        OrderType::Market,
        OrderType::AtOpen,
        OrderType::AtClose,
        OrderType::Stop,
        OrderType::StopLimit,
    ];

    /// Exchange code for the order type
    pub fn code(&self) -> &'static str {
        match self {
            OrderType::Limit => "LO",
            OrderType::Market => "MP",
            OrderType::AtOpen => "ATO",
            OrderType::AtClose => "ATC",
            OrderType::Stop => "STOP",
            OrderType::StopLimit => "STOP_LIMIT",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            OrderType::Limit => "Limit order",
            OrderType::Market => "Market order",
            OrderType::AtOpen => "At-the-open order",
            OrderType::AtClose => "At-the-close order",
            OrderType::Stop => "Stop order",
            OrderType::StopLimit => "Stop-limit order",
        }
    }

    /// Market and auction orders take the last quoted price instead of a user price
    pub fn is_market_priced(&self) -> bool {
        matches!(self, OrderType::Market | OrderType::AtOpen | OrderType::AtClose)
    }

    /// Order types whose entered price must sit inside the floor-ceiling band
    pub fn requires_limit_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn requires_stop_price(&self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }
}

/// The order being composed in the order form.
///
/// Prices and quantities are whole currency units and whole shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderDraft {
    pub symbol: Option<String>,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: i64,
    /// Limit price entered by the user
    pub price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<i64>,
}

impl OrderDraft {
    /// Create an empty draft: buy, LO, no symbol selected
    pub fn new(default_quantity: i64) -> Self {
        Self {
            symbol: None,
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            quantity: default_quantity,
            price: 0,
            stop_price: None,
        }
    }
}

impl From<&OrderData> for OrderDraft {
    fn from(order: &OrderData) -> Self {
        Self {
            symbol: Some(order.symbol.clone()),
            side: order.side,
            order_type: order.order_type,
            quantity: order.quantity,
            price: order.price,
            stop_price: order.stop_price,
        }
    }
}

/// A validated, frozen order.
///
/// Only produced by a successful validation; fields are read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderData {
    symbol: String,
    side: OrderSide,
    order_type: OrderType,
    quantity: i64,
    /// Resolved price: last quote for market-priced types, limit price otherwise
    price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_price: Option<i64>,
}

impl OrderData {
    pub(crate) fn new(
        symbol: String,
        side: OrderSide,
        order_type: OrderType,
        quantity: i64,
        price: i64,
        stop_price: Option<i64>,
    ) -> Self {
        Self {
            symbol,
            side,
            order_type,
            quantity,
            price,
            stop_price,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn price(&self) -> i64 {
        self.price
    }

    pub fn stop_price(&self) -> Option<i64> {
        self.stop_price
    }
}

/// Acknowledgement returned by the submission service once an order is accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderAck {
    pub order_id: Uuid,
    pub order_number: String,
    pub accepted_at: DateTime<Utc>,
}

/// Quick-quantity shortcuts offered below the quantity input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum QuickFill {
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "25")]
    TwentyFive,
    #[serde(rename = "50")]
    Fifty,
    #[serde(rename = "100")]
    Full,
}

impl QuickFill {
    pub const ALL: [QuickFill; 4] = [
        QuickFill::Ten,
        QuickFill::TwentyFive,
        QuickFill::Fifty,
        QuickFill::Full,
    ];

    pub fn percent(&self) -> i64 {
        match self {
            QuickFill::Ten => 10,
            QuickFill::TwentyFive => 25,
            QuickFill::Fifty => 50,
            QuickFill::Full => 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_defaults() {
        let draft = OrderDraft::new(100);

        assert_eq!(draft.symbol, None);
        assert_eq!(draft.side, OrderSide::Buy);
        assert_eq!(draft.order_type, OrderType::Limit);
        assert_eq!(draft.quantity, 100);
        assert_eq!(draft.stop_price, None);
    }

    #[test]
    fn test_order_type_classification() {
        let market_priced: Vec<_> = OrderType::ALL
            .iter()
            .filter(|t| t.is_market_priced())
            .map(|t| t.code())
            .collect();
        assert_eq!(market_priced, vec!["MP", "ATO", "ATC"]);

        assert!(OrderType::Limit.requires_limit_price());
        assert!(OrderType::StopLimit.requires_limit_price());
        assert!(!OrderType::Stop.requires_limit_price());

        assert!(OrderType::Stop.requires_stop_price());
        assert!(OrderType::StopLimit.requires_stop_price());
        assert!(!OrderType::Limit.requires_stop_price());
    }

    #[test]
    fn test_order_type_wire_codes() {
        for order_type in OrderType::ALL {
            let json = serde_json::to_string(&order_type).unwrap();
            assert_eq!(json, format!("\"{}\"", order_type.code()));
        }

        let parsed: OrderType = serde_json::from_str("\"STOP_LIMIT\"").unwrap();
        assert_eq!(parsed, OrderType::StopLimit);
    }

    #[test]
    fn test_draft_from_order_data() {
        let order = OrderData::new(
            "VNM".to_string(),
            OrderSide::Sell,
            OrderType::Stop,
            300,
            85200,
            Some(80900),
        );

        let draft = OrderDraft::from(&order);
        assert_eq!(draft.symbol.as_deref(), Some("VNM"));
        assert_eq!(draft.side, OrderSide::Sell);
        assert_eq!(draft.quantity, 300);
        assert_eq!(draft.stop_price, Some(80900));
    }

    #[test]
    fn test_quick_fill_percent() {
        let percents: Vec<i64> = QuickFill::ALL.iter().map(QuickFill::percent).collect();
        assert_eq!(percents, vec![10, 25, 50, 100]);

        let parsed: QuickFill = serde_json::from_str("\"25\"").unwrap();
        assert_eq!(parsed, QuickFill::TwentyFive);
    }
}
