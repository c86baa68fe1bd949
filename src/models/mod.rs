pub mod account;
pub mod order;
pub mod quote;

pub use account::AccountSnapshot;
pub use order::{OrderAck, OrderData, OrderDraft, OrderSide, OrderType, QuickFill};
pub use quote::{Quote, SymbolInfo};
