// Library Crate Root
// lib.rs

pub mod api;
pub mod config;
pub mod engine;
pub mod models;
pub mod services;

// pub use = re-export at crate root
pub use api::{create_router, AppState};
pub use config::{EngineConfig, TradingRules};
pub use engine::{ConfirmationFlow, EngineError, OrderComposer, OrderEntryEngine};
pub use models::{OrderData, OrderDraft, OrderSide, OrderType, Quote};
