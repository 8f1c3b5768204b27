pub mod registry;
pub mod trade_store;
