pub mod history_source;
pub mod trade_log;
