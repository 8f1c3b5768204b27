use crate::services::watermarks::Watermarks;
use crate::value_objects::currency_pair::CurrencyPair;
use crate::value_objects::exchange::Exchange;
use crate::value_objects::trade::Trade;
use std::sync::Arc;

/// Forward-only, single-pass reader over stored trades in ascending id order.
pub trait TradeCursor {
    /// Moves to the next trade; `false` once the range is exhausted or a
    /// fault occurred.
    fn advance(&mut self) -> bool;

    fn current(&self) -> Result<Trade, String>;

    /// Terminal fault hit while advancing, distinct from a clean end.
    fn error(&self) -> Option<&str>;
}

/// Durable, id-ordered trade log of a single `(exchange, pair)`.
pub trait TradeLog: Send + Sync {
    fn watermarks(&self) -> Watermarks;

    /// Fails once the log is closed.
    fn new_cursor(&self) -> Result<Box<dyn TradeCursor>, String>;

    /// Persists the batch and the merged watermarks as one atomic unit.
    fn write_trades(&self, trades: &[Trade]) -> Result<(), String>;

    /// Persists `history_synced = highest_timestamp`.
    fn mark_history_synced(&self) -> Result<(), String>;

    fn compact(&self) -> Result<(), String>;
}

/// Hands out one shared log per `(exchange, pair)`, opening it on first use.
pub trait TradeLogProvider: Send + Sync {
    type Log: TradeLog + 'static;

    fn open_or_get(&self, exchange: Exchange, pair: &CurrencyPair)
        -> Result<Arc<Self::Log>, String>;
}
