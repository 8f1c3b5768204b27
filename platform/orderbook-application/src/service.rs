use orderbook_domain::repositories::trade_log::TradeLogProvider;
use orderbook_domain::value_objects::currency_pair::CurrencyPair;
use orderbook_domain::value_objects::exchange::Exchange;
use std::sync::Arc;

pub const READ_NOT_AVAILABLE: &str = "live order book streaming is not yet available";

/// Read side exposed to remote callers.
pub struct OrderBookService<P: TradeLogProvider> {
    provider: Arc<P>,
}

impl<P: TradeLogProvider> OrderBookService<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Streaming read of `(exchange, pair)`. The store is opened so unknown
    /// or unreadable pairs fail early; streaming itself is not implemented.
    pub fn read(&self, exchange: Exchange, pair: &CurrencyPair) -> Result<(), String> {
        self.provider.open_or_get(exchange, pair)?;
        Err(READ_NOT_AVAILABLE.to_string())
    }
}
