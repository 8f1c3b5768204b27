use crate::persistence::trade_store::{TradeIterator, TradeStore};
use orderbook_domain::repositories::trade_log::TradeLogProvider;
use orderbook_domain::value_objects::currency_pair::CurrencyPair;
use orderbook_domain::value_objects::exchange::Exchange;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub exchange: Exchange,
    pub pair: CurrencyPair,
}

/// Lazily opened trade stores, at most one per `(exchange, pair)`.
///
/// Lookups and opens share one lock; opens are rare next to the per-pair
/// writes, which go straight to their own store.
#[derive(Debug)]
pub struct StoreRegistry {
    base_path: PathBuf,
    stores: Mutex<HashMap<StoreKey, Arc<TradeStore>>>,
}

impl StoreRegistry {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn open_or_get(
        &self,
        exchange: Exchange,
        pair: &CurrencyPair,
    ) -> Result<Arc<TradeStore>, String> {
        let key = StoreKey {
            exchange,
            pair: pair.clone(),
        };
        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(&key) {
            return Ok(store.clone());
        }
        let store = Arc::new(TradeStore::open(&self.base_path, exchange, pair)?);
        stores.insert(key, store.clone());
        Ok(store)
    }

    pub fn compact(&self, exchange: Exchange, pair: &CurrencyPair) -> Result<(), String> {
        self.open_or_get(exchange, pair)?.compact()
    }

    pub fn new_iterator(
        &self,
        exchange: Exchange,
        pair: &CurrencyPair,
    ) -> Result<TradeIterator, String> {
        self.open_or_get(exchange, pair)?.new_iterator()
    }

    pub fn open_count(&self) -> usize {
        self.stores.lock().len()
    }

    /// Closes and forgets every open store. Meant to run once at shutdown.
    pub fn close_all(&self) -> Result<(), String> {
        let mut stores = self.stores.lock();
        let mut failures = Vec::new();
        for (key, store) in stores.drain() {
            if let Err(err) = store.close() {
                tracing::error!(exchange = %key.exchange, pair = %key.pair, error = %err, "failed to close trade store");
                failures.push(err);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; "))
        }
    }
}

impl TradeLogProvider for StoreRegistry {
    type Log = TradeStore;

    fn open_or_get(
        &self,
        exchange: Exchange,
        pair: &CurrencyPair,
    ) -> Result<Arc<TradeStore>, String> {
        StoreRegistry::open_or_get(self, exchange, pair)
    }
}
