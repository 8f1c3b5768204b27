use orderbook_domain::repositories::trade_log::{TradeCursor, TradeLog};
use orderbook_domain::services::watermarks::Watermarks;
use orderbook_domain::value_objects::currency_pair::CurrencyPair;
use orderbook_domain::value_objects::exchange::Exchange;
use orderbook_domain::value_objects::trade::Trade;
use parking_lot::{MappedRwLockReadGuard, Mutex, RwLock, RwLockReadGuard};
use std::path::{Path, PathBuf};
use std::time::Instant;

const HIGHEST_TIMESTAMP_KEY: &[u8] = b"__highest_timestamp__";
const LOWEST_TIMESTAMP_KEY: &[u8] = b"__lowest_timestamp__";
const HISTORY_SYNCED_KEY: &[u8] = b"__history_synced__";

// Trade keys are ASCII digits only, so everything below "_" is trade data and
// the reserved "__*__" keys sort after it.
const TRADE_KEY_LIMIT: &[u8] = b"_";

/// Directory name of a store: `<exchange>-<base>_<quote>`.
pub fn store_id(exchange: Exchange, pair: &CurrencyPair) -> String {
    format!("{}-{}", exchange.as_str(), pair.concat("_"))
}

/// Zero-padded to the width of `u64::MAX` so lexical order equals numeric order.
pub fn trade_key(id: u64) -> Vec<u8> {
    format!("{id:020}").into_bytes()
}

/// On-disk trade log of one `(exchange, pair)` backed by a `sled` tree.
///
/// `close()` drops the engine handle even while other `Arc`s to the store
/// are alive, so the directory can be reopened. Open iterators keep their
/// own reference to the engine until they are dropped.
pub struct TradeStore {
    exchange: Exchange,
    pair: CurrencyPair,
    path: PathBuf,
    db: RwLock<Option<sled::Db>>,
    watermarks: Mutex<Watermarks>,
}

impl std::fmt::Debug for TradeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeStore")
            .field("exchange", &self.exchange)
            .field("pair", &self.pair)
            .field("path", &self.path)
            .field("watermarks", &*self.watermarks.lock())
            .finish()
    }
}

impl TradeStore {
    /// Opens or creates the store under `base_path` and loads its watermarks.
    pub fn open(base_path: &Path, exchange: Exchange, pair: &CurrencyPair) -> Result<Self, String> {
        std::fs::create_dir_all(base_path).map_err(|err| {
            format!(
                "failed to create database directory {}: {err}",
                base_path.display()
            )
        })?;
        let path = base_path.join(store_id(exchange, pair));
        let db = sled::open(&path)
            .map_err(|err| format!("failed to open trade store {}: {err}", path.display()))?;

        let watermarks = Watermarks {
            highest_timestamp: read_i64(&db, HIGHEST_TIMESTAMP_KEY)?,
            lowest_timestamp: read_i64(&db, LOWEST_TIMESTAMP_KEY)?,
            history_synced: read_i64(&db, HISTORY_SYNCED_KEY)?,
        };

        tracing::info!(
            exchange = %exchange,
            pair = %pair,
            path = %path.display(),
            highest_timestamp = watermarks.highest_timestamp,
            lowest_timestamp = watermarks.lowest_timestamp,
            history_synced = watermarks.history_synced,
            "trade store opened"
        );
        metrics::counter!("orderbook.store.open_total").increment(1);

        Ok(Self {
            exchange,
            pair: pair.clone(),
            path,
            db: RwLock::new(Some(db)),
            watermarks: Mutex::new(watermarks),
        })
    }

    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn watermarks(&self) -> Watermarks {
        *self.watermarks.lock()
    }

    /// Writes the batch and the merged watermarks in one atomic `sled` batch.
    /// Nothing is visible if serialization or the write fails.
    pub fn write_trades(&self, trades: &[Trade]) -> Result<(), String> {
        let db = self.db()?;
        if trades.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        // Held across the write so concurrent callers cannot interleave merges.
        let mut watermarks = self.watermarks.lock();
        let mut merged = *watermarks;
        merged.advance_to(&watermarks.merged_with(trades));

        let mut batch = sled::Batch::default();
        for trade in trades {
            let body = serde_json::to_vec(trade)
                .map_err(|err| format!("failed to serialize trade {}: {err}", trade.id))?;
            batch.insert(trade_key(trade.id), body);
        }
        batch.insert(
            LOWEST_TIMESTAMP_KEY,
            merged.lowest_timestamp.to_string().into_bytes(),
        );
        batch.insert(
            HIGHEST_TIMESTAMP_KEY,
            merged.highest_timestamp.to_string().into_bytes(),
        );

        tracing::trace!(pair = %self.pair, trades = trades.len(), "writing trade batch");

        if let Err(err) = db.apply_batch(batch) {
            metrics::counter!("orderbook.store.write_trades.calls_total", "result" => "err")
                .increment(1);
            return Err(format!(
                "failed to write {} trades to {}: {err}",
                trades.len(),
                self.path.display()
            ));
        }

        *watermarks = merged;

        metrics::counter!("orderbook.store.write_trades.calls_total", "result" => "ok")
            .increment(1);
        metrics::histogram!("orderbook.store.write_trades.batch_size").record(trades.len() as f64);
        metrics::histogram!("orderbook.store.write_trades_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        Ok(())
    }

    /// Persists `history_synced = highest_timestamp` and flushes it to disk.
    pub fn mark_history_synced(&self) -> Result<(), String> {
        let db = self.db()?;
        let mut watermarks = self.watermarks.lock();
        let synced = watermarks.highest_timestamp;
        db.insert(HISTORY_SYNCED_KEY, synced.to_string().into_bytes())
            .map_err(|err| format!("failed to write history sync marker: {err}"))?;
        db.flush()
            .map_err(|err| format!("failed to flush history sync marker: {err}"))?;
        watermarks.history_synced = synced;
        tracing::debug!(pair = %self.pair, history_synced = synced, "history sync marker saved");
        Ok(())
    }

    /// Forward scan over every trade in ascending id order.
    pub fn new_iterator(&self) -> Result<TradeIterator, String> {
        let db = self.db()?;
        Ok(TradeIterator::new(db.range(..TRADE_KEY_LIMIT)))
    }

    /// `sled` reclaims space on its own; this flushes dirty pages so the
    /// on-disk segments can be rewritten and reports the resulting size.
    pub fn compact(&self) -> Result<(), String> {
        let db = self.db()?;
        let before = db.size_on_disk().unwrap_or(0);
        let started = Instant::now();
        db.flush()
            .map_err(|err| format!("failed to compact {}: {err}", self.path.display()))?;
        let after = db.size_on_disk().unwrap_or(0);
        tracing::info!(
            pair = %self.pair,
            size_before = before,
            size_after = after,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "trade store compacted"
        );
        Ok(())
    }

    /// Flushes and releases the engine handle. A second call is an error.
    pub fn close(&self) -> Result<(), String> {
        let Some(db) = self.db.write().take() else {
            return Err(format!("trade store {} already closed", self.path.display()));
        };
        let flushed = db
            .flush()
            .map_err(|err| format!("failed to flush {} on close: {err}", self.path.display()));
        drop(db);
        flushed?;
        tracing::info!(pair = %self.pair, path = %self.path.display(), "trade store closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.db.read().is_none()
    }

    fn db(&self) -> Result<MappedRwLockReadGuard<'_, sled::Db>, String> {
        RwLockReadGuard::try_map(self.db.read(), |db| db.as_ref())
            .map_err(|_| format!("trade store {} is closed", self.path.display()))
    }
}

impl TradeLog for TradeStore {
    fn watermarks(&self) -> Watermarks {
        TradeStore::watermarks(self)
    }

    fn new_cursor(&self) -> Result<Box<dyn TradeCursor>, String> {
        Ok(Box::new(self.new_iterator()?))
    }

    fn write_trades(&self, trades: &[Trade]) -> Result<(), String> {
        TradeStore::write_trades(self, trades)
    }

    fn mark_history_synced(&self) -> Result<(), String> {
        TradeStore::mark_history_synced(self)
    }

    fn compact(&self) -> Result<(), String> {
        TradeStore::compact(self)
    }
}

fn read_i64(db: &sled::Db, key: &[u8]) -> Result<i64, String> {
    let name = String::from_utf8_lossy(key);
    let Some(body) = db
        .get(key)
        .map_err(|err| format!("failed to read {name}: {err}"))?
    else {
        return Ok(0);
    };
    let text = std::str::from_utf8(&body).map_err(|err| format!("invalid {name}: {err}"))?;
    text.parse::<i64>()
        .map_err(|err| format!("invalid {name} value {text:?}: {err}"))
}

/// Single-pass cursor over the trades of a [`TradeStore`].
///
/// Call [`advance`](TradeIterator::advance) before reading the first trade.
/// Dropping the iterator releases its resources; the store is unaffected.
pub struct TradeIterator {
    inner: sled::Iter,
    current: Option<sled::IVec>,
    error: Option<String>,
    error_reported: bool,
}

impl TradeIterator {
    fn new(inner: sled::Iter) -> Self {
        Self {
            inner,
            current: None,
            error: None,
            error_reported: false,
        }
    }

    /// Moves to the next trade; `false` at the end of the range or on a fault.
    pub fn advance(&mut self) -> bool {
        if self.error.is_some() {
            return false;
        }
        match self.inner.next() {
            Some(Ok((_key, value))) => {
                self.current = Some(value);
                true
            }
            Some(Err(err)) => {
                self.current = None;
                self.error = Some(format!("trade iteration failed: {err}"));
                false
            }
            None => {
                self.current = None;
                false
            }
        }
    }

    pub fn current(&self) -> Result<Trade, String> {
        let Some(body) = self.current.as_ref() else {
            return Err("iterator is not positioned on a trade".to_string());
        };
        serde_json::from_slice(body).map_err(|err| format!("failed to decode trade: {err}"))
    }

    /// Terminal fault hit while advancing, if any. `None` after a clean end.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl TradeCursor for TradeIterator {
    fn advance(&mut self) -> bool {
        TradeIterator::advance(self)
    }

    fn current(&self) -> Result<Trade, String> {
        TradeIterator::current(self)
    }

    fn error(&self) -> Option<&str> {
        TradeIterator::error(self)
    }
}

/// Yields each trade, then the terminal fault once if iteration failed.
impl Iterator for TradeIterator {
    type Item = Result<Trade, String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.advance() {
            return Some(self.current());
        }
        if self.error_reported {
            return None;
        }
        self.error_reported = true;
        self.error.clone().map(Err)
    }
}
