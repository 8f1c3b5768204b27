use super::{FetchStatus, SyncOutcome, SyncSettings};
use chrono::Utc;
use orderbook_domain::repositories::history_source::{HistoryRequest, HistorySource};
use orderbook_domain::repositories::trade_log::{TradeLog, TradeLogProvider};
use orderbook_domain::services::history_window::HistoryWindow;
use orderbook_domain::value_objects::currency_pair::CurrencyPair;
use orderbook_domain::value_objects::exchange::Exchange;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Backfill-then-tail synchronization of one pair.
///
/// Every iteration derives its request window from the store watermarks, so a
/// failed or partial iteration is repaired by the next one.
pub struct HistorySynchronizer<P: TradeLogProvider> {
    provider: Arc<P>,
    source: Arc<dyn HistorySource>,
    exchange: Exchange,
    pair: CurrencyPair,
    settings: SyncSettings,
}

impl<P: TradeLogProvider> HistorySynchronizer<P> {
    pub fn new(
        provider: Arc<P>,
        source: Arc<dyn HistorySource>,
        exchange: Exchange,
        pair: CurrencyPair,
        settings: SyncSettings,
    ) -> Self {
        Self {
            provider,
            source,
            exchange,
            pair,
            settings,
        }
    }

    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    /// Runs until `cancel` fires. Only a store open failure is returned.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), String> {
        let log = self
            .provider
            .open_or_get(self.exchange, &self.pair)
            .map_err(|err| format!("failed to open trade store for {}: {err}", self.pair))?;

        while !cancel.is_cancelled() {
            let outcome = self.sync_once(log.as_ref(), &cancel).await;
            if outcome.fetch == FetchStatus::Cancelled {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        tracing::info!(exchange = %self.exchange, pair = %self.pair, "history sync stopped");
        Ok(())
    }

    /// One iteration: compute the window, stream the fetch into the store and
    /// advance the sync marker when allowed.
    pub async fn sync_once(&self, log: &dyn TradeLog, cancel: &CancellationToken) -> SyncOutcome {
        let window = HistoryWindow::next(&log.watermarks(), Utc::now().timestamp());
        let span = tracing::info_span!(
            "app.sync.iteration",
            exchange = %self.exchange,
            pair = %self.pair,
            phase = %window.phase
        );
        self.sync_window(log, cancel, window).instrument(span).await
    }

    async fn sync_window(
        &self,
        log: &dyn TradeLog,
        cancel: &CancellationToken,
        window: HistoryWindow,
    ) -> SyncOutcome {
        let started = Instant::now();
        tracing::info!(start = window.start, end = window.end, "syncing history");

        let request = HistoryRequest {
            pair: self.pair.clone(),
            start: window.start,
            end: window.end,
        };
        let (tx, mut rx) = mpsc::channel(self.settings.relay_capacity.max(1));
        let source = self.source.clone();
        let budget = self.settings.fetch_timeout;
        let producer = tokio::spawn(async move {
            match tokio::time::timeout(budget, source.fetch_history(request, tx)).await {
                Ok(Ok(())) => FetchStatus::Completed,
                Ok(Err(err)) => FetchStatus::Failed(err),
                Err(_) => FetchStatus::TimedOut,
            }
        });

        let mut batches = 0u64;
        let mut trades_written = 0u64;
        let mut write_failures = 0u64;
        let mut cancelled = false;
        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                batch = rx.recv() => batch,
            };
            let Some(batch) = batch else {
                break;
            };
            batches += 1;
            match log.write_trades(&batch) {
                Ok(()) => trades_written += batch.len() as u64,
                Err(err) => {
                    write_failures += 1;
                    metrics::counter!("orderbook.sync.write_failures_total").increment(1);
                    tracing::error!(error = %err, trades = batch.len(), "trades write error");
                }
            }
        }

        let fetch = if cancelled {
            producer.abort();
            FetchStatus::Cancelled
        } else {
            match producer.await {
                Ok(status) => status,
                Err(err) => FetchStatus::Failed(format!("history fetch task failed: {err}")),
            }
        };
        match &fetch {
            FetchStatus::Failed(err) => tracing::warn!(error = %err, "history fetch error"),
            FetchStatus::TimedOut => tracing::warn!(
                timeout_secs = budget.as_secs(),
                "history fetch timed out"
            ),
            FetchStatus::Cancelled => tracing::info!("history sync cancelled"),
            FetchStatus::Completed => {}
        }

        let mut outcome = SyncOutcome {
            window,
            batches,
            trades_written,
            write_failures,
            fetch,
            marked_synced: false,
        };
        if outcome.may_mark_synced(&self.settings) {
            match log.mark_history_synced() {
                Ok(()) => outcome.marked_synced = true,
                Err(err) => tracing::error!(error = %err, "failed to save history sync marker"),
            }
        } else if outcome.fetch != FetchStatus::Cancelled {
            tracing::warn!(
                fetch = outcome.fetch.as_str(),
                write_failures,
                "history sync marker not advanced"
            );
        }

        metrics::counter!(
            "orderbook.sync.iterations_total",
            "phase" => window.phase.as_str(),
            "fetch" => outcome.fetch.as_str()
        )
        .increment(1);
        metrics::counter!("orderbook.sync.trades_written_total").increment(trades_written);
        metrics::histogram!("orderbook.sync.iteration_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            batches,
            trades = trades_written,
            fetch = outcome.fetch.as_str(),
            marked_synced = outcome.marked_synced,
            "history sync iteration finished"
        );
        outcome
    }
}
