use std::net::SocketAddr;

pub const LOG_ENV: &str = "ORDERBOOK_LOG";

pub fn init_tracing(log_level: &str, log_format: &str) -> Result<(), String> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    match log_format.trim().to_lowercase().as_str() {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .try_init(),
        "text" | "" => tracing_subscriber::fmt().with_env_filter(env_filter).try_init(),
        other => return Err(format!("unsupported log format: {other} (expected text or json)")),
    }
    .map_err(|err| format!("failed to install tracing subscriber: {err}"))
}

/// Serves `/metrics` on `metrics_addr` and registers help text for the
/// `orderbook.` series emitted by the stores, the Poloniex client and the
/// sync loop.
#[cfg(feature = "prometheus")]
pub fn init_metrics(metrics_addr: Option<&str>) -> Result<Option<SocketAddr>, String> {
    use metrics::{describe_counter, describe_histogram, Unit};
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(raw) = metrics_addr else {
        return Ok(None);
    };
    let addr: SocketAddr = raw
        .parse()
        .map_err(|err| format!("invalid --metrics-addr (expected host:port): {err}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter at {addr}: {err}"))?;

    describe_counter!("orderbook.store.open_total", "Trade stores opened.");
    describe_counter!(
        "orderbook.store.write_trades.calls_total",
        "Trade batch writes by result."
    );
    describe_histogram!(
        "orderbook.store.write_trades.batch_size",
        Unit::Count,
        "Trades per written batch."
    );
    describe_histogram!(
        "orderbook.store.write_trades_ms",
        Unit::Milliseconds,
        "Latency of one atomic trade batch write."
    );
    describe_counter!("orderbook.poloniex.pages_total", "History pages fetched.");
    describe_counter!(
        "orderbook.poloniex.rate_limited_total",
        "History requests answered with HTTP 429."
    );
    describe_counter!(
        "orderbook.sync.iterations_total",
        "Sync iterations by phase and fetch status."
    );
    describe_counter!(
        "orderbook.sync.trades_written_total",
        Unit::Count,
        "Trades persisted by the sync loop."
    );
    describe_counter!(
        "orderbook.sync.write_failures_total",
        "Batches the sync loop failed to persist."
    );
    describe_histogram!(
        "orderbook.sync.iteration_ms",
        Unit::Milliseconds,
        "Wall time of one sync iteration."
    );

    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(metrics_addr: Option<&str>) -> Result<Option<SocketAddr>, String> {
    if metrics_addr.is_some() {
        return Err(
            "--metrics-addr needs orderbook-ingest built with feature `prometheus`".to_string(),
        );
    }
    Ok(None)
}
