use orderbook_domain::repositories::trade_log::{TradeLog, TradeLogProvider};
use orderbook_domain::value_objects::currency_pair::CurrencyPair;
use orderbook_domain::value_objects::exchange::Exchange;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub const CSV_HEADER: [&str; 5] = ["id", "timestamp", "rate", "volume", "total_price"];

/// Writes every stored trade of the pair as CSV, ascending by id.
/// `max_entries == 0` exports everything. Returns the number of rows written.
pub fn export_csv<P, W>(
    provider: &P,
    exchange: Exchange,
    pair: &CurrencyPair,
    writer: W,
    max_entries: u64,
) -> Result<u64, String>
where
    P: TradeLogProvider,
    W: Write,
{
    let log = provider.open_or_get(exchange, pair)?;
    let mut cursor = log.new_cursor()?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(CSV_HEADER)
        .map_err(|err| format!("failed to write csv header: {err}"))?;

    let mut written = 0u64;
    while (max_entries == 0 || written < max_entries) && cursor.advance() {
        let trade = cursor.current()?;
        csv_writer
            .write_record([
                trade.id.to_string(),
                trade.timestamp.to_string(),
                format!("{:.8}", trade.rate),
                format!("{:.8}", trade.volume),
                format!("{:.8}", trade.total_price()),
            ])
            .map_err(|err| format!("failed to write csv row for trade {}: {err}", trade.id))?;
        written += 1;
    }

    if let Some(err) = cursor.error() {
        return Err(err.to_string());
    }
    csv_writer
        .flush()
        .map_err(|err| format!("failed to flush csv output: {err}"))?;

    tracing::info!(exchange = %exchange, pair = %pair, rows = written, "trades exported");
    Ok(written)
}

pub fn export_csv_file<P: TradeLogProvider>(
    provider: &P,
    exchange: Exchange,
    pair: &CurrencyPair,
    output: &Path,
    max_entries: u64,
) -> Result<u64, String> {
    let file = File::create(output)
        .map_err(|err| format!("failed to create {}: {err}", output.display()))?;
    export_csv(provider, exchange, pair, file, max_entries)
}
