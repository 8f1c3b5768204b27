use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};
use orderbook_domain::repositories::history_source::{HistoryRequest, HistorySource};
use orderbook_domain::value_objects::trade::{Trade, TradeSide};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;

pub const POLONIEX_BASE: &str = "https://poloniex.com";
pub const POLONIEX_PAGE_LIMIT: usize = 1000;
const MAX_RATE_LIMIT_RETRIES: u32 = 5;

#[derive(Debug, Clone)]
pub struct PoloniexConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    /// Rows returned by a full page; a shorter page ends the walk.
    pub page_limit: usize,
    pub page_sleep: Duration,
}

impl Default for PoloniexConfig {
    fn default() -> Self {
        Self {
            base_url: POLONIEX_BASE.to_string(),
            request_timeout: Duration::from_secs(30),
            page_limit: POLONIEX_PAGE_LIMIT,
            page_sleep: Duration::from_millis(350),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TradeIdField {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct PoloniexTrade {
    #[serde(rename = "tradeID")]
    trade_id: TradeIdField,
    date: String,
    #[serde(rename = "type")]
    side: String,
    rate: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PoloniexResponse {
    Trades(Vec<PoloniexTrade>),
    Error { error: String },
}

/// `returnTradeHistory` client. Walks a window newest-to-oldest, one batch
/// per page.
#[derive(Debug, Clone)]
pub struct PoloniexHistorySource {
    client: Client,
    config: PoloniexConfig,
}

impl PoloniexHistorySource {
    pub fn new(config: PoloniexConfig) -> Result<Self, String> {
        if config.page_limit == 0 {
            return Err("poloniex page_limit must be > 0".to_string());
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self { client, config })
    }

    async fn fetch_page(&self, pair: &str, start: i64, end: i64) -> Result<Vec<Trade>, String> {
        let url = format!("{}/public", self.config.base_url.trim_end_matches('/'));
        let start = start.to_string();
        let end = end.to_string();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("command", "returnTradeHistory"),
                    ("currencyPair", pair),
                    ("start", start.as_str()),
                    ("end", end.as_str()),
                ])
                .send()
                .await
                .map_err(|err| format!("trade history request failed: {err}"))?;

            if response.status().as_u16() == 429 && attempts <= MAX_RATE_LIMIT_RETRIES {
                let backoff = 500u64 * attempts as u64;
                tracing::debug!(pair, attempts, backoff_ms = backoff, "rate limited by poloniex");
                metrics::counter!("orderbook.poloniex.rate_limited_total").increment(1);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                continue;
            }

            if !response.status().is_success() {
                return Err(format!(
                    "trade history request failed with status {}",
                    response.status()
                ));
            }

            let payload: PoloniexResponse = response
                .json()
                .await
                .map_err(|err| format!("trade history response parse failed: {err}"))?;
            return match payload {
                PoloniexResponse::Trades(rows) => parse_poloniex_rows(&rows),
                PoloniexResponse::Error { error } => {
                    Err(format!("trade history response error: {error}"))
                }
            };
        }
    }
}

#[async_trait]
impl HistorySource for PoloniexHistorySource {
    async fn fetch_history(
        &self,
        request: HistoryRequest,
        batches: mpsc::Sender<Vec<Trade>>,
    ) -> Result<(), String> {
        let pair = request.pair.concat("_");
        let mut page_end = request.end;
        let mut pages = 0u64;
        let mut total = 0u64;

        while page_end >= request.start {
            let trades = self.fetch_page(&pair, request.start, page_end).await?;
            pages += 1;
            metrics::counter!("orderbook.poloniex.pages_total").increment(1);

            let count = trades.len();
            let oldest = trades.iter().map(|trade| trade.timestamp).min();
            tracing::debug!(
                pair = %pair,
                start = request.start,
                end = page_end,
                trades = count,
                "trade history page received"
            );

            if count > 0 {
                total += count as u64;
                if batches.send(trades).await.is_err() {
                    tracing::debug!(pair = %pair, "trade batch receiver dropped, stopping fetch");
                    return Ok(());
                }
            }

            if count < self.config.page_limit {
                break;
            }
            let Some(oldest) = oldest else {
                break;
            };
            // Overlap on the oldest second so trades sharing it are not cut off,
            // but always move the bound down.
            page_end = if oldest < page_end { oldest } else { page_end - 1 };
            tokio::time::sleep(self.config.page_sleep).await;
        }

        tracing::info!(pair = %pair, pages, trades = total, "trade history fetch complete");
        Ok(())
    }
}

fn parse_poloniex_rows(rows: &[PoloniexTrade]) -> Result<Vec<Trade>, String> {
    let mut trades = Vec::with_capacity(rows.len());
    for row in rows {
        let id = match &row.trade_id {
            TradeIdField::Number(id) => *id,
            TradeIdField::Text(raw) => raw
                .parse::<u64>()
                .map_err(|_| format!("invalid tradeID: {raw}"))?,
        };
        trades.push(Trade {
            id,
            timestamp: parse_trade_date(&row.date)?,
            side: TradeSide::parse(&row.side)?,
            rate: parse_decimal(&row.rate, "rate")?,
            volume: parse_decimal(&row.amount, "amount")?,
        });
    }

    trades.sort_by_key(|trade| trade.id);
    Ok(trades)
}

fn parse_trade_date(value: &str) -> Result<i64, String> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map_err(|_| format!("invalid trade date: {value}"))?;
    Ok(Utc.from_utc_datetime(&naive).timestamp())
}

fn parse_decimal(value: &str, field: &str) -> Result<Decimal, String> {
    value
        .parse::<Decimal>()
        .map_err(|_| format!("invalid {field}: {value}"))
}

#[cfg(test)]
mod tests {
    use super::{parse_poloniex_rows, parse_trade_date, PoloniexResponse};
    use orderbook_domain::value_objects::trade::TradeSide;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_trade_date_is_utc() {
        assert_eq!(parse_trade_date("2014-02-10 04:23:23").unwrap(), 1_392_006_203);
        assert!(parse_trade_date("2014-02-10T04:23:23Z").is_err());
    }

    #[test]
    fn rows_are_converted_and_sorted_by_id() {
        let body = r#"[
            {"globalTradeID": 25, "tradeID": "12", "date": "2014-02-10 04:23:23", "type": "sell", "rate": "0.00007600", "amount": "140", "total": "0.01064"},
            {"globalTradeID": 24, "tradeID": 11, "date": "2014-02-10 04:23:20", "type": "buy", "rate": "0.00007500", "amount": "10.5", "total": "0.0007875"}
        ]"#;
        let PoloniexResponse::Trades(rows) = serde_json::from_str(body).unwrap() else {
            panic!("expected trades");
        };
        let trades = parse_poloniex_rows(&rows).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].id, 11);
        assert_eq!(trades[0].side, TradeSide::Buy);
        assert_eq!(trades[0].volume, dec!(10.5));
        assert_eq!(trades[1].id, 12);
        assert_eq!(trades[1].rate, dec!(0.00007600));
        assert_eq!(trades[1].timestamp, 1_392_006_203);
    }

    #[test]
    fn error_payload_is_recognized() {
        let payload: PoloniexResponse =
            serde_json::from_str(r#"{"error":"Invalid currency pair."}"#).unwrap();
        assert!(matches!(payload, PoloniexResponse::Error { .. }));
    }

    #[test]
    fn malformed_rate_is_rejected() {
        let body = r#"[{"tradeID": 1, "date": "2014-02-10 04:23:23", "type": "buy", "rate": "abc", "amount": "1"}]"#;
        let PoloniexResponse::Trades(rows) = serde_json::from_str(body).unwrap() else {
            panic!("expected trades");
        };
        assert!(parse_poloniex_rows(&rows).is_err());
    }
}
