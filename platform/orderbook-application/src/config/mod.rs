use crate::sync::{
    SyncSettings, DEFAULT_FETCH_TIMEOUT, DEFAULT_RELAY_CAPACITY, DEFAULT_SYNC_INTERVAL,
};
use orderbook_domain::value_objects::currency_pair::CurrencyPair;
use orderbook_domain::value_objects::exchange::Exchange;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "/tmp/orderbook";
pub const DEFAULT_PAIR_SEPARATOR: &str = "_";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub source: SourceConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct StorageConfig {
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_DB_PATH.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct SyncConfig {
    pub exchange: Exchange,
    pub pairs: Vec<String>,
    pub pair_separator: String,
    pub interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub relay_capacity: usize,
    pub advance_on_failed_fetch: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            exchange: Exchange::Poloniex,
            pairs: Vec::new(),
            pair_separator: DEFAULT_PAIR_SEPARATOR.to_string(),
            interval_secs: DEFAULT_SYNC_INTERVAL.as_secs(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            advance_on_failed_fetch: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct SourceConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub page_limit: usize,
    pub page_sleep_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://poloniex.com".to_string(),
            request_timeout_secs: 30,
            page_limit: 1000,
            page_sleep_ms: 350,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Config {
    /// Parses every configured pair with the configured separator.
    pub fn currency_pairs(&self) -> Result<Vec<CurrencyPair>, String> {
        self.sync
            .pairs
            .iter()
            .map(|raw| CurrencyPair::parse(raw, &self.sync.pair_separator))
            .collect()
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            interval: Duration::from_secs(self.sync.interval_secs),
            fetch_timeout: Duration::from_secs(self.sync.fetch_timeout_secs),
            relay_capacity: self.sync.relay_capacity,
            advance_on_failed_fetch: self.sync.advance_on_failed_fetch,
        }
    }

    /// Checks what the sync loop needs before anything is opened.
    pub fn validate_for_sync(&self) -> Result<(), String> {
        if self.storage.path.trim().is_empty() {
            return Err("storage.path must not be empty".to_string());
        }
        if self.sync.pair_separator.is_empty() {
            return Err("sync.pair_separator must not be empty".to_string());
        }
        if self.sync.pairs.is_empty() {
            return Err("at least one currency pair is required (sync.pairs or --currency-pair)".to_string());
        }
        if self.sync.interval_secs == 0 {
            return Err("sync.interval_secs must be > 0".to_string());
        }
        if self.sync.fetch_timeout_secs == 0 {
            return Err("sync.fetch_timeout_secs must be > 0".to_string());
        }
        if self.sync.relay_capacity == 0 {
            return Err("sync.relay_capacity must be > 0".to_string());
        }
        if self.source.page_limit == 0 {
            return Err("source.page_limit must be > 0".to_string());
        }
        self.currency_pairs()?;
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {err}", path.display()))?;
    toml::from_str(&contents).map_err(|err| format!("failed to parse TOML {}: {err}", path.display()))
}

pub fn to_toml_pretty(config: &Config) -> Result<String, String> {
    toml::to_string_pretty(config)
        .map_err(|err| format!("failed to serialize config as TOML: {err}"))
}

#[cfg(test)]
mod tests {
    use super::Config;
    use orderbook_domain::value_objects::currency_pair::CurrencyPair;
    use std::time::Duration;

    fn parse_config(toml_str: &str) -> Config {
        toml::from_str(toml_str).expect("config should parse")
    }

    #[test]
    fn parse_config_rejects_malformed_toml() {
        let err = toml::from_str::<Config>("[sync\npairs = 1").expect_err("malformed");
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn parse_config_rejects_unknown_fields() {
        let err = toml::from_str::<Config>("[sync]\npairz = [\"BTC_XRP\"]\n").expect_err("unknown");
        assert!(err.to_string().contains("pairz"));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_config("");
        assert_eq!(config.storage.path, "/tmp/orderbook");
        let settings = config.sync_settings();
        assert_eq!(settings.interval, Duration::from_secs(15));
        assert_eq!(settings.fetch_timeout, Duration::from_secs(3600));
        assert_eq!(settings.relay_capacity, 10);
        assert!(!settings.advance_on_failed_fetch);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn full_config_is_read() {
        let config = parse_config(
            r#"
[storage]
path = "/var/lib/orderbook"

[sync]
exchange = "poloniex"
pairs = ["BTC_XRP", "USDT_BTC"]
interval_secs = 30
fetch_timeout_secs = 600
relay_capacity = 4
advance_on_failed_fetch = true

[source]
base_url = "http://127.0.0.1:9000"
page_limit = 200

[log]
level = "debug"
format = "json"
"#,
        );
        assert_eq!(
            config.currency_pairs().unwrap(),
            vec![CurrencyPair::new("BTC", "XRP"), CurrencyPair::new("USDT", "BTC")]
        );
        assert!(config.validate_for_sync().is_ok());
        let settings = config.sync_settings();
        assert_eq!(settings.interval, Duration::from_secs(30));
        assert!(settings.advance_on_failed_fetch);
        assert_eq!(config.source.page_limit, 200);
        assert_eq!(config.source.page_sleep_ms, 350);
    }

    #[test]
    fn validate_requires_pairs() {
        let config = parse_config("");
        let err = config.validate_for_sync().unwrap_err();
        assert!(err.contains("currency pair"));
    }

    #[test]
    fn validate_rejects_malformed_pair() {
        let config = parse_config("[sync]\npairs = [\"BTCXRP\"]\n");
        assert!(config.validate_for_sync().is_err());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let config = parse_config("[sync]\npairs = [\"BTC_XRP\"]\ninterval_secs = 0\n");
        assert!(config.validate_for_sync().unwrap_err().contains("interval_secs"));
    }

    #[test]
    fn load_config_reads_file_and_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orderbook.toml");
        std::fs::write(&path, "[sync]\npairs = [\"BTC_XRP\"]\n").unwrap();
        let config = super::load_config(&path).unwrap();
        assert_eq!(config.sync.pairs, vec!["BTC_XRP"]);

        let missing = dir.path().join("missing.toml");
        let err = super::load_config(&missing).unwrap_err();
        assert!(err.contains("missing.toml"), "{err}");
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = Config::default();
        config.sync.pairs = vec!["BTC_ETH".to_string()];
        let text = super::to_toml_pretty(&config).unwrap();
        let parsed = parse_config(&text);
        assert_eq!(parsed.sync.pairs, config.sync.pairs);
        assert_eq!(parsed.sync.exchange, config.sync.exchange);
    }
}
