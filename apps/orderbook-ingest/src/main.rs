mod obs;

use clap::{Args, Parser, Subcommand};
use orderbook_application::config::{self, Config};
use orderbook_application::export::export_csv_file;
use orderbook_application::sync::HistorySynchronizer;
use orderbook_domain::value_objects::currency_pair::CurrencyPair;
use orderbook_infrastructure::history::poloniex::{PoloniexConfig, PoloniexHistorySource};
use orderbook_infrastructure::persistence::registry::StoreRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "orderbook-ingest")]
#[command(about = "Poloniex trade-history sync into local trade stores.", version)]
struct Cli {
    /// Config file path (TOML). Defaults apply when omitted.
    #[arg(long, env = "ORDERBOOK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Expose Prometheus metrics on host:port.
    #[arg(long, env = "ORDERBOOK_METRICS_ADDR", global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct StoreArgs {
    /// Root directory of the trade stores (overrides storage.path).
    #[arg(long)]
    db_path: Option<String>,

    /// Currency pair such as BTC_XRP; repeat for several (overrides sync.pairs).
    #[arg(long = "currency-pair")]
    currency_pairs: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Backfill then tail the trade history of every configured pair.
    Sync {
        #[command(flatten)]
        store: StoreArgs,
        /// Compact each store once before syncing.
        #[arg(long)]
        compact: bool,
    },
    /// Dump the stored trades of one pair as CSV.
    Export {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        output: PathBuf,
        /// Stop after this many rows; 0 exports everything.
        #[arg(long, default_value_t = 0)]
        max_entries: u64,
    },
    /// Compact the stores of the configured pairs.
    Compact {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Print the effective configuration as TOML.
    PrintConfig {
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let base = match cli.config.as_deref() {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::PrintConfig { store } => {
            let config = apply_overrides(base, &store);
            print!("{}", config::to_toml_pretty(&config)?);
            Ok(())
        }
        Commands::Sync { store, compact } => {
            let config = apply_overrides(base, &store);
            init_observability(&config, cli.metrics_addr.as_deref())?;
            run_sync(&config, compact).await
        }
        Commands::Export {
            store,
            output,
            max_entries,
        } => {
            let config = apply_overrides(base, &store);
            init_observability(&config, cli.metrics_addr.as_deref())?;
            let pair = single_pair(&config)?;
            let registry = StoreRegistry::new(&config.storage.path);
            let result =
                export_csv_file(&registry, config.sync.exchange, &pair, &output, max_entries);
            let closed = registry.close_all();
            let rows = result?;
            closed?;
            tracing::info!(rows, output = %output.display(), "export finished");
            Ok(())
        }
        Commands::Compact { store } => {
            let config = apply_overrides(base, &store);
            init_observability(&config, cli.metrics_addr.as_deref())?;
            let pairs = required_pairs(&config)?;
            let registry = StoreRegistry::new(&config.storage.path);
            let result = pairs
                .iter()
                .try_for_each(|pair| registry.compact(config.sync.exchange, pair));
            let closed = registry.close_all();
            result?;
            closed
        }
    }
}

fn apply_overrides(mut config: Config, store: &StoreArgs) -> Config {
    if let Some(path) = &store.db_path {
        config.storage.path = path.clone();
    }
    if !store.currency_pairs.is_empty() {
        config.sync.pairs = store.currency_pairs.clone();
    }
    config
}

fn init_observability(config: &Config, metrics_addr: Option<&str>) -> Result<(), String> {
    obs::init_tracing(&config.log.level, &config.log.format)?;
    obs::init_metrics(metrics_addr)?;
    Ok(())
}

fn required_pairs(config: &Config) -> Result<Vec<CurrencyPair>, String> {
    let pairs = config.currency_pairs()?;
    if pairs.is_empty() {
        return Err("at least one currency pair is required (sync.pairs or --currency-pair)".to_string());
    }
    Ok(pairs)
}

fn single_pair(config: &Config) -> Result<CurrencyPair, String> {
    let mut pairs = required_pairs(config)?;
    if pairs.len() > 1 {
        return Err(format!(
            "export takes exactly one currency pair, got {}",
            pairs.len()
        ));
    }
    Ok(pairs.remove(0))
}

async fn run_sync(config: &Config, compact: bool) -> Result<(), String> {
    config.validate_for_sync()?;
    let pairs = config.currency_pairs()?;
    let exchange = config.sync.exchange;

    let registry = Arc::new(StoreRegistry::new(&config.storage.path));
    let source = Arc::new(PoloniexHistorySource::new(PoloniexConfig {
        base_url: config.source.base_url.clone(),
        request_timeout: Duration::from_secs(config.source.request_timeout_secs),
        page_limit: config.source.page_limit,
        page_sleep: Duration::from_millis(config.source.page_sleep_ms),
    })?);

    if compact {
        for pair in &pairs {
            registry.compact(exchange, pair)?;
        }
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("shutdown requested");
                    cancel.cancel();
                }
                Err(err) => tracing::warn!(error = %err, "ctrl-c handler unavailable"),
            }
        });
    }

    tracing::info!(
        exchange = %exchange,
        pairs = pairs.len(),
        db_path = %config.storage.path,
        "starting history sync"
    );
    let settings = config.sync_settings();
    let mut tasks = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let synchronizer = HistorySynchronizer::new(
            registry.clone(),
            source.clone(),
            exchange,
            pair,
            settings.clone(),
        );
        let cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            let result = synchronizer.run(cancel.clone()).await;
            if result.is_err() {
                // A pair that cannot open its store takes the others down.
                cancel.cancel();
            }
            result
        }));
    }

    let mut failures = Vec::new();
    for task in tasks {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => failures.push(err),
            Err(err) => failures.push(format!("sync task failed: {err}")),
        }
    }
    if let Err(err) = registry.close_all() {
        failures.push(err);
    }

    if failures.is_empty() {
        tracing::info!("history sync shut down");
        Ok(())
    } else {
        Err(failures.join("; "))
    }
}
