use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use tonpunks_watch::api::{CredentialSource, MarketClient};
use tonpunks_watch::catalog::Catalog;
use tonpunks_watch::config::{AppConfig, CONFIG_PATH};
use tonpunks_watch::cycle::CycleController;
use tonpunks_watch::detector::DetectMode;
use tonpunks_watch::notify::{NotificationSink, Notifier, StdoutSink, TelegramSink};

#[derive(Parser)]
#[command(name = "purchase-watch", about = "TON Punks purchase stream watcher")]
struct Args {
    /// Config file path
    #[arg(long, default_value = CONFIG_PATH)]
    config: String,

    /// Print rendered notifications to stdout instead of sending to Telegram
    #[arg(long)]
    dry_run: bool,

    /// Use the historical sort-and-compare-by-index diff instead of the
    /// name-keyed join
    #[arg(long)]
    positional: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config_path = Path::new(&args.config);
    let config = AppConfig::load(config_path)?;
    info!("Loaded config from {}", config_path.display());

    let catalog = Catalog::load(Path::new(&config.catalog.path))?;

    let sink: Box<dyn NotificationSink> = if args.dry_run {
        info!("Dry run: notifications go to stdout");
        Box::new(StdoutSink)
    } else {
        Box::new(TelegramSink::from_env()?)
    };
    let notifier = Notifier::new(catalog, sink);

    let mode = if args.positional {
        DetectMode::Positional
    } else {
        DetectMode::Keyed
    };

    let market = MarketClient::new()?;
    if let Err(e) = market.refresh_credentials().await {
        // the controller rotates credentials again on the first failed cycle
        warn!("Initial credential fetch failed: {e}");
    }

    let poll_interval_secs = config.settings.poll_interval_secs;
    info!(
        "Start streaming new purchases — pages={} page_size={} concurrency={} poll={}s mode={mode:?}",
        config.fetch.page_count, config.fetch.page_size, config.fetch.concurrency, poll_interval_secs,
    );

    let mut cycle = CycleController::new(market, config.fetch, config.recovery, mode);
    let poll_duration = Duration::from_secs(poll_interval_secs);

    info!("Entering polling loop (interval: {poll_interval_secs}s). Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(poll_duration) => {
                let purchases = cycle.step().await;
                if !purchases.is_empty() {
                    notifier.notify_all(&purchases).await;
                }
            }
        }
    }

    Ok(())
}
