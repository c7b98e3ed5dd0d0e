use std::sync::Arc;

use clap::Parser;
use netwatch::alerts::AlertDispatcher;
use netwatch::config::{Config, StoreConfig};
use netwatch::monitor::MonitorHandle;
use netwatch::probe::PingProber;
use netwatch::store::DeviceStore;
use netwatch::store::memory::MemoryStore;
use netwatch::store::sqlite::SqliteStore;
use tokio::sync::broadcast;
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Run a single monitoring cycle and exit
    #[arg(long)]
    once: bool,

    /// Alternate .env file to load
    #[arg(long)]
    env_file: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_target("netwatch", LevelFilter::TRACE);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    match &args.env_file {
        Some(path) => {
            dotenv::from_filename(path).ok();
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    let config = Config::from_env();

    let store: Arc<dyn DeviceStore> = match &config.store {
        StoreConfig::Sqlite { path } => Arc::new(SqliteStore::new(path).await?),
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
    };

    if config.email.is_none() {
        info!("email alerts disabled (SMTP credentials not configured)");
    }
    if config.webhook.is_none() {
        info!("webhook alerts disabled (webhook credentials not configured)");
    }

    let prober = Arc::new(PingProber::new(config.monitor.probe_timeout));
    let dispatcher = AlertDispatcher::new(config.email.clone(), config.webhook.clone());

    let (event_tx, _) = broadcast::channel(256);

    if args.once {
        // Idle spawn: no automatic first cycle, only the one commanded here.
        let monitor = MonitorHandle::spawn_idle(
            store.clone(),
            prober,
            dispatcher,
            config.monitor.clone(),
            event_tx,
        );

        monitor.check_now().await?;
        monitor.shutdown().await;
        store.close().await?;
        return Ok(());
    }

    let monitor = MonitorHandle::spawn(
        store.clone(),
        prober,
        dispatcher,
        config.monitor.clone(),
        event_tx,
    );

    info!(
        "monitoring started, cycle interval {:?}",
        config.monitor.interval
    );

    tokio::signal::ctrl_c().await?;
    debug!("received ctrl-c, shutting down");

    monitor.shutdown().await;
    if let Err(e) = store.close().await {
        error!("error while closing device store: {e}");
    }

    Ok(())
}
