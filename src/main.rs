use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zonetrack::api::{self, AppState};
use zonetrack::cache::ActiveObjectCache;
use zonetrack::clock::{Clock, SystemClock};
use zonetrack::config::Config;
use zonetrack::db::Database;
use zonetrack::membership::MembershipTracker;
use zonetrack::pipeline::{DisappearanceSweeper, Dispatcher, IngestionPipeline};
use zonetrack::transport::FeedClient;
use zonetrack::zones::{self, JsonZoneFile, ZoneRegistry, ZoneSource};

#[derive(Parser)]
#[command(name = "zonetrack")]
#[command(about = "Real-time object tracking with zone enter/exit detection")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest the position feed and serve the read API
    Serve {
        /// Port for HTTP API
        #[arg(short, long)]
        port: Option<u16>,

        /// Position feed address (host:port)
        #[arg(short, long)]
        feed: Option<String>,

        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,

        /// Read zones from a JSON file instead of the database
        #[arg(long)]
        zones_file: Option<PathBuf>,
    },
    /// Import zone definitions from a JSON file into the database
    ImportZones {
        /// JSON array of zone definitions
        file: PathBuf,

        /// SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "zonetrack=info,tower_http=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = Config::from_env();

    match cli.command {
        Some(Commands::Serve {
            port,
            feed,
            db,
            zones_file,
        }) => {
            if let Some(port) = port {
                config.api_port = port;
            }
            if let Some(feed) = feed {
                config.feed_addr = feed;
            }
            if db.is_some() {
                config.db_path = db;
            }
            if zones_file.is_some() {
                config.zones_file = zones_file;
            }
            serve(config).await?;
        }
        Some(Commands::ImportZones { file, db }) => {
            if db.is_some() {
                config.db_path = db;
            }
            import_zones(&config, file)?;
        }
        None => serve(config).await?,
    }

    Ok(())
}

fn open_database(config: &Config) -> anyhow::Result<Database> {
    let db = match &config.db_path {
        Some(path) => Database::open(path.clone())?,
        None => Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

fn import_zones(config: &Config, file: PathBuf) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let definitions = JsonZoneFile::new(file).load_zone_definitions()?;

    for zone in &definitions {
        db.upsert_zone(zone)
            .with_context(|| format!("Failed to import zone {}", zone.id))?;
    }

    println!("Imported {} zones", definitions.len());
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting zonetrack on port {}", config.api_port);

    let db = open_database(&config)?;
    let store = Arc::new(db.clone());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let zone_source: Arc<dyn ZoneSource> = match &config.zones_file {
        Some(path) => Arc::new(JsonZoneFile::new(path.clone())),
        None => store.clone(),
    };
    let registry = Arc::new(ZoneRegistry::new(zone_source));
    match registry.reload() {
        Ok(count) => tracing::info!("Loaded {} zones", count),
        Err(e) => tracing::warn!("Starting without zones: {}", e),
    }

    let tracker = Arc::new(MembershipTracker::new());
    let cache = Arc::new(ActiveObjectCache::new(clock.clone(), config.active_timeout));
    let pipeline = Arc::new(IngestionPipeline::new(
        registry.clone(),
        tracker.clone(),
        cache.clone(),
        store.clone(),
        store.clone(),
    ));

    let cancel = CancellationToken::new();
    let dispatcher = Dispatcher::spawn(pipeline, config.workers, config.queue_depth);

    let feed = FeedClient::new(config.feed_addr.clone(), dispatcher.handle(), clock.clone());
    let feed_task = tokio::spawn(feed.run(cancel.clone()));

    let reload_task = zones::spawn_reload_task(registry.clone(), config.zone_reload, cancel.clone());

    let sweeper = Arc::new(DisappearanceSweeper::new(
        store.clone(),
        clock.clone(),
        config.gone_after,
    ));
    let sweep_interval = (config.gone_after / 4).max(Duration::from_secs(1));
    let sweep_task = sweeper.spawn(sweep_interval, cancel.clone());

    let app = api::create_router(AppState {
        db,
        cache,
        tracker,
        registry,
    });

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", config.api_port)).await?;
    tracing::info!(
        "zonetrack listening on http://127.0.0.1:{}, feed {}",
        config.api_port,
        config.feed_addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    match feed_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Feed client stopped: {}", e),
        Err(e) => tracing::error!("Feed client panicked: {}", e),
    }
    if let Err(e) = reload_task.await {
        tracing::error!("Zone reload task panicked: {}", e);
    }
    if let Err(e) = sweep_task.await {
        tracing::error!("Disappearance sweeper panicked: {}", e);
    }
    dispatcher.shutdown().await;

    tracing::info!("zonetrack stopped");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        }
        _ = cancel.cancelled() => {}
    }
    tracing::info!("Shutting down");
    cancel.cancel();
}
