//! Cabin booking service.
//!
//! Connects to the booking database, applies migrations, runs the hold reclaimer
//! on its interval and serves health and metrics endpoints.

mod api;
mod config;
mod logging;
mod metrics;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use cabin_booking::{
    collaborators::{BookingNotifier, FanoutNotifier, FlatRatePricing, LogNotifier},
    db::{Database, PgBookingRepository},
    locker::BookingLocker,
    reclaimer::HoldReclaimer,
};
use config::ServerConfig;
use ctrlc::set_handler;
use log::info;
use pico_args::Arguments;
use tokio::sync::watch;

const HELP: &str = "\
Run the cabin booking service

USAGE:
  cb_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     HTTP bind address           [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/cabin_booking]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              HTTP bind address (e.g., 0.0.0.0:8080)
  METRICS_BIND             Prometheus scrape address (e.g., 0.0.0.0:9090)
  DATABASE_URL             PostgreSQL connection string
  HOLD_TTL_MINUTES         Hold lifetime [default: 15]
  BOOKING_LOCK_TIMEOUT_MS  Wait for inventory locks instead of failing fast
  HOLD_SWEEP_INTERVAL_SECS Seconds between reclaimer passes [default: 60]
  HOLD_SWEEP_BATCH_SIZE    Holds canceled per pass [default: 500]
  RUST_LOG                 Log filter [default: info,sqlx=warn,hyper=warn]
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;
    config.validate()?;

    // Catching signals for exit.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    set_handler(move || {
        let _ = shutdown_tx.send(true);
    })?;

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics at http://{metrics_bind}/metrics");
    }

    info!("Connecting to database");
    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    db.migrate()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to apply migrations: {}", e))?;
    info!("Database connected and migrated");

    let pool = Arc::new(db.pool().clone());
    let notifier: Arc<dyn BookingNotifier> = Arc::new(FanoutNotifier::new(vec![
        Arc::new(LogNotifier),
        Arc::new(metrics::MetricsNotifier),
    ]));
    let locker = BookingLocker::new(
        pool.clone(),
        Arc::new(FlatRatePricing::default()),
        notifier,
        config.locker.clone(),
    );

    let reclaimer = HoldReclaimer::new(
        locker,
        Arc::new(PgBookingRepository::new(pool.clone())),
        config.reclaimer.clone(),
    );
    let reclaimer_task = tokio::spawn(reclaimer.run(shutdown_rx.clone()));

    let app = api::create_router(api::AppState {
        pool,
        sweep_interval: config.reclaimer.interval,
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_rx))
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");
    if let Err(e) = reclaimer_task.await {
        log::error!("Hold reclaimer task failed: {e}");
    }
    db.close().await;

    Ok(())
}

/// Resolves once Ctrl+C was received
async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}
