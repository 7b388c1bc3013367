#![warn(clippy::all, clippy::pedantic)]

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use anyhow::anyhow;
use clap::Parser;
use tracing::{info, warn};
use uptime_service::bus::register_notification;
use uptime_service::database::initialize_database;
use uptime_service::pool::open_pool;
use uptime_service::{
    CheckExecutor, Config, DatabaseImpl, FleetScheduler, HttpProber, StatusReader, TransitionBus,
};

mod error;
mod routes;
mod state;

use error::AppError;
use logger::init_tracing;
use state::AppState;

/// How long queued notifications may take to drain on shutdown
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(version, about = "Uptime monitoring server")]
struct Args {
    /// Path to the TOML configuration file (created with defaults if missing)
    #[arg(short, long, env = "UPTIME_CONFIG")]
    config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = Config::from_config(args.config.as_deref())?;
    info!("{config}");

    run_server(config).await
}

async fn run_server(config: Config) -> Result<(), AppError> {
    let ip: IpAddr = config.server.bind.parse()?;
    let addr = SocketAddr::new(ip, config.server.port);

    let pool = open_pool(&config.database.path, config.database.max_connections).await?;
    {
        let conn = pool.get().await.map_err(|e| anyhow!("failed to open database: {e}"))?;
        initialize_database(&conn).await?;
    }
    let database = Arc::new(DatabaseImpl::new_from_pool(pool));

    for seed in &config.sites {
        let site = database.register_site(&seed.url).await?;
        info!(site_id = site.id, url = %site.url, "seed site registered");
    }

    let bus = Arc::new(TransitionBus::new(config.bus.bus_config()));
    let notifications = register_notification(&bus)?;

    let prober = Arc::new(HttpProber::new(config.monitoring.probe_timeout())?);
    let executor = Arc::new(CheckExecutor::new(
        database.clone(),
        prober,
        bus.clone(),
        config.monitoring.probe_timeout(),
    ));
    let scheduler = Arc::new(
        FleetScheduler::new(database.clone(), executor.clone(), config.monitoring.sweep_interval())
            .sweep_on_start(config.monitoring.sweep_on_start),
    );
    let timer = scheduler.clone().start();

    let state = web::Data::new(AppState { executor, scheduler, status: StatusReader::new(database) });

    info!(%addr, "HTTP server listening");
    let served = HttpServer::new(move || App::new().app_data(state.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await;

    timer.abort();
    bus.close();
    if tokio::time::timeout(SHUTDOWN_DRAIN, notifications.stopped()).await.is_err() {
        warn!("notification subscriber did not drain before shutdown");
    }

    served?;
    Ok(())
}
