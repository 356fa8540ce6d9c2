//! evcal-sources - Calendar feed sources service
//!
//! Serves the source management pages and the import action over HTTP,
//! backed by a SQLite database.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evcal_common::config::{resolve_config_path, ServiceConfig};
use evcal_common::db::init_database;
use evcal_sources::db::SqliteSourceRepository;
use evcal_sources::fetcher::HttpSourceFetcher;
use evcal_sources::{build_router, AppState, Settings};

/// Command-line arguments for evcal-sources
#[derive(Parser, Debug)]
#[command(name = "evcal-sources")]
#[command(about = "Calendar feed sources and event import for evcal")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "EVCAL_PORT")]
    port: Option<u16>,

    /// Interface to bind to
    #[arg(long, env = "EVCAL_BIND_ADDR")]
    bind_addr: Option<String>,

    /// SQLite database file
    #[arg(long, env = "EVCAL_DATABASE")]
    database: Option<PathBuf>,

    /// Turn away the new-source form and imports
    #[arg(long, env = "EVCAL_IMPORT_DISABLED")]
    import_disabled: bool,
}

impl Args {
    fn apply(&self, config: &mut ServiceConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind_addr) = &self.bind_addr {
            config.bind_addr = bind_addr.clone();
        }
        if let Some(database) = &self.database {
            config.database_path = database.clone();
        }
        if self.import_disabled {
            config.import_disabled = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evcal_sources=info,evcal_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any database delays
    info!(
        "Starting evcal-sources v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config =
        ServiceConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);

    info!("Database path: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let fetcher = HttpSourceFetcher::new(
        &config.user_agent,
        Duration::from_secs(config.fetch_timeout_secs),
    )?;

    let settings = Settings::from(&config);
    if settings.import_disabled {
        warn!("Imports are disabled by configuration");
    }

    let state = AppState::new(
        Arc::new(SqliteSourceRepository::new(pool)),
        Arc::new(fetcher),
        settings,
    );
    let app = build_router(state);

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("evcal-sources listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
