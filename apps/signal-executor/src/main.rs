//! Signal Executor Binary
//!
//! Starts the signal intake server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin signal-executor
//! ```
//!
//! # Environment Variables
//!
//! - `SIGNAL_EXECUTOR_CONFIG`: Config file path (default: config/signal-executor.yaml)
//! - `RUST_LOG`: Log filter (default: from config, then `signal_executor=info`)
//! - Any variable referenced from the config file (`METAAPI_TOKEN`, `REDIS_URL`, ...)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use signal_executor::application::ports::VenuePort;
use signal_executor::application::services::ChannelDispatcher;
use signal_executor::application::use_cases::SignalHandler;
use signal_executor::config::{Config, StoreKind, VenueKind, load_config};
use signal_executor::domain::order_template::OrderTemplates;
use signal_executor::domain::tracked_order::OrderStore;
use signal_executor::infrastructure::broker::{IbkrVenue, MetaApiVenue, PaperVenue};
use signal_executor::infrastructure::http::{AppState, create_router};
use signal_executor::infrastructure::persistence::{InMemoryOrderStore, RedisOrderStore};
use signal_executor::observability::{MetricsConfig, TracingAuditSink, init_metrics};
use signal_executor::telemetry::init_tracing;
use tokio::net::TcpListener;
use tokio::signal;

/// Config file used when `SIGNAL_EXECUTOR_CONFIG` is unset.
const DEFAULT_CONFIG_PATH: &str = "config/signal-executor.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let path = std::env::var("SIGNAL_EXECUTOR_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(Some(&path)).with_context(|| format!("loading {path}"))?;

    init_tracing(&config.observability.logging)?;

    tracing::info!(
        config = %path,
        venue = config.venue.kind.as_str(),
        store = ?config.store.kind,
        lot_size = %config.venue.lot_size,
        "Starting signal executor"
    );

    if let Some(addr) = config.metrics_addr()? {
        init_metrics(&MetricsConfig::with_addr(addr))?;
    }

    match config.venue.kind {
        VenueKind::Metaapi => {
            let venue = MetaApiVenue::new(&config.metaapi())?;
            with_store(&config, Arc::new(venue)).await
        }
        VenueKind::Ibkr => {
            let venue = IbkrVenue::new(config.ibkr())?;
            with_store(&config, Arc::new(venue)).await
        }
        VenueKind::Paper => {
            tracing::warn!("Paper venue selected, no orders reach a broker");
            let venue = PaperVenue::new(config.venue.paper_exit_model);
            with_store(&config, Arc::new(venue)).await
        }
    }
}

/// Build the configured order store and serve.
async fn with_store<V: VenuePort + 'static>(config: &Config, venue: Arc<V>) -> anyhow::Result<()> {
    match config.store.kind {
        StoreKind::Memory => {
            tracing::warn!("In-memory order store selected, records are lost on restart");
            serve(config, venue, Arc::new(InMemoryOrderStore::new())).await
        }
        StoreKind::Redis => {
            let url = config.store.url.as_deref().unwrap_or_default();
            let store = RedisOrderStore::connect(url, config.store_namespace())
                .await
                .context("connecting to redis")?;
            serve(config, venue, Arc::new(store)).await
        }
    }
}

/// Wire the handler, dispatcher and HTTP server, and run until shutdown.
async fn serve<V, S>(config: &Config, venue: Arc<V>, store: Arc<S>) -> anyhow::Result<()>
where
    V: VenuePort + 'static,
    S: OrderStore + 'static,
{
    let templates = OrderTemplates::new(config.venue.lot_size)?;
    let handler = SignalHandler::new(
        Arc::clone(&venue),
        Arc::clone(&store),
        Arc::new(config.contract_table()),
        templates,
        Arc::new(TracingAuditSink),
    );
    let dispatcher = Arc::new(ChannelDispatcher::new(
        Arc::new(handler),
        config.dispatcher,
    ));

    let state = AppState {
        dispatcher: Arc::clone(&dispatcher),
        store,
        venue: venue.name().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let addr: SocketAddr =
        format!("{}:{}", config.server.bind_address, config.server.http_port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, venue = venue.name(), "HTTP server starting");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health");
    tracing::info!("  POST /v1/signals");
    tracing::info!("  GET  /v1/orders/{{channel}}/{{order_id}}?role=MAIN");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.shutdown().await;
    tracing::info!("Signal executor stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
