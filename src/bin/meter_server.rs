//! Usage meter HTTP server.
//!
//! Configuration comes from `METER_`-prefixed environment variables, key
//! segments separated by a double underscore:
//!
//! | Variable | Effect |
//! |---|---|
//! | `METER_SERVER__ADDR` | bind address (default `0.0.0.0:8080`) |
//! | `METER_DATABASE__URL` | Postgres ledger (needs the `postgres` feature) |
//! | `METER_USAGE__WINDOW_DAYS` | rolling window length |
//! | `METER_CREDIT__SKU__<SKU>` | add or resize a catalog entry |
//! | `METER_POLICY__CAP__<MODE>` | per-mode session cap |
//!
//! Log filtering follows `RUST_LOG`.

use std::sync::Arc;

use tracing::{info, warn};

use usage_meter::config::{ConfigBuilder, MeterSettings};
use usage_meter::ledger::{LedgerFactory, LedgerStore};
use usage_meter::observability::{TracingConfig, init_tracing};
use usage_meter::server::{AppState, create_router};
use usage_meter::MeterEngine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(&TracingConfig::new());

    let provider = ConfigBuilder::new().env_with_prefix("METER_").build();
    let settings = MeterSettings::load(&provider).await?;
    let addr = settings.server_addr;

    let ledger = open_ledger(settings.database_url.as_deref()).await?;
    let engine = MeterEngine::from_settings(settings, ledger);
    info!(
        ledger = engine.ledger_name(),
        skus = engine.catalog().len(),
        window_days = engine.usage().window().num_days(),
        "Engine ready"
    );

    let app = create_router(Arc::new(AppState::new(engine)));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down");
    Ok(())
}

async fn open_ledger(
    database_url: Option<&str>,
) -> Result<Arc<dyn LedgerStore>, Box<dyn std::error::Error>> {
    match database_url {
        #[cfg(feature = "postgres")]
        Some(url) => Ok(LedgerFactory::postgres(url).await?),
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            warn!("database.url is set but the postgres feature is disabled; using the in-memory ledger");
            Ok(LedgerFactory::memory())
        }
        None => {
            warn!("No database.url configured; using the in-memory ledger");
            Ok(LedgerFactory::memory())
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
