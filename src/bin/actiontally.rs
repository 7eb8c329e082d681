//! actiontally: usage event aggregation service
//!
//! Accepts usage events over HTTP and keeps one counter record per
//! `(user_id, action)` pair per month.
//!
//! ## Architecture
//! ```text
//! [clients] -> [HTTP API :8000] -> [Ledger] -> [TreeStore]
//!                                                  |
//!                                     memory | Firebase Realtime Database
//! ```
//!
//! ## Configuration
//! - First argument: path to a YAML config file (optional)
//! - ACTIONTALLY_CONFIG: path to a YAML config file
//! - ACTIONTALLY__<SECTION>__<KEY>: individual overrides
//! - FIREBASE_CONFIG: Firebase client config JSON (`{"databaseURL": ...}`)
//! - ACTIONTALLY_LOG / ACTIONTALLY_LOG_FORMAT: log filter and format

use std::sync::Arc;

use tracing::{info, warn};

use actiontally::config::Config;
use actiontally::http;
use actiontally::ledger::Ledger;
use actiontally::storage::init_backend;
use actiontally::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;

    info!(
        backend = ?config.backend.backend_type,
        address = %config.server.bind_address(),
        "starting actiontally"
    );

    let store = init_backend(&config.backend).await?;
    let ledger = Arc::new(Ledger::new(store, &config.ledger));

    http::serve(ledger, &config.server, shutdown_signal()).await?;

    info!("actiontally stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
