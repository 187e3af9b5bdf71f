//! FitChallenge · random fitness-challenge backend
//!
//! - Axum HTTP + WebSocket API
//! - SQLite persistence for the challenge bank, completion history and stats
//! - Periodic "time for a challenge" reminders pushed over WebSocket
//!
//! Important env variables:
//!   PORT            : u16 (default 3000)
//!   DATABASE_PATH   : SQLite file (default ~/.rfc/rfc_database.db)
//!   APP_CONFIG_PATH : path to TOML config (database path, reminder defaults, challenge bank)
//!   LOG_LEVEL       : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT      : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod store;
mod config;
mod seeds;
mod rotation;
mod tracker;
mod reset;
mod timer;
mod notifications;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::load_app_config_from_env;
use crate::notifications::run_reminders;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  telemetry::init_tracing()?;

  let cfg = load_app_config_from_env().unwrap_or_default();
  let db_path = cfg.database_path();
  let db = Database::open(&db_path)
    .with_context(|| format!("opening database at {}", db_path.display()))?;
  info!(target: "fitchallenge_backend", path = %db_path.display(), "Database ready");

  // Seeds an empty bank and loads reminder settings.
  let state = Arc::new(AppState::new(db, &cfg).context("initialising application state")?);

  let reminders = tokio::spawn(run_reminders(state.notifications.subscribe(), state.reminders.clone()));

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([127, 0, 0, 1], port)))
    .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));

  let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
  info!(target: "fitchallenge_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving HTTP")?;

  reminders.abort();
  info!(target: "fitchallenge_backend", "Shut down");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "fitchallenge_backend", error = %e, "Could not listen for Ctrl-C; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "fitchallenge_backend", "Shutdown requested");
}
