//! EngQuiz · English practice bot
//!
//! - Telegram long polling (when TELEGRAM_BOT_TOKEN is set)
//! - Axum HTTP + WebSocket API driving the same dialogue
//! - In-memory scores and sessions (lost on restart)
//!
//! Important env variables:
//!   PORT                       : u16 (default 3000)
//!   QUIZ_CONFIG_PATH           : path to TOML config (messages, exercises, judge, sessions)
//!   TELEGRAM_BOT_TOKEN         : enables Telegram polling if present
//!   TELEGRAM_API_URL           : default "https://api.telegram.org"
//!   TELEGRAM_POLL_TIMEOUT_SECS : long-poll timeout, default 30
//!   LOG_LEVEL                  : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT                 : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod seeds;
mod catalog;
mod ledger;
mod sessions;
mod judge;
mod state;
mod dialogue;
mod protocol;
mod telegram;
mod routes;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::routes::build_router;
use crate::state::AppState;
use crate::telegram::Telegram;

const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (catalog, ledger, sessions, judge, messages).
  let state = Arc::new(AppState::new());

  let mut background = Vec::new();

  match Telegram::from_env() {
    Some(tg) => background.push(tokio::spawn(telegram::run_polling(tg, state.clone()))),
    None => info!(target: "quiz_bot", "Telegram disabled (no TELEGRAM_BOT_TOKEN). HTTP/WebSocket only."),
  }

  if state.sessions.idle_timeout().is_some() {
    let sessions = state.sessions.clone();
    background.push(tokio::spawn(async move {
      let mut tick = tokio::time::interval(EVICTION_INTERVAL);
      loop {
        tick.tick().await;
        sessions.evict_idle().await;
      }
    }));
  }

  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quiz_bot", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

  for task in background {
    task.abort();
  }
  info!(target: "quiz_bot", "Shut down");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "quiz_bot", error = %e, "Failed to listen for Ctrl-C; running until killed");
    std::future::pending::<()>().await;
  }
  info!(target: "quiz_bot", "Shutdown signal received");
}
