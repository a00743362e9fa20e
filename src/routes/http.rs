//! HTTP endpoint handlers. These are thin wrappers that forward to the dialogue.
//! Each handler is instrumented and logs the user plus basic result info.

use std::sync::Arc;
use axum::{extract::{State, Query}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::dialogue::{handle_incoming, start, Reply};
use crate::protocol::*;
use crate::state::AppState;

async fn replies_out(state: &AppState, user: &str, replies: Vec<Reply>) -> RepliesOut {
  RepliesOut {
    replies: replies.into_iter().map(ReplyOut::from).collect(),
    phase: state.sessions.phase(user).await,
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, sessions: state.sessions.len().await })
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user))]
pub async fn http_post_start(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartIn>,
) -> impl IntoResponse {
  let replies = start(&state, &body.user).await;
  Json(replies_out(&state, &body.user, replies).await)
}

#[instrument(level = "info", skip(state, body), fields(user = %body.user, text_len = body.text.len()))]
pub async fn http_post_message(
  State(state): State<Arc<AppState>>,
  Json(body): Json<MessageIn>,
) -> impl IntoResponse {
  let replies = handle_incoming(&state, &body.user, &body.text).await;
  let out = replies_out(&state, &body.user, replies).await;
  info!(target: "dialogue", user = %body.user, replies = out.replies.len(), phase = ?out.phase, "HTTP message handled");
  Json(out)
}

#[instrument(level = "info", skip(state), fields(user = %q.user))]
pub async fn http_get_score(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ScoreQuery>,
) -> impl IntoResponse {
  let score = state.ledger.score(&q.user).await;
  Json(ScoreOut { user: q.user, score })
}
