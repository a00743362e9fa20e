//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to the dialogue. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    Query, State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};
use uuid::Uuid;

use crate::dialogue::{handle_incoming, start};
use crate::protocol::{ClientWsMessage, ServerWsMessage, WsQuery};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  Query(q): Query<WsQuery>,
  State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
  // Clients may resume under a stable id; otherwise each socket is its own user.
  let user = q
    .user
    .filter(|u| !u.trim().is_empty())
    .unwrap_or_else(|| format!("ws:{}", Uuid::new_v4()));
  info!(target: "quiz_bot", %user, "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, user))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, user: String) {
  info!(target: "quiz_bot", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "quiz_bot", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &user).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "quiz_bot", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "quiz_bot", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, user: &str) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Start => {
      let replies = start(state, user).await;
      ServerWsMessage::Replies { replies, phase: state.sessions.phase(user).await }
    }

    ClientWsMessage::Message { text } => {
      let replies = handle_incoming(state, user, &text).await;
      ServerWsMessage::Replies { replies, phase: state.sessions.phase(user).await }
    }

    ClientWsMessage::Score => ServerWsMessage::Score { score: state.ledger.score(user).await },
  }
}
