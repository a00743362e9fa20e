//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::dialogue::Reply;
use crate::domain::Phase;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Start,
    Message { text: String },
    Score,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Replies {
        replies: Vec<Reply>,
        /// `None` when the conversation has ended (or never started).
        phase: Option<Phase>,
    },
    Score {
        score: u64,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct StartIn {
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageIn {
    pub user: String,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RepliesOut {
    pub replies: Vec<ReplyOut>,
    pub phase: Option<Phase>,
}

/// Owned mirror of `Reply` so tests and clients can read responses back.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyOut {
    pub text: String,
    pub markdown: bool,
    #[serde(default)]
    pub keyboard: Option<Vec<Vec<String>>>,
}

impl From<Reply> for ReplyOut {
    fn from(r: Reply) -> Self {
        Self { text: r.text, markdown: r.markdown, keyboard: r.keyboard }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScoreQuery {
    pub user: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScoreOut {
    pub user: String,
    pub score: u64,
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user: Option<String>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub sessions: usize,
}
