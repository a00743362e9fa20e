//! Minimal Telegram Bot API client and long-polling loop.
//!
//! We only call `getUpdates` and `sendMessage`. Calls are instrumented and log method
//! names, chat ids and sizes; message contents and the bot token are never logged.

use std::{sync::Arc, time::Duration};

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::dialogue::{handle_incoming, Reply};
use crate::state::AppState;

const RETRY_BACKOFF: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum TelegramError {
  #[error("telegram http error: {0}")]
  Http(#[from] reqwest::Error),
  #[error("telegram api error {code}: {description}")]
  Api { code: i64, description: String },
  #[error("telegram response had ok=true but no result")]
  MissingResult,
}

#[derive(Clone)]
pub struct Telegram {
  client: reqwest::Client,
  token: String,
  pub base_url: String,
  pub poll_timeout_secs: u64,
}

//
// Wire types (subset of the Bot API)
//

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
  ok: bool,
  #[serde(default = "Option::default")]
  result: Option<T>,
  #[serde(default)]
  description: Option<String>,
  #[serde(default)]
  error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
  pub update_id: i64,
  #[serde(default)]
  pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
  pub chat: Chat,
  #[serde(default)]
  pub from: Option<User>,
  #[serde(default)]
  pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
  pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
  pub id: i64,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
  #[serde(skip_serializing_if = "Option::is_none")]
  offset: Option<i64>,
  timeout: u64,
  allowed_updates: [&'static str; 1],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
  chat_id: i64,
  text: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  parse_mode: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  reply_markup: Option<ReplyKeyboardMarkup<'a>>,
}

#[derive(Debug, Serialize)]
struct ReplyKeyboardMarkup<'a> {
  keyboard: Vec<Vec<KeyboardButton<'a>>>,
  one_time_keyboard: bool,
  resize_keyboard: bool,
}

#[derive(Debug, Serialize)]
struct KeyboardButton<'a> {
  text: &'a str,
}

fn send_message_body(chat_id: i64, reply: &Reply) -> SendMessage<'_> {
  SendMessage {
    chat_id,
    text: &reply.text,
    parse_mode: reply.markdown.then_some("Markdown"),
    reply_markup: reply.keyboard.as_ref().map(|rows| ReplyKeyboardMarkup {
      keyboard: rows
        .iter()
        .map(|row| row.iter().map(|label| KeyboardButton { text: label }).collect())
        .collect(),
      one_time_keyboard: true,
      resize_keyboard: true,
    }),
  }
}

/// Ledger/session key for a Telegram user.
pub fn user_key(user_id: i64) -> String {
  format!("tg:{}", user_id)
}

impl Telegram {
  /// Construct the client if we find TELEGRAM_BOT_TOKEN; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let token = std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|t| !t.trim().is_empty())?;
    let base_url =
      std::env::var("TELEGRAM_API_URL").unwrap_or_else(|_| "https://api.telegram.org".into());
    let poll_timeout_secs = std::env::var("TELEGRAM_POLL_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(30);
    Self::new(token, base_url, poll_timeout_secs)
  }

  pub fn new(token: String, base_url: String, poll_timeout_secs: u64) -> Option<Self> {
    // Long polls hold the connection open; give the HTTP timeout headroom.
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(poll_timeout_secs.saturating_add(10)))
      .build()
      .map_err(|e| error!(target: "telegram", error = %e, "Failed to build HTTP client"))
      .ok()?;
    Some(Self { client, token, base_url: base_url.trim_end_matches('/').to_string(), poll_timeout_secs })
  }

  fn method_url(&self, method: &str) -> String {
    format!("{}/bot{}/{}", self.base_url, self.token, method)
  }

  async fn call<B: Serialize, T: DeserializeOwned>(&self, method: &str, body: &B) -> Result<T, TelegramError> {
    let res = self
      .client
      .post(self.method_url(method))
      .header(USER_AGENT, "engquiz-bot/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(body)
      .send()
      .await?;
    let status = res.status();
    let body: ApiResponse<T> = res.json().await?;
    if !body.ok {
      return Err(TelegramError::Api {
        code: body.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
        description: body.description.unwrap_or_default(),
      });
    }
    body.result.ok_or(TelegramError::MissingResult)
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
    let req = GetUpdates { offset, timeout: self.poll_timeout_secs, allowed_updates: ["message"] };
    self.call("getUpdates", &req).await
  }

  #[instrument(level = "debug", skip(self, reply), fields(text_len = reply.text.len(), markdown = reply.markdown))]
  pub async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<(), TelegramError> {
    match self.send_message(chat_id, reply).await {
      // Exercise text can carry characters legacy Markdown cannot parse; send it plain.
      Err(TelegramError::Api { code: 400, description }) if reply.markdown => {
        warn!(target: "telegram", chat_id, %description, "Markdown rejected; resending as plain text");
        let plain = Reply { markdown: false, ..reply.clone() };
        self.send_message(chat_id, &plain).await
      }
      other => other,
    }
  }

  async fn send_message(&self, chat_id: i64, reply: &Reply) -> Result<(), TelegramError> {
    let _sent: serde_json::Value = self.call("sendMessage", &send_message_body(chat_id, reply)).await?;
    Ok(())
  }
}

/// Poll for updates forever, handling one update at a time.
#[instrument(level = "info", skip_all)]
pub async fn run_polling(tg: Telegram, state: Arc<AppState>) {
  info!(target: "telegram", base_url = %tg.base_url, poll_timeout_secs = tg.poll_timeout_secs, "Telegram polling started");
  let mut offset: Option<i64> = None;
  loop {
    match poll_once(&tg, &state, offset).await {
      Ok(next) => offset = next,
      Err(e) => {
        warn!(target: "telegram", error = %e, "getUpdates failed; retrying");
        tokio::time::sleep(RETRY_BACKOFF).await;
      }
    }
  }
}

/// One `getUpdates` round. Returns the offset that acknowledges everything handled.
async fn poll_once(tg: &Telegram, state: &AppState, offset: Option<i64>) -> Result<Option<i64>, TelegramError> {
  let updates = tg.get_updates(offset).await?;
  let mut next = offset;
  for update in updates {
    next = Some(update.update_id + 1);
    handle_update(tg, state, update).await;
  }
  Ok(next)
}

async fn handle_update(tg: &Telegram, state: &AppState, update: Update) {
  let Some(Message { chat, from, text: Some(text) }) = update.message else {
    debug!(target: "telegram", update_id = update.update_id, "Skipping non-text update");
    return;
  };
  let user = user_key(from.map(|u| u.id).unwrap_or(chat.id));
  let replies = handle_incoming(state, &user, &text).await;
  for reply in &replies {
    if let Err(e) = tg.send_reply(chat.id, reply).await {
      error!(target: "telegram", chat_id = chat.id, error = %e, "sendMessage failed");
      break;
    }
  }
}
