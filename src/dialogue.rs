//! Conversation state machine shared by the Telegram and HTTP/WebSocket transports.
//!
//! Flow per user:
//!   ChoosingLevel -> ChoosingTask -> DoingTask <-> ChoosingAction
//!
//! Raw text is first matched against commands (`/start`, `/score`), then filtered by
//! the current phase into a typed `Input`. Anything the filter rejects is dropped
//! without a reply or a state change. Termination removes the session; only `/start`
//! opens a new one.

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::Messages;
use crate::domain::{Action, Keyboard, Level, Phase, Session, TaskType};
use crate::state::AppState;
use crate::util::{fill_template, trunc_for_log};

/// One outgoing message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reply {
  pub text: String,
  /// Render `text` as Telegram Markdown.
  pub markdown: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub keyboard: Option<Keyboard>,
}

impl Reply {
  pub fn text(text: impl Into<String>) -> Self {
    Self { text: text.into(), markdown: false, keyboard: None }
  }

  pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
    self.keyboard = Some(keyboard);
    self
  }

  pub fn markdown(mut self) -> Self {
    self.markdown = true;
    self
  }
}

/// Slash commands understood in every phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
  Start,
  Score,
}

impl Command {
  /// Accepts `/start`, `/start@SomeBot` and trailing arguments.
  pub fn parse(text: &str) -> Option<Self> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    match name {
      "start" => Some(Command::Start),
      "score" => Some(Command::Score),
      _ => None,
    }
  }
}

/// Text after the per-phase filter.
#[derive(Debug)]
enum Input {
  Level(Level),
  Task(TaskType),
  Answer(String),
  Action(Action),
}

fn filter_input(phase: Phase, text: &str) -> Option<Input> {
  match phase {
    Phase::ChoosingLevel => Level::from_label(text).map(Input::Level),
    Phase::ChoosingTask => TaskType::from_label(text).map(Input::Task),
    Phase::DoingTask => {
      let answer = text.trim();
      (!answer.is_empty()).then(|| Input::Answer(answer.to_string()))
    }
    Phase::ChoosingAction => Action::from_label(text).map(Input::Action),
  }
}

enum Next {
  To(Phase),
  End,
}

type Step = (Vec<Reply>, Next);

/// Entry point for transports: commands first, then the state machine.
///
/// One message per user is processed at a time, whichever transport it came from.
#[instrument(level = "info", skip(state, text), fields(%user, text_len = text.len()))]
pub async fn handle_incoming(state: &AppState, user: &str, text: &str) -> Vec<Reply> {
  let _turn = state.sessions.lock_user(user).await;
  match Command::parse(text) {
    Some(Command::Start) => open_session(state, user).await,
    Some(Command::Score) => score(state, user).await,
    None => handle_text(state, user, text).await,
  }
}

/// Open a fresh session in `ChoosingLevel`, replacing any previous one.
pub async fn start(state: &AppState, user: &str) -> Vec<Reply> {
  let _turn = state.sessions.lock_user(user).await;
  open_session(state, user).await
}

async fn open_session(state: &AppState, user: &str) -> Vec<Reply> {
  let replaced = state.sessions.get(user).await.is_some();
  state.sessions.set(user, Session::new()).await;
  info!(target: "dialogue", %user, replaced, "Conversation started");
  vec![Reply::text(&state.messages.start).with_keyboard(Level::keyboard())]
}

async fn score(state: &AppState, user: &str) -> Vec<Reply> {
  let total = state.ledger.score(user).await.to_string();
  let text = fill_template(&state.messages.score, &[("score", total.as_str())]);
  vec![Reply::text(text)]
}

/// Feed one free-text message into the user's conversation. Caller holds the user's turn.
async fn handle_text(state: &AppState, user: &str, text: &str) -> Vec<Reply> {
  let Some(mut session) = state.sessions.get(user).await else {
    debug!(target: "dialogue", %user, text = %trunc_for_log(text, 40), "No active session; input ignored");
    return Vec::new();
  };
  let from = session.phase;
  let Some(input) = filter_input(from, text) else {
    debug!(target: "dialogue", %user, phase = ?from, text = %trunc_for_log(text, 40), "Input rejected by phase filter");
    return Vec::new();
  };

  let (replies, next) = match input {
    Input::Level(level) => on_level(&state.messages, &mut session, level),
    Input::Task(task_type) => on_task(state, &mut session, task_type),
    Input::Answer(answer) => on_answer(state, user, &mut session, &answer).await,
    Input::Action(action) => on_action(state, &mut session, action),
  };

  match next {
    Next::To(to) => {
      session.phase = to;
      if from != to {
        info!(target: "dialogue", %user, ?from, ?to, "Phase transition");
      }
      state.sessions.set(user, session).await;
    }
    Next::End => {
      state.sessions.remove(user).await;
      info!(target: "dialogue", %user, ?from, "Conversation terminated");
    }
  }
  replies
}

fn on_level(m: &Messages, session: &mut Session, level: Level) -> Step {
  session.level = Some(level);
  let text = fill_template(&m.level_chosen, &[("level", level.name())]);
  (vec![Reply::text(text).with_keyboard(TaskType::keyboard())], Next::To(Phase::ChoosingTask))
}

fn on_task(state: &AppState, session: &mut Session, task_type: TaskType) -> Step {
  let m = &state.messages;
  let Some(level) = session.level else { return recover(m, session) };

  // No exercises behind this button; keep the user on the task-type choice.
  if task_type == TaskType::GetPoints {
    let reply = Reply::text(&m.points_unavailable).with_keyboard(TaskType::keyboard());
    return (vec![reply], Next::To(Phase::ChoosingTask));
  }

  match state.catalog.select_task(level, task_type) {
    Some(task) => {
      debug!(target: "dialogue", ?level, ?task_type, task = %trunc_for_log(&task, 40), "Task selected");
      let chosen = fill_template(&m.task_chosen, &[("task_type", task_type.label())]);
      let replies = vec![Reply::text(chosen), exercise_reply(m, task_type, &task)];
      session.task_type = Some(task_type);
      session.current_task = Some(task);
      (replies, Next::To(Phase::DoingTask))
    }
    None => not_found(m, level, task_type),
  }
}

async fn on_answer(state: &AppState, user: &str, session: &mut Session, answer: &str) -> Step {
  let m = &state.messages;
  let (Some(level), Some(task_type), Some(task)) = (session.level, session.task_type, session.current_task.clone())
  else {
    return recover(m, session);
  };

  let correct = state.judge.judge(&task, answer);
  info!(target: "dialogue", %user, ?level, ?task_type, correct, answer_len = answer.len(), "Answer judged");

  if correct {
    let total = state.ledger.award_points(user, level).await.to_string();
    let replies = vec![
      Reply::text(fill_template(&m.correct, &[("score", total.as_str())])),
      Reply::text(&m.next_action).with_keyboard(Action::keyboard()),
    ];
    (replies, Next::To(Phase::ChoosingAction))
  } else {
    let replies = vec![Reply::text(&m.incorrect), exercise_reply(m, task_type, &task)];
    (replies, Next::To(Phase::DoingTask))
  }
}

fn on_action(state: &AppState, session: &mut Session, action: Action) -> Step {
  let m = &state.messages;
  match action {
    Action::Continue => {
      let (Some(level), Some(task_type)) = (session.level, session.task_type) else {
        return recover(m, session);
      };
      match state.catalog.select_task(level, task_type) {
        Some(task) => {
          let replies = vec![exercise_reply(m, task_type, &task)];
          session.current_task = Some(task);
          (replies, Next::To(Phase::DoingTask))
        }
        None => not_found(m, level, task_type),
      }
    }
    Action::ChangeLevel => {
      let reply = Reply::text(&m.change_level).with_keyboard(Level::keyboard());
      (vec![reply], Next::To(Phase::ChoosingLevel))
    }
    Action::ChangeTaskType => {
      let reply = Reply::text(&m.change_task_type).with_keyboard(TaskType::keyboard());
      (vec![reply], Next::To(Phase::ChoosingTask))
    }
  }
}

fn exercise_reply(m: &Messages, task_type: TaskType, task: &str) -> Reply {
  match task_type {
    TaskType::TranslateWord => Reply::text(fill_template(&m.task_word, &[("task", task)])).markdown(),
    _ => Reply::text(fill_template(&m.task_generic, &[("task", task)])),
  }
}

fn not_found(m: &Messages, level: Level, task_type: TaskType) -> Step {
  info!(target: "dialogue", ?level, ?task_type, "No exercise for this level and task type");
  (vec![Reply::text(&m.task_not_found)], Next::End)
}

/// Session data is missing something the current phase needs; step back to the
/// closest choice that can supply it.
fn recover(m: &Messages, session: &mut Session) -> Step {
  session.current_task = None;
  if session.level.is_some() {
    let reply = Reply::text(&m.change_task_type).with_keyboard(TaskType::keyboard());
    (vec![reply], Next::To(Phase::ChoosingTask))
  } else {
    let reply = Reply::text(&m.change_level).with_keyboard(Level::keyboard());
    (vec![reply], Next::To(Phase::ChoosingLevel))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::catalog::ExerciseCatalog;
  use crate::config::BotConfig;
  use crate::judge::AnswerJudge;

  struct FixedJudge(bool);

  impl AnswerJudge for FixedJudge {
    fn judge(&self, _exercise: &str, _answer: &str) -> bool { self.0 }
  }

  #[derive(Default)]
  struct RecordingJudge(Mutex<Vec<(String, String)>>);

  impl AnswerJudge for RecordingJudge {
    fn judge(&self, exercise: &str, answer: &str) -> bool {
      self.0.lock().unwrap().push((exercise.to_string(), answer.to_string()));
      false
    }
  }

  struct SlowJudge;

  impl AnswerJudge for SlowJudge {
    fn judge(&self, _exercise: &str, _answer: &str) -> bool {
      std::thread::sleep(std::time::Duration::from_millis(5));
      true
    }
  }

  fn app(correct: bool) -> AppState {
    AppState::from_config(BotConfig::default()).with_judge(Arc::new(FixedJudge(correct)))
  }

  /// Drive a user to `DoingTask` on beginner word translation.
  async fn to_doing_task(state: &AppState, user: &str) -> Vec<Reply> {
    handle_incoming(state, user, "/start").await;
    handle_incoming(state, user, "Новичок").await;
    handle_incoming(state, user, "Перевести слово").await
  }

  fn word_in(reply: &Reply) -> String {
    reply
      .text
      .strip_prefix("Переведи слово: *")
      .and_then(|s| s.strip_suffix('*'))
      .expect("word exercise format")
      .to_string()
  }

  #[tokio::test]
  async fn start_prompts_for_level() {
    let state = app(true);
    let replies = handle_incoming(&state, "u", "/start").await;
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].text, Messages::default().start);
    assert_eq!(replies[0].keyboard, Some(Level::keyboard()));
    assert_eq!(state.sessions.phase("u").await, Some(Phase::ChoosingLevel));
  }

  #[tokio::test]
  async fn choosing_a_level_stores_it_and_offers_task_types() {
    let state = app(true);
    handle_incoming(&state, "u", "/start").await;
    let replies = handle_incoming(&state, "u", "Новичок").await;

    assert!(replies[0].text.contains("Ты выбрал уровень новичок."));
    assert_eq!(replies[0].keyboard, Some(TaskType::keyboard()));
    let session = state.sessions.get("u").await.unwrap();
    assert_eq!(session.level, Some(Level::Beginner));
    assert_eq!(session.phase, Phase::ChoosingTask);
  }

  #[tokio::test]
  async fn word_task_is_drawn_from_the_beginner_list() {
    let state = app(true);
    let replies = to_doing_task(&state, "u").await;

    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].text, "Ты выбрал задание Перевести слово. Мы начинаем!");
    assert!(replies[1].markdown);
    let word = word_in(&replies[1]);
    let list = state.catalog.list(Level::Beginner, TaskType::TranslateWord).unwrap();
    assert!(list.contains(&word));

    let session = state.sessions.get("u").await.unwrap();
    assert_eq!(session.phase, Phase::DoingTask);
    assert_eq!(session.current_task.as_deref(), Some(word.as_str()));
    assert_eq!(session.task_type, Some(TaskType::TranslateWord));
  }

  #[tokio::test]
  async fn text_tasks_use_the_generic_format() {
    let state = app(true);
    handle_incoming(&state, "u", "/start").await;
    handle_incoming(&state, "u", "Средний").await;
    let replies = handle_incoming(&state, "u", "Перевести текст").await;
    assert!(replies[1].text.starts_with("Задание: "));
    assert!(!replies[1].markdown);
  }

  #[tokio::test]
  async fn get_points_stays_on_task_choice_without_an_exercise() {
    let state = app(true);
    handle_incoming(&state, "u", "/start").await;
    handle_incoming(&state, "u", "Новичок").await;
    let replies = handle_incoming(&state, "u", "Получить очки").await;

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].text, "К сожалению, сейчас получить очки другим способом нельзя.");
    assert_eq!(replies[0].keyboard, Some(TaskType::keyboard()));
    let session = state.sessions.get("u").await.unwrap();
    assert_eq!(session.phase, Phase::ChoosingTask);
    assert!(session.current_task.is_none());
  }

  #[tokio::test]
  async fn correct_answer_awards_level_points_and_asks_next_action() {
    let state = app(true);
    handle_incoming(&state, "u", "/start").await;
    handle_incoming(&state, "u", "Высокий").await;
    handle_incoming(&state, "u", "Дополнить перевод").await;
    let replies = handle_incoming(&state, "u", "whatever").await;

    assert_eq!(replies[0].text, "Правильно! Твой счет теперь: 3");
    assert_eq!(replies[1].text, "Что ты хочешь сделать дальше?");
    assert_eq!(replies[1].keyboard, Some(Action::keyboard()));
    assert_eq!(state.ledger.score("u").await, 3);
    assert_eq!(state.sessions.phase("u").await, Some(Phase::ChoosingAction));
  }

  #[tokio::test]
  async fn wrong_answer_repeats_the_same_exercise() {
    let state = app(false);
    let shown = to_doing_task(&state, "u").await;
    let word = word_in(&shown[1]);

    for _ in 0..3 {
      let replies = handle_incoming(&state, "u", "неверно").await;
      assert_eq!(replies[0].text, "Неправильно. Попробуй еще раз.");
      assert_eq!(word_in(&replies[1]), word);
    }
    assert_eq!(state.ledger.score("u").await, 0);
    assert_eq!(state.sessions.phase("u").await, Some(Phase::DoingTask));
  }

  #[tokio::test]
  async fn judge_sees_current_exercise_and_trimmed_answer() {
    let judge = Arc::new(RecordingJudge::default());
    let state = AppState::from_config(BotConfig::default()).with_judge(judge.clone());
    let shown = to_doing_task(&state, "u").await;
    handle_incoming(&state, "u", "  яблоко ").await;

    let calls = judge.0.lock().unwrap().clone();
    assert_eq!(calls, vec![(word_in(&shown[1]), "яблоко".to_string())]);
  }

  #[tokio::test]
  async fn continue_serves_another_task_of_the_same_type() {
    let state = app(true);
    to_doing_task(&state, "u").await;
    handle_incoming(&state, "u", "answer").await;
    let replies = handle_incoming(&state, "u", "Продолжить").await;

    assert_eq!(replies.len(), 1);
    let word = word_in(&replies[0]);
    let session = state.sessions.get("u").await.unwrap();
    assert_eq!(session.phase, Phase::DoingTask);
    assert_eq!(session.current_task, Some(word));
  }

  #[tokio::test]
  async fn legacy_continue_caption_is_accepted() {
    let state = app(true);
    to_doing_task(&state, "u").await;
    handle_incoming(&state, "u", "answer").await;
    let replies = handle_incoming(&state, "u", "Продолжить🫡").await;
    assert_eq!(replies.len(), 1);
    assert_eq!(state.sessions.phase("u").await, Some(Phase::DoingTask));
  }

  #[tokio::test]
  async fn change_level_returns_to_level_choice() {
    let state = app(true);
    to_doing_task(&state, "u").await;
    handle_incoming(&state, "u", "answer").await;
    let replies = handle_incoming(&state, "u", "Сменить уровень").await;

    assert_eq!(replies[0].text, "Какой уровень ты хочешь выбрать?");
    assert_eq!(replies[0].keyboard, Some(Level::keyboard()));
    assert_eq!(state.sessions.phase("u").await, Some(Phase::ChoosingLevel));

    handle_incoming(&state, "u", "Носитель").await;
    handle_incoming(&state, "u", "Перевести слово").await;
    handle_incoming(&state, "u", "answer").await;
    assert_eq!(state.ledger.score("u").await, 1 + 4);
  }

  #[tokio::test]
  async fn change_task_type_returns_to_task_choice() {
    let state = app(true);
    to_doing_task(&state, "u").await;
    handle_incoming(&state, "u", "answer").await;
    let replies = handle_incoming(&state, "u", "Сменить тип задания").await;
    assert_eq!(replies[0].keyboard, Some(TaskType::keyboard()));
    assert_eq!(state.sessions.phase("u").await, Some(Phase::ChoosingTask));
  }

  #[tokio::test]
  async fn missing_exercise_list_terminates_the_conversation() {
    let mut catalog = ExerciseCatalog::empty();
    catalog.insert(Level::Beginner, TaskType::TranslateWord, vec!["cat".into()]);
    let state = app(true).with_catalog(catalog);

    handle_incoming(&state, "u", "/start").await;
    handle_incoming(&state, "u", "Новичок").await;
    let replies = handle_incoming(&state, "u", "Перевести текст").await;

    assert_eq!(replies, vec![Reply::text(Messages::default().task_not_found)]);
    assert!(state.sessions.get("u").await.is_none());
    assert!(handle_incoming(&state, "u", "Перевести слово").await.is_empty());

    // A new start trigger opens a fresh session.
    handle_incoming(&state, "u", "/start").await;
    assert_eq!(state.sessions.phase("u").await, Some(Phase::ChoosingLevel));
  }

  #[tokio::test]
  async fn continue_without_exercises_terminates() {
    let state = app(true);
    to_doing_task(&state, "u").await;
    handle_incoming(&state, "u", "answer").await;

    // Same sessions/ledger, catalog emptied.
    let emptied = state.clone().with_catalog(ExerciseCatalog::empty());
    let replies = handle_incoming(&emptied, "u", "Продолжить").await;
    assert_eq!(replies[0].text, Messages::default().task_not_found);
    assert!(state.sessions.get("u").await.is_none());
  }

  #[tokio::test]
  async fn unmatched_input_leaves_state_unchanged() {
    let state = app(true);
    handle_incoming(&state, "u", "/start").await;
    for text in ["Эксперт", "новичок", "Перевести слово", "", "/help"] {
      assert!(handle_incoming(&state, "u", text).await.is_empty());
      assert_eq!(state.sessions.phase("u").await, Some(Phase::ChoosingLevel));
    }

    handle_incoming(&state, "u", "Новичок").await;
    assert!(handle_incoming(&state, "u", "Новичок").await.is_empty());
    assert_eq!(state.sessions.phase("u").await, Some(Phase::ChoosingTask));
  }

  #[tokio::test]
  async fn text_without_session_is_ignored() {
    let state = app(true);
    assert!(handle_incoming(&state, "stranger", "Новичок").await.is_empty());
    assert!(state.sessions.get("stranger").await.is_none());
  }

  #[tokio::test]
  async fn start_mid_conversation_resets_the_session() {
    let state = app(true);
    to_doing_task(&state, "u").await;
    handle_incoming(&state, "u", "/start@EngQuizBot").await;
    let session = state.sessions.get("u").await.unwrap();
    assert_eq!(session.phase, Phase::ChoosingLevel);
    assert!(session.level.is_none());
    assert!(session.current_task.is_none());
  }

  #[tokio::test]
  async fn score_command_reports_total_without_touching_the_session() {
    let state = app(true);
    assert_eq!(handle_incoming(&state, "u", "/score").await[0].text, "Твой счет: 0");

    to_doing_task(&state, "u").await;
    handle_incoming(&state, "u", "/score").await;
    assert_eq!(state.sessions.phase("u").await, Some(Phase::DoingTask));
    handle_incoming(&state, "u", "answer").await;
    assert_eq!(handle_incoming(&state, "u", "/score").await[0].text, "Твой счет: 1");
  }

  #[tokio::test]
  async fn users_have_separate_sessions_and_scores() {
    let state = app(true);
    to_doing_task(&state, "a").await;
    handle_incoming(&state, "b", "/start").await;
    handle_incoming(&state, "a", "answer").await;

    assert_eq!(state.sessions.phase("a").await, Some(Phase::ChoosingAction));
    assert_eq!(state.sessions.phase("b").await, Some(Phase::ChoosingLevel));
    assert_eq!(state.ledger.score("b").await, 0);
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
  async fn concurrent_answers_to_one_exercise_pay_out_once() {
    for _ in 0..20 {
      let state = Arc::new(AppState::from_config(BotConfig::default()).with_judge(Arc::new(SlowJudge)));
      to_doing_task(&state, "u").await;

      let tasks: Vec<_> = (0..16)
        .map(|_| {
          let state = state.clone();
          tokio::spawn(async move { handle_incoming(&state, "u", "answer").await })
        })
        .collect();
      for t in tasks {
        t.await.unwrap();
      }

      assert_eq!(state.ledger.score("u").await, 1);
      assert_eq!(state.sessions.phase("u").await, Some(Phase::ChoosingAction));
    }
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn start_is_not_undone_by_a_concurrent_answer() {
    let state = Arc::new(AppState::from_config(BotConfig::default()).with_judge(Arc::new(SlowJudge)));
    to_doing_task(&state, "u").await;

    let answering = {
      let state = state.clone();
      tokio::spawn(async move { handle_incoming(&state, "u", "answer").await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    start(&state, "u").await;
    answering.await.unwrap();

    // The answer either finished before /start or was filtered after it; a stale
    // write-back of the answering step must never win.
    assert_eq!(state.sessions.phase("u").await, Some(Phase::ChoosingLevel));
  }

  #[test]
  fn command_parsing() {
    assert_eq!(Command::parse("/start"), Some(Command::Start));
    assert_eq!(Command::parse("  /start@EngQuizBot payload"), Some(Command::Start));
    assert_eq!(Command::parse("/score"), Some(Command::Score));
    assert_eq!(Command::parse("/help"), None);
    assert_eq!(Command::parse("start"), None);
    assert_eq!(Command::parse(""), None);
  }
}
