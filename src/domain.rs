//! Domain models: proficiency levels, task types, post-answer actions and the
//! per-user conversation session.
//!
//! Transport text is parsed into these enums at the boundary (`from_label`), so the
//! dialogue never branches on raw button captions.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Keyboard rows sent alongside a reply; each inner vec is one row of button labels.
pub type Keyboard = Vec<Vec<String>>;

/// Proficiency tier chosen by the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
  Beginner,
  Intermediate,
  Advanced,
  NativeSpeaker,
}

impl Level {
  pub const ALL: [Level; 4] = [Level::Beginner, Level::Intermediate, Level::Advanced, Level::NativeSpeaker];

  /// Button caption.
  pub fn label(self) -> &'static str {
    match self {
      Level::Beginner => "Новичок",
      Level::Intermediate => "Средний",
      Level::Advanced => "Высокий",
      Level::NativeSpeaker => "Носитель",
    }
  }

  /// Lower-case name used inside sentences ("Ты выбрал уровень новичок").
  pub fn name(self) -> &'static str {
    match self {
      Level::Beginner => "новичок",
      Level::Intermediate => "средний",
      Level::Advanced => "высокий",
      Level::NativeSpeaker => "носитель",
    }
  }

  /// Points awarded for one correct answer at this level.
  pub fn points(self) -> u64 {
    match self {
      Level::Beginner => 1,
      Level::Intermediate => 2,
      Level::Advanced => 3,
      Level::NativeSpeaker => 4,
    }
  }

  pub fn from_label(text: &str) -> Option<Self> {
    let text = text.trim();
    Self::ALL.into_iter().find(|l| l.label() == text)
  }

  pub fn keyboard() -> Keyboard {
    vec![Self::ALL.iter().map(|l| l.label().to_string()).collect()]
  }
}

/// Exercise category. `GetPoints` is a pseudo-type with no backing exercises.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
  TranslateText,
  TranslateWord,
  CompleteTranslation,
  GetPoints,
}

impl TaskType {
  pub const ALL: [TaskType; 4] = [
    TaskType::TranslateText,
    TaskType::TranslateWord,
    TaskType::CompleteTranslation,
    TaskType::GetPoints,
  ];

  pub fn label(self) -> &'static str {
    match self {
      TaskType::TranslateText => "Перевести текст",
      TaskType::TranslateWord => "Перевести слово",
      TaskType::CompleteTranslation => "Дополнить перевод",
      TaskType::GetPoints => "Получить очки",
    }
  }

  pub fn from_label(text: &str) -> Option<Self> {
    let text = text.trim();
    Self::ALL.into_iter().find(|t| t.label() == text)
  }

  pub fn keyboard() -> Keyboard {
    vec![Self::ALL.iter().map(|t| t.label().to_string()).collect()]
  }
}

/// What the user wants after a correct answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  Continue,
  ChangeLevel,
  ChangeTaskType,
}

impl Action {
  pub const ALL: [Action; 3] = [Action::Continue, Action::ChangeLevel, Action::ChangeTaskType];

  pub fn label(self) -> &'static str {
    match self {
      Action::Continue => "Продолжить",
      Action::ChangeLevel => "Сменить уровень",
      Action::ChangeTaskType => "Сменить тип задания",
    }
  }

  /// Older keyboards sent "Продолжить🫡"; both captions mean `Continue`.
  pub fn from_label(text: &str) -> Option<Self> {
    let text = text.trim();
    if text == "Продолжить🫡" {
      return Some(Action::Continue);
    }
    Self::ALL.into_iter().find(|a| a.label() == text)
  }

  pub fn keyboard() -> Keyboard {
    vec![Self::ALL.iter().map(|a| a.label().to_string()).collect()]
  }
}

/// Where a conversation currently is. Termination removes the session instead of
/// storing a fifth phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  ChoosingLevel,
  ChoosingTask,
  DoingTask,
  ChoosingAction,
}

/// Ephemeral per-user conversation data.
#[derive(Clone, Debug)]
pub struct Session {
  pub phase: Phase,
  pub level: Option<Level>,
  pub task_type: Option<TaskType>,
  pub current_task: Option<String>,
  pub last_seen: Instant,
}

impl Session {
  pub fn new() -> Self {
    Self {
      phase: Phase::ChoosingLevel,
      level: None,
      task_type: None,
      current_task: None,
      last_seen: Instant::now(),
    }
  }
}

impl Default for Session {
  fn default() -> Self { Self::new() }
}
