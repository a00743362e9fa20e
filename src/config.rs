//! Loading bot configuration (message templates, exercise overrides, judge policy,
//! session eviction) from TOML.
//!
//! See `BotConfig` and `Messages` for the expected schema. Every section is optional.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Level, TaskType};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct BotConfig {
  #[serde(default)]
  pub messages: Messages,
  #[serde(default)]
  pub judge: JudgeCfg,
  #[serde(default)]
  pub sessions: SessionsCfg,
  #[serde(default)]
  pub exercises: Vec<ExerciseCfg>,
}

/// Exercise list accepted in TOML configuration. Replaces the built-in list for the pair.
#[derive(Clone, Debug, Deserialize)]
pub struct ExerciseCfg {
  pub level: Level,
  pub task_type: TaskType,
  #[serde(default)]
  pub items: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct JudgeCfg {
  /// Probability that an answer is accepted by the coin-flip judge.
  pub correct_probability: f64,
}

impl Default for JudgeCfg {
  fn default() -> Self {
    Self { correct_probability: 0.5 }
  }
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct SessionsCfg {
  /// Drop sessions idle for longer than this. 0 keeps them forever.
  pub idle_timeout_secs: u64,
}

/// User-facing texts. Placeholders: `{level}`, `{task_type}`, `{task}`, `{score}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Messages {
  pub start: String,
  pub level_chosen: String,
  pub points_unavailable: String,
  pub task_chosen: String,
  pub task_word: String,
  pub task_generic: String,
  pub task_not_found: String,
  pub correct: String,
  pub next_action: String,
  pub incorrect: String,
  pub change_level: String,
  pub change_task_type: String,
  pub score: String,
}

impl Default for Messages {
  fn default() -> Self {
    Self {
      start: "Привет! Я бот для изучения английского языка. Какой у тебя уровень владения английским языком?".into(),
      level_chosen: "Отлично! Ты выбрал уровень {level}. Давай порешаем немного заданий, за каждое задание ты будешь получать очки (пока что они бесполезные). С какого типа заданий хочешь начать?".into(),
      points_unavailable: "К сожалению, сейчас получить очки другим способом нельзя.".into(),
      task_chosen: "Ты выбрал задание {task_type}. Мы начинаем!".into(),
      task_word: "Переведи слово: *{task}*".into(),
      task_generic: "Задание: {task}".into(),
      task_not_found: "К сожалению, для данного уровня и типа задания задание не найдено.".into(),
      correct: "Правильно! Твой счет теперь: {score}".into(),
      next_action: "Что ты хочешь сделать дальше?".into(),
      incorrect: "Неправильно. Попробуй еще раз.".into(),
      change_level: "Какой уровень ты хочешь выбрать?".into(),
      change_task_type: "Какой тип задания ты хочешь выбрать?".into(),
      score: "Твой счет: {score}".into(),
    }
  }
}

/// Attempt to load `BotConfig` from QUIZ_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_bot_config_from_env() -> Option<BotConfig> {
  let path = std::env::var("QUIZ_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_bot_config(&s) {
      Ok(cfg) => {
        info!(target: "quiz_bot", %path, exercise_lists = cfg.exercises.len(), "Loaded bot config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "quiz_bot", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quiz_bot", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_bot_config(s: &str) -> Result<BotConfig, toml::de::Error> {
  toml::from_str::<BotConfig>(s)
}
