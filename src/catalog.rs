//! Exercise catalog and uniform task selection.
//!
//! The catalog is built once at startup (built-in seeds, then TOML overrides) and is
//! read-only afterwards; selection never mutates it.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{error, info};

use crate::config::ExerciseCfg;
use crate::domain::{Level, TaskType};
use crate::seeds::seed_exercises;

#[derive(Clone, Debug, Default)]
pub struct ExerciseCatalog {
  lists: HashMap<(Level, TaskType), Vec<String>>,
}

impl ExerciseCatalog {
  /// Catalog with no lists at all; every selection returns `None`.
  pub fn empty() -> Self {
    Self::default()
  }

  /// Built-in content only.
  pub fn builtin() -> Self {
    let mut catalog = Self::empty();
    for (level, task_type, items) in seed_exercises() {
      catalog.insert(level, task_type, items.into_iter().map(String::from).collect());
    }
    catalog
  }

  /// Built-in content with config entries replacing whole lists.
  pub fn from_config(overrides: &[ExerciseCfg]) -> Self {
    let mut catalog = Self::builtin();
    for ex in overrides {
      if ex.task_type == TaskType::GetPoints {
        error!(target: "quiz_bot", level = ?ex.level, "Skipping exercise list: get_points has no exercises.");
        continue;
      }
      let items: Vec<String> = ex
        .items
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
      if items.is_empty() {
        error!(target: "quiz_bot", level = ?ex.level, task_type = ?ex.task_type, "Skipping exercise list: no items.");
        continue;
      }
      catalog.insert(ex.level, ex.task_type, items);
    }
    catalog
  }

  /// Replace the list for one pair. Empty lists are stored as absent.
  pub fn insert(&mut self, level: Level, task_type: TaskType, items: Vec<String>) {
    if items.is_empty() {
      self.lists.remove(&(level, task_type));
    } else {
      self.lists.insert((level, task_type), items);
    }
  }

  pub fn list(&self, level: Level, task_type: TaskType) -> Option<&[String]> {
    self.lists.get(&(level, task_type)).map(|v| v.as_slice())
  }

  /// Uniformly pick one exercise for the pair, or `None` when nothing is defined.
  pub fn select_task(&self, level: Level, task_type: TaskType) -> Option<String> {
    self.select_task_with(level, task_type, &mut rand::thread_rng())
  }

  pub fn select_task_with<R: Rng + ?Sized>(&self, level: Level, task_type: TaskType, rng: &mut R) -> Option<String> {
    if task_type == TaskType::GetPoints {
      return None;
    }
    self.list(level, task_type)?.choose(rng).cloned()
  }

  pub fn log_inventory(&self) {
    for level in Level::ALL {
      for task_type in TaskType::ALL {
        let count = self.list(level, task_type).map(|l| l.len()).unwrap_or(0);
        info!(target: "quiz_bot", ?level, ?task_type, count, "Startup exercise inventory");
      }
    }
  }
}
