//! Application state shared by every transport.
//!
//! This module owns:
//!   - the read-only exercise catalog
//!   - the score ledger and the session store
//!   - the answer judge
//!   - the message templates (from TOML or defaults)

use std::sync::Arc;
use tracing::{info, instrument};

use crate::catalog::ExerciseCatalog;
use crate::config::{load_bot_config_from_env, BotConfig, Messages};
use crate::judge::{AnswerJudge, CoinFlipJudge};
use crate::ledger::ScoreLedger;
use crate::sessions::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<ExerciseCatalog>,
    pub ledger: ScoreLedger,
    pub sessions: SessionStore,
    pub judge: Arc<dyn AnswerJudge>,
    pub messages: Messages,
}

impl AppState {
    /// Build state from env: load config, build the catalog, pick the judge.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_bot_config_from_env().unwrap_or_default();
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: BotConfig) -> Self {
        let catalog = ExerciseCatalog::from_config(&cfg.exercises);
        catalog.log_inventory();

        let judge = CoinFlipJudge::new(cfg.judge.correct_probability);
        info!(target: "quiz_bot", correct_probability = judge.correct_probability(), "Coin-flip answer judge enabled.");

        let sessions = SessionStore::new(cfg.sessions.idle_timeout_secs);
        match sessions.idle_timeout() {
            Some(t) => info!(target: "quiz_bot", idle_timeout_secs = t.as_secs(), "Idle session eviction enabled."),
            None => info!(target: "quiz_bot", "Idle session eviction disabled."),
        }

        Self {
            catalog: Arc::new(catalog),
            ledger: ScoreLedger::new(),
            sessions,
            judge: Arc::new(judge),
            messages: cfg.messages,
        }
    }

    #[cfg(test)]
    pub fn with_judge(mut self, judge: Arc<dyn AnswerJudge>) -> Self {
        self.judge = judge;
        self
    }

    #[cfg(test)]
    pub fn with_catalog(mut self, catalog: ExerciseCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }
}
