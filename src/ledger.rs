//! Per-user score ledger. Scores start at 0 and only ever grow.

use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::domain::Level;

#[derive(Clone, Default)]
pub struct ScoreLedger {
    scores: Arc<RwLock<HashMap<String, u64>>>,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the level's points to the user's total and return the new total.
    #[instrument(level = "debug", skip(self), fields(%user))]
    pub async fn award_points(&self, user: &str, level: Level) -> u64 {
        let mut scores = self.scores.write().await;
        let entry = scores.entry(user.to_string()).or_insert(0);
        *entry += level.points();
        let total = *entry;
        info!(target: "dialogue", %user, ?level, awarded = level.points(), total, "Points awarded");
        total
    }

    /// Current total, 0 for users never awarded.
    pub async fn score(&self, user: &str) -> u64 {
        self.scores.read().await.get(user).copied().unwrap_or(0)
    }
}
