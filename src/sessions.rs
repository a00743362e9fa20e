//! Conversation session store: one `Session` per user id, with optional idle eviction.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::domain::{Phase, Session};

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
    turns: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    idle_timeout: Option<Duration>,
}

impl SessionStore {
    /// `idle_timeout_secs == 0` disables eviction.
    pub fn new(idle_timeout_secs: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            turns: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout: (idle_timeout_secs > 0).then(|| Duration::from_secs(idle_timeout_secs)),
        }
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Serialize dialogue steps for one user. Hold the guard for the whole
    /// read-judge-write of a message.
    pub async fn lock_user(&self, user: &str) -> OwnedMutexGuard<()> {
        let turn = {
            let mut turns = self.turns.lock().await;
            turns.entry(user.to_string()).or_default().clone()
        };
        turn.lock_owned().await
    }

    pub async fn get(&self, user: &str) -> Option<Session> {
        self.inner.read().await.get(user).cloned()
    }

    /// Store the session, refreshing its `last_seen`.
    pub async fn set(&self, user: &str, mut session: Session) {
        session.last_seen = Instant::now();
        self.inner.write().await.insert(user.to_string(), session);
    }

    pub async fn remove(&self, user: &str) -> Option<Session> {
        let removed = self.inner.write().await.remove(user);
        if removed.is_some() {
            debug!(target: "dialogue", %user, "Session removed");
        }
        removed
    }

    pub async fn phase(&self, user: &str) -> Option<Phase> {
        self.inner.read().await.get(user).map(|s| s.phase)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Drop sessions idle past the timeout. Returns how many were evicted.
    pub async fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now()).await
    }

    pub async fn evict_idle_at(&self, now: Instant) -> usize {
        let Some(timeout) = self.idle_timeout else { return 0 };
        let mut sessions = self.inner.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| now.saturating_duration_since(s.last_seen) <= timeout);
        let evicted = before - sessions.len();
        drop(sessions);
        // Turn locks nobody holds or waits on belong to no live conversation.
        self.turns.lock().await.retain(|_, t| Arc::strong_count(t) > 1);
        if evicted > 0 {
            info!(target: "dialogue", evicted, remaining = before - evicted, "Evicted idle sessions");
        }
        evicted
    }
}
