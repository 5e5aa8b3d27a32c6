use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::transcript::ChatSession;
use crate::config::ChatConfig;

pub type SharedSession = Arc<Mutex<ChatSession>>;

/// How many sessions a user may keep and how long an untouched one lives.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub max_per_owner: usize,
    pub idle_ttl: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_per_owner: 8,
            idle_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl From<&ChatConfig> for SessionLimits {
    fn from(cfg: &ChatConfig) -> Self {
        Self {
            max_per_owner: cfg.max_sessions_per_user,
            idle_ttl: Duration::from_secs(cfg.session_idle_minutes * 60),
        }
    }
}

struct Entry {
    owner: Uuid,
    session: SharedSession,
    last_used: Instant,
}

/// Live chat sessions, in memory only. Each session sits behind its own
/// mutex, so submissions to one session run strictly one after another
/// while different sessions proceed independently.
///
/// Sessions idle for longer than `idle_ttl` are dropped on the next
/// `create`. A user at `max_per_owner` loses their least recently used
/// session when starting a new one.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Entry>>>,
    limits: SessionLimits,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SessionLimits) -> Self {
        Self {
            inner: Arc::default(),
            limits,
        }
    }

    pub async fn create(&self, owner: Uuid) -> SharedSession {
        let session = ChatSession::new(owner);
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        let now = Instant::now();

        let mut sessions = self.inner.write().await;

        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_used) < self.limits.idle_ttl);
        if sessions.len() < before {
            debug!(expired = before - sessions.len(), "idle sessions dropped");
        }

        let max = self.limits.max_per_owner.max(1);
        let mut owned: Vec<(Uuid, Instant)> = sessions
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(id, entry)| (*id, entry.last_used))
            .collect();
        if owned.len() >= max {
            owned.sort_by_key(|(_, used)| *used);
            let excess = owned.len() + 1 - max;
            for (old, _) in owned.into_iter().take(excess) {
                sessions.remove(&old);
                debug!(session_id = %old, owner = %owner, "session evicted");
            }
        }

        sessions.insert(
            id,
            Entry {
                owner,
                session: shared.clone(),
                last_used: now,
            },
        );
        shared
    }

    /// `None` when the session does not exist, has expired or belongs to
    /// someone else. A hit counts as use.
    pub async fn get(&self, id: Uuid, owner: Uuid) -> Option<SharedSession> {
        let now = Instant::now();
        let mut sessions = self.inner.write().await;
        let entry = sessions.get_mut(&id).filter(|entry| entry.owner == owner)?;
        if now.duration_since(entry.last_used) >= self.limits.idle_ttl {
            sessions.remove(&id);
            return None;
        }
        entry.last_used = now;
        Some(entry.session.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
