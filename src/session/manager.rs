//! Session lifecycle: create, look up, end, prune.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::Session;

/// Owns every live session. Each session sits behind its own mutex so one
/// turn runs to completion before the next turn of that session starts.
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh session.
    pub async fn create(&self) -> (Uuid, Arc<Mutex<Session>>) {
        let session = Session::new();
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, Arc::clone(&handle));
        tracing::debug!(session = %id, "Session created");
        (id, handle)
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Look up a session, creating it under `id` if it does not exist.
    pub async fn get_or_create(&self, id: Uuid) -> Arc<Mutex<Session>> {
        if let Some(existing) = self.get(id).await {
            return existing;
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(Session::with_id(id)))),
        )
    }

    /// End a session, dropping its forms and registry.
    pub async fn end(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::debug!(session = %id, "Session ended");
        }
        removed
    }

    /// Drop sessions idle for longer than `idle_timeout`. Sessions in the
    /// middle of a turn are skipped.
    pub async fn prune_idle(&self, idle_timeout: Duration) -> usize {
        let cutoff = match chrono::Duration::from_std(idle_timeout) {
            Ok(d) => Utc::now() - d,
            Err(_) => return 0,
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(session) => session.last_active >= cutoff,
            Err(_) => true,
        });
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::info!(pruned, "Pruned idle sessions");
        }
        pruned
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
