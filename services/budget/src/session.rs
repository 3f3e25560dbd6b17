//! In-memory session store bound to an HTTP cookie
//!
//! Sessions are an explicit injected store rather than process-global
//! framework state. Expired entries are pruned on access; the store is not
//! durable across restarts.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Name of the cookie carrying the session id
pub const SESSION_COOKIE: &str = "budget_session";

/// Server-side session record
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Session store keyed by the cookie value
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    lifetime: Duration,
}

impl SessionStore {
    /// Create a session store with the default 24-hour lifetime
    pub fn new() -> Self {
        Self::with_lifetime(Duration::hours(24))
    }

    /// Create a session store with an explicit lifetime
    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            lifetime,
        }
    }

    /// Create a session and return its id (the cookie value)
    pub async fn create(
        &self,
        user_id: Uuid,
        username: &str,
        token: &str,
        refresh_token: &str,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let session = Session {
            user_id,
            username: username.to_string(),
            token: token.to_string(),
            refresh_token: refresh_token.to_string(),
            created_at: now,
            expires_at: now + self.lifetime,
        };

        info!("Creating session for user: {}", username);
        let mut sessions = self.sessions.write().await;
        // Abandoned sessions expire without ever being looked up again;
        // sweep them here so the map stays bounded by live sessions.
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(id, session);
        id
    }

    /// Look up a session, removing it when expired
    pub async fn get(&self, id: Uuid) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(&id) {
            Some(session) if session.expires_at > Utc::now() => Some(session.clone()),
            Some(_) => {
                sessions.remove(&id);
                None
            }
            None => None,
        }
    }

    /// Remove a session (logout)
    pub async fn remove(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }

    #[cfg(test)]
    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
