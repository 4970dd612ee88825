//! In-memory user sessions and the process-wide "current user" record.
//!
//! Nothing here is persisted. Sessions are swept on a fixed interval, so a
//! session lives somewhere between the TTL and TTL + interval after its last
//! write.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::RelayError;

pub const DEFAULT_USER_ID: &str = "123";
pub const DEFAULT_USER_NAME: &str = "Deepak Yadav";

/// Sessions older than this are evicted by the sweeper.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub user_name: String,
    pub timestamp: DateTime<Utc>,
}

/// A live session together with its age at listing time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    #[serde(flatten)]
    pub session: Session,
    pub age_ms: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub user_id: String,
    pub user_name: String,
    pub timestamp: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    current_user: RwLock<UserData>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_ttl(SESSION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let (user_id, user_name) = identity(None, None);
        Self {
            sessions: RwLock::new(HashMap::new()),
            current_user: RwLock::new(UserData {
                user_id,
                user_name,
                timestamp: Utc::now(),
            }),
            ttl,
        }
    }

    /// Insert or overwrite a session, stamping it with the current time.
    pub async fn put(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        user_name: Option<&str>,
    ) -> Result<Session, RelayError> {
        self.put_at(session_id, user_id, user_name, Utc::now()).await
    }

    pub async fn put_at(
        &self,
        session_id: &str,
        user_id: Option<&str>,
        user_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Session, RelayError> {
        if session_id.trim().is_empty() {
            return Err(RelayError::BadRequest("sessionId is required".into()));
        }

        let (user_id, user_name) = identity(user_id, user_name);
        let session = Session {
            session_id: session_id.to_string(),
            user_id,
            user_name,
            timestamp: now,
        };

        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), session.clone());
        debug!("Stored session {session_id}");
        Ok(session)
    }

    pub async fn get(&self, session_id: &str) -> Result<Session, RelayError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| RelayError::NotFound("Session".into()))
    }

    /// Remove a session, reporting whether it existed.
    pub async fn delete(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    /// Every live session with its age, ordered by session id.
    pub async fn list_all(&self) -> Vec<SessionEntry> {
        self.list_at(Utc::now()).await
    }

    pub async fn list_at(&self, now: DateTime<Utc>) -> Vec<SessionEntry> {
        let mut entries: Vec<SessionEntry> = self
            .sessions
            .read()
            .await
            .values()
            .map(|session| SessionEntry {
                age_ms: (now - session.timestamp).num_milliseconds(),
                session: session.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.session.session_id.cmp(&b.session.session_id));
        entries
    }

    /// Drop sessions older than the TTL as of `now`. Returns how many went.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| {
            (now - s.timestamp)
                .to_std()
                .map_or(true, |age| age <= self.ttl)
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn current_user(&self) -> UserData {
        self.current_user.read().await.clone()
    }

    pub async fn set_current_user(&self, user_id: Option<&str>, user_name: Option<&str>) -> UserData {
        let (user_id, user_name) = identity(user_id, user_name);
        let data = UserData {
            user_id,
            user_name,
            timestamp: Utc::now(),
        };
        *self.current_user.write().await = data.clone();
        data
    }
}

/// Caller identity with blank fields replaced by the defaults.
fn identity(user_id: Option<&str>, user_name: Option<&str>) -> (String, String) {
    let pick = |value: Option<&str>, default: &str| {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(default)
            .to_string()
    };
    (pick(user_id, DEFAULT_USER_ID), pick(user_name, DEFAULT_USER_NAME))
}

/// Start the periodic session sweep. The task ends when `cancel` fires.
pub fn spawn_sweeper(
    store: Arc<SessionStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Session sweeper started (interval: {}s)", interval.as_secs());
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Session sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = store.sweep_expired(Utc::now()).await;
                    if evicted > 0 {
                        info!("Evicted {evicted} expired sessions");
                    }
                    debug!("{} sessions live after sweep", store.len().await);
                }
            }
        }
    })
}
