//! Chat session registry.
//!
//! Sessions are kept in memory only. Each one owns a token-limited
//! [`ChatMemory`] plus the abort/processing flags that let a client cancel a
//! reply that is still streaming.

use crate::memory::{ChatMemory, DEFAULT_TOKEN_LIMIT};
use crate::types::Message;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Idle time after which a session is considered expired.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub memory: ChatMemory,
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub is_aborted: bool,
    pub is_processing: bool,
}

impl Session {
    fn new(id: String, token_limit: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            memory: ChatMemory::new(token_limit),
            created_at: now,
            last_access: now,
            is_aborted: false,
            is_processing: false,
        }
    }
}

/// Read-only view of a session returned to callers.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub is_aborted: bool,
    pub is_processing: bool,
    pub message_count: usize,
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            created_at: session.created_at,
            last_access: session.last_access,
            is_aborted: session.is_aborted,
            is_processing: session.is_processing,
            message_count: session.memory.len(),
        }
    }
}

/// Seconds since the Unix epoch with sub-second precision.
pub fn epoch_seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    timeout: Duration,
    token_limit: usize,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TIMEOUT, DEFAULT_TOKEN_LIMIT)
    }
}

impl SessionManager {
    pub fn new(timeout: Duration, token_limit: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout,
            token_limit,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a session and return its id.
    pub fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .insert(id.clone(), Session::new(id.clone(), self.token_limit));
        tracing::debug!(session_id = %id, "Session created");
        id
    }

    /// Look up a session, refreshing its last access time.
    pub fn get_session(&self, session_id: &str) -> Option<SessionSnapshot> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(session_id)?;
        session.last_access = Utc::now();
        Some(SessionSnapshot::from(&*session))
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Conversation history of a session, oldest first.
    pub fn history(&self, session_id: &str) -> Vec<Message> {
        self.sessions
            .read()
            .get(session_id)
            .map(|s| s.memory.history())
            .unwrap_or_default()
    }

    /// Append a question/answer pair to the session memory.
    pub fn record_exchange(&self, session_id: &str, question: &str, answer: &str) -> bool {
        match self.sessions.write().get_mut(session_id) {
            Some(session) => {
                session.memory.record_exchange(question, answer);
                true
            }
            None => false,
        }
    }

    /// Remove sessions idle for longer than the timeout; returns how many.
    pub fn cleanup_expired_sessions(&self) -> usize {
        self.cleanup_expired_at(Utc::now())
    }

    fn cleanup_expired_at(&self, now: DateTime<Utc>) -> usize {
        let timeout = chrono::Duration::from_std(self.timeout).unwrap_or(chrono::Duration::MAX);
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| now.signed_duration_since(s.last_access) <= timeout);
        let cleaned = before - sessions.len();
        if cleaned > 0 {
            tracing::info!(cleaned, remaining = sessions.len(), "Expired sessions removed");
        }
        cleaned
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn delete_session(&self, session_id: &str) -> bool {
        self.sessions.write().remove(session_id).is_some()
    }

    pub fn abort_session(&self, session_id: &str) -> bool {
        self.update(session_id, |s| s.is_aborted = true)
    }

    pub fn is_session_aborted(&self, session_id: &str) -> bool {
        self.sessions
            .read()
            .get(session_id)
            .is_some_and(|s| s.is_aborted)
    }

    pub fn reset_session_abort(&self, session_id: &str) -> bool {
        self.update(session_id, |s| s.is_aborted = false)
    }

    pub fn set_processing_status(&self, session_id: &str, is_processing: bool) -> bool {
        self.update(session_id, |s| s.is_processing = is_processing)
    }

    pub fn is_session_processing(&self, session_id: &str) -> bool {
        self.sessions
            .read()
            .get(session_id)
            .is_some_and(|s| s.is_processing)
    }

    fn update(&self, session_id: &str, f: impl FnOnce(&mut Session)) -> bool {
        match self.sessions.write().get_mut(session_id) {
            Some(session) => {
                f(session);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn backdate(&self, session_id: &str, by: chrono::Duration) {
        if let Some(s) = self.sessions.write().get_mut(session_id) {
            s.last_access -= by;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get_session() {
        let manager = SessionManager::default();
        let id = manager.create_session();
        assert_eq!(id.len(), 36);
        assert!(Uuid::parse_str(&id).is_ok());

        let snapshot = manager.get_session(&id).unwrap();
        assert_eq!(snapshot.id, id);
        assert!(!snapshot.is_aborted);
        assert!(!snapshot.is_processing);
        assert!(snapshot.last_access >= snapshot.created_at);
        assert!(manager.get_session("missing").is_none());
    }

    #[test]
    fn test_flags_on_unknown_session() {
        let manager = SessionManager::default();
        assert!(!manager.abort_session("nope"));
        assert!(!manager.reset_session_abort("nope"));
        assert!(!manager.set_processing_status("nope", true));
        assert!(!manager.is_session_aborted("nope"));
        assert!(!manager.is_session_processing("nope"));
        assert!(!manager.delete_session("nope"));
        assert!(!manager.record_exchange("nope", "q", "a"));
    }

    #[test]
    fn test_abort_and_reset() {
        let manager = SessionManager::default();
        let id = manager.create_session();
        assert!(manager.abort_session(&id));
        assert!(manager.is_session_aborted(&id));
        assert!(manager.reset_session_abort(&id));
        assert!(!manager.is_session_aborted(&id));

        assert!(manager.set_processing_status(&id, true));
        assert!(manager.is_session_processing(&id));
    }

    #[test]
    fn test_cleanup_expired_sessions() {
        let manager = SessionManager::new(Duration::from_secs(60), 3000);
        let stale = manager.create_session();
        let fresh = manager.create_session();
        manager.backdate(&stale, chrono::Duration::seconds(120));

        assert_eq!(manager.cleanup_expired_sessions(), 1);
        assert_eq!(manager.session_count(), 1);
        assert!(manager.exists(&fresh));
        assert!(!manager.exists(&stale));
        assert_eq!(manager.cleanup_expired_sessions(), 0);
    }

    #[test]
    fn test_record_exchange_and_history() {
        let manager = SessionManager::default();
        let id = manager.create_session();
        assert!(manager.record_exchange(&id, "可以退貨嗎?", "可以，七天內。"));
        let history = manager.history(&id);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "可以退貨嗎?");
        assert_eq!(manager.get_session(&id).unwrap().message_count, 2);
        assert!(manager.history("unknown").is_empty());
    }

    #[test]
    fn test_delete_session() {
        let manager = SessionManager::default();
        let id = manager.create_session();
        assert!(manager.delete_session(&id));
        assert!(!manager.delete_session(&id));
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_epoch_seconds() {
        let ts = DateTime::from_timestamp(1_700_000_000, 500_000_000).unwrap();
        assert_eq!(epoch_seconds(ts), 1_700_000_000.5);
    }
}
