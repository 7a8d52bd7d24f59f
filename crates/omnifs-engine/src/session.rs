//! In-memory session tracking.
//!
//! Sessions exist only in memory and die with the engine. Expiry is checked
//! on every validation; an expired session is removed on sight. All methods
//! take the current time explicitly so expiry is testable without sleeping.

use crate::auth;
use crate::error::{EngineError, Result};
use omnifs_protocol::Role;
use std::collections::HashMap;

/// One live session.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub username: String,
    pub role: Role,
    pub login_time: u64,
    pub last_activity: u64,
    pub expiration_time: u64,
    pub operations_count: u64,
    pub is_valid: bool,
}

/// The session map.
#[derive(Debug)]
pub struct SessionManager {
    sessions: HashMap<String, Session>,
    /// Session lifetime in seconds.
    ttl: u64,
}

impl SessionManager {
    /// Creates a manager issuing sessions that live `ttl` seconds.
    #[must_use]
    pub fn new(ttl: u64) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    /// Creates a session for an authenticated user.
    pub fn create(&mut self, username: &str, role: Role, now: u64) -> Session {
        let session = Session {
            session_id: auth::generate_token(),
            username: username.to_string(),
            role,
            login_time: now,
            last_activity: now,
            expiration_time: now + self.ttl,
            operations_count: 0,
            is_valid: true,
        };
        self.sessions
            .insert(session.session_id.clone(), session.clone());
        tracing::debug!(user = username, "session created");
        session
    }

    /// Validates a session id, removing it if expired.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSession` for unknown or expired ids.
    pub fn validate(&mut self, session_id: &str, now: u64) -> Result<&Session> {
        let expired = match self.sessions.get(session_id) {
            Some(session) => now > session.expiration_time,
            None => return Err(EngineError::InvalidSession),
        };
        if expired {
            self.sessions.remove(session_id);
            tracing::debug!("expired session removed");
            return Err(EngineError::InvalidSession);
        }
        Ok(&self.sessions[session_id])
    }

    /// Records activity on a session.
    pub fn touch(&mut self, session_id: &str, now: u64) {
        if let Some(session) = self.sessions.get_mut(session_id) {
            session.last_activity = now;
            session.operations_count += 1;
        }
    }

    /// Drops a session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSession` if the id is unknown.
    pub fn remove(&mut self, session_id: &str) -> Result<Session> {
        self.sessions
            .remove(session_id)
            .ok_or(EngineError::InvalidSession)
    }

    /// Drops every session belonging to `username`.
    pub fn remove_user_sessions(&mut self, username: &str) {
        self.sessions.retain(|_, s| s.username != username);
    }

    /// Number of live sessions (including not-yet-collected expired ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
