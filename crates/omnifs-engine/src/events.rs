//! Structured engine events.
//!
//! Every executed operation produces one [`EventRecord`]. Records go three
//! places: the `tracing` subscriber, a broadcast channel the logging
//! collaborator can drain, and a bounded in-memory ring kept for
//! post-mortem dumps.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Default ring capacity.
pub const DEFAULT_RING_CAPACITY: usize = 256;

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One structured event.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub level: EventLevel,
    /// Emitting component, e.g. `engine` or `pipeline`.
    pub component: &'static str,
    /// Stable operation tag, e.g. `CREATE_FILE`.
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Username the operation ran under; `system` outside a session.
    pub session_user: String,
}

impl EventRecord {
    /// Builds a record stamped with the current time.
    #[must_use]
    pub fn new(
        level: EventLevel,
        component: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
        session_user: impl Into<String>,
    ) -> Self {
        Self {
            level,
            component,
            code: code.into(),
            message: message.into(),
            timestamp: Utc::now(),
            session_user: session_user.into(),
        }
    }
}

/// Bounded event ring with broadcast fan-out.
#[derive(Debug)]
pub struct EventLog {
    ring: Mutex<VecDeque<EventRecord>>,
    capacity: usize,
    sender: broadcast::Sender<EventRecord>,
}

impl EventLog {
    /// Creates a log retaining the most recent `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            sender,
        }
    }

    /// Records an event: ring, tracing, and broadcast.
    pub fn emit(&self, record: EventRecord) {
        match record.level {
            EventLevel::Debug => tracing::debug!(
                code = %record.code,
                user = %record.session_user,
                "{}", record.message
            ),
            EventLevel::Info => tracing::info!(
                code = %record.code,
                user = %record.session_user,
                "{}", record.message
            ),
            EventLevel::Warn => tracing::warn!(
                code = %record.code,
                user = %record.session_user,
                "{}", record.message
            ),
            EventLevel::Error => tracing::error!(
                code = %record.code,
                user = %record.session_user,
                "{}", record.message
            ),
        }

        if let Ok(mut ring) = self.ring.lock() {
            if ring.len() == self.capacity {
                ring.pop_front();
            }
            ring.push_back(record.clone());
        }
        // Nobody listening is fine.
        let _ = self.sender.send(record);
    }

    /// Subscribes to the live event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// Returns a copy of the retained ring, oldest first.
    #[must_use]
    pub fn dump(&self) -> Vec<EventRecord> {
        self.ring
            .lock()
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}
