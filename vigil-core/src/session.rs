//! Session state
//!
//! One session per install; `reset` replaces it wholesale. The session id is
//! carried in most event payloads so the sink can group a page lifetime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;

/// A tracker session: created on install, never mutated, replaced on reset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session identifier
    pub session_id: String,

    /// When the session started (page activation time)
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// Begin a fresh session at the clock's current instant
    pub fn begin(clock: &dyn Clock) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: clock.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_sessions_are_unique() {
        let clock = ManualClock::at_epoch();
        let a = Session::begin(&clock);
        let b = Session::begin(&clock);

        assert_ne!(a.session_id, b.session_id);
        assert_eq!(a.started_at, b.started_at);
    }

    #[test]
    fn test_session_serialization() {
        let clock = ManualClock::at_epoch();
        let session = Session::begin(&clock);

        let json = serde_json::to_string(&session).unwrap();
        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.session_id, session.session_id);
    }
}
