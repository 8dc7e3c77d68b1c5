//! Clock abstraction
//!
//! Every engine and scheduler primitive reads time exclusively through
//! [`Clock`], so tests can drive threshold machines and tickers with a
//! manual clock instead of sleeping.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

/// Abstract time source
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Clock name (for logging)
    fn name(&self) -> &'static str;
}

/// Wall-clock backed by the system time
#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn name(&self) -> &'static str {
        "system"
    }
}

/// Manually driven clock for deterministic tests
///
/// Starts at a fixed instant and only moves when told to.
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock pinned to the given instant
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Create a clock starting at the UNIX epoch
    pub fn at_epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Advance the clock by `ms` milliseconds
    pub fn advance_ms(&self, ms: u64) {
        if let Ok(mut now) = self.now.write() {
            *now += Duration::milliseconds(ms as i64);
        }
    }

    /// Set the clock to a specific instant
    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut now) = self.now.write() {
            *now = instant;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|n| *n).unwrap_or_else(|_| Utc::now())
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

/// Milliseconds elapsed between two instants, saturating at zero
pub fn elapsed_ms(earlier: DateTime<Utc>, later: DateTime<Utc>) -> u64 {
    (later - earlier).num_milliseconds().max(0) as u64
}
