//! Scheduler primitives
//!
//! Throttling and debouncing are expressed as explicit, clock-driven value
//! machines rather than closures over timer handles: the host drives them by
//! submitting values and polling with the current instant. This keeps
//! trailing-edge semantics deterministic and testable without real timers.

use chrono::{DateTime, Duration, Utc};

/// Trailing-edge throttle.
///
/// The first `submit` in a quiet stretch opens a window of `interval_ms`;
/// every further submit inside the window replaces the pending value. When
/// the window elapses, `poll` releases the latest value: the final sample
/// in a rapid sequence is authoritative.
#[derive(Debug)]
pub struct Throttle<T> {
    interval: Duration,
    pending: Option<T>,
    fire_at: Option<DateTime<Utc>>,
}

impl<T> Throttle<T> {
    /// Create a throttle with the given coalescing interval
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: Duration::milliseconds(interval_ms as i64),
            pending: None,
            fire_at: None,
        }
    }

    /// Submit a value. Opens a window if none is pending; otherwise replaces
    /// the pending value without extending the window.
    pub fn submit(&mut self, now: DateTime<Utc>, value: T) {
        self.pending = Some(value);
        if self.fire_at.is_none() {
            self.fire_at = Some(now + self.interval);
        }
    }

    /// Release the pending value if the window has elapsed
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<T> {
        match self.fire_at {
            Some(fire_at) if now >= fire_at => {
                self.fire_at = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Drop the pending value and close the window
    pub fn cancel_pending(&mut self) {
        self.pending = None;
        self.fire_at = None;
    }

    /// Whether a value is waiting for the trailing edge
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Leading-edge quiet-period gate.
///
/// `allow` returns true and arms the gate iff at least `interval_ms` has
/// passed since the last allowed instant. A zero interval always allows.
#[derive(Debug)]
pub struct Debounce {
    interval: Duration,
    last_allowed: Option<DateTime<Utc>>,
}

impl Debounce {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: Duration::milliseconds(interval_ms as i64),
            last_allowed: None,
        }
    }

    /// Check the gate, arming it when the check passes
    pub fn allow(&mut self, now: DateTime<Utc>) -> bool {
        let allowed = match self.last_allowed {
            Some(last) => now - last >= self.interval,
            None => true,
        };
        if allowed {
            self.last_allowed = Some(now);
        }
        allowed
    }

    /// Forget the last allowed instant
    pub fn reset(&mut self) {
        self.last_allowed = None;
    }
}

/// Fixed-interval periodic due-check.
///
/// `due` fires at most once per elapsed interval and never bursts to catch
/// up: after firing, the next deadline is measured from `now`.
#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    next_due: Option<DateTime<Utc>>,
}

impl Ticker {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: Duration::milliseconds(interval_ms as i64),
            next_due: None,
        }
    }

    /// Arm the ticker; the first firing is one interval from `now`
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.next_due = Some(now + self.interval);
    }

    /// Disarm the ticker
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Whether the ticker is armed
    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    /// Returns true once per elapsed interval
    pub fn due(&mut self, now: DateTime<Utc>) -> bool {
        match self.next_due {
            Some(deadline) if now >= deadline => {
                self.next_due = Some(now + self.interval);
                true
            }
            _ => false,
        }
    }
}
