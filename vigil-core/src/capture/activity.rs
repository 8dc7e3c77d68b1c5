//! Activity, idle time, and page stay
//!
//! Activity-class signals touch the activity clock synchronously. A fixed
//! ticker evaluates idle time; exceeding the threshold emits one
//! `inactivity` event per idle period (re-armed by the next activity).
//! `finish` computes the terminal `pagestay` once per session.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::clock::elapsed_ms;
use crate::error::Result;
use crate::event::EventKind;
use crate::schedule::Ticker;
use crate::signal::{epoch_ms, Signal};

use super::{CaptureContext, CaptureEngine};

/// Stay-time engine: activity clock + idle ticker + terminal page stay
pub struct ActivityEngine {
    inactivity_threshold_ms: u64,
    ticker: Ticker,
    last_activity_at: Option<DateTime<Utc>>,
    idle_reported: bool,
    stay_reported: bool,
    installed: bool,
}

impl ActivityEngine {
    pub fn new(inactivity_threshold_ms: u64, poll_interval_ms: u64) -> Self {
        Self {
            inactivity_threshold_ms,
            ticker: Ticker::new(poll_interval_ms),
            last_activity_at: None,
            idle_reported: false,
            stay_reported: false,
            installed: false,
        }
    }

    /// Time since the last activity signal, in milliseconds
    pub fn idle_ms(&self, now: DateTime<Utc>) -> Option<u64> {
        self.last_activity_at.map(|last| elapsed_ms(last, now))
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = Some(now);
        self.idle_reported = false;
    }

    /// Emit the terminal `pagestay` event for this session. Idempotent:
    /// unload followed by uninstall reports the stay once.
    pub fn finish(&mut self, ctx: &CaptureContext<'_>, session_started_at: DateTime<Utc>) {
        if !self.installed || self.stay_reported {
            return;
        }
        self.stay_reported = true;

        let now = ctx.now();
        ctx.emit(
            EventKind::Pagestay,
            json!({
                "url": ctx.page.url,
                "stay_time_ms": elapsed_ms(session_started_at, now),
                "session_id": ctx.session_id,
                "user_id": ctx.user_id,
                "timestamp": epoch_ms(now),
            }),
        );
    }
}

impl CaptureEngine for ActivityEngine {
    fn name(&self) -> &'static str {
        "activity"
    }

    fn install(&mut self, ctx: &CaptureContext<'_>) -> Result<()> {
        let now = ctx.now();
        self.last_activity_at = Some(now);
        self.idle_reported = false;
        self.stay_reported = false;
        self.ticker.start(now);
        self.installed = true;
        Ok(())
    }

    fn uninstall(&mut self) {
        self.installed = false;
        self.ticker.stop();
        self.last_activity_at = None;
    }

    fn is_installed(&self) -> bool {
        self.installed
    }

    fn wants(&self, signal: &Signal) -> bool {
        // Scroll doubles as activity: the fixed activity set includes it
        matches!(signal, Signal::Activity { .. } | Signal::Scroll(_))
    }

    fn on_signal(&mut self, ctx: &CaptureContext<'_>, _signal: &Signal) {
        if !self.installed {
            return;
        }
        self.touch(ctx.now());
    }

    fn poll(&mut self, ctx: &CaptureContext<'_>) {
        if !self.installed {
            return;
        }
        let now = ctx.now();
        if !self.ticker.due(now) {
            return;
        }
        let Some(idle) = self.idle_ms(now) else {
            return;
        };
        if idle > self.inactivity_threshold_ms && !self.idle_reported {
            self.idle_reported = true;
            ctx.emit(
                EventKind::Inactivity,
                json!({
                    "duration_ms": idle,
                    "url": ctx.page.url,
                    "session_id": ctx.session_id,
                    "timestamp": epoch_ms(now),
                }),
            );
        }
    }

    fn on_teardown(&mut self, ctx: &CaptureContext<'_>, session_started_at: DateTime<Utc>) {
        self.finish(ctx, session_started_at);
    }

    fn reset(&mut self, ctx: &CaptureContext<'_>) {
        let now = ctx.now();
        self.last_activity_at = Some(now);
        self.idle_reported = false;
        self.stay_reported = false;
        self.ticker.start(now);
    }
}
