//! Capture engines
//!
//! Each sub-engine implements the [`CaptureEngine`] capability interface;
//! the tracker holds a set of these values and never depends on a concrete
//! engine type. Engines receive a borrowed [`CaptureContext`] on every call
//! so session identity can change (reset) without re-wiring anything.

mod activity;
mod click;
mod exposure;
mod scroll;

pub use activity::ActivityEngine;
pub use click::ClickEngine;
pub use exposure::{ExposureEngine, ExposureRecord, OBSERVED_TAGS};
pub use scroll::ScrollEngine;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::clock::Clock;
use crate::error::Result;
use crate::event::{Event, EventKind};
use crate::signal::{ElementCandidate, ElementId, PageContext, Signal};
use crate::sink::EventSink;

/// Per-call view of the tracker's shared state, borrowed into engines
pub struct CaptureContext<'a> {
    pub clock: &'a dyn Clock,
    pub sink: &'a dyn EventSink,
    pub page: &'a PageContext,
    pub session_id: &'a str,
    pub user_id: &'a str,
}

impl CaptureContext<'_> {
    /// Current instant from the injected clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Hand one event to the sink. Sink failures are logged and dropped;
    /// no error ever propagates back into a signal callback.
    pub fn emit(&self, kind: EventKind, payload: Value) {
        let event = Event::new(kind, payload, self.now());
        if let Err(err) = self.sink.track(event.kind.as_str(), &event.payload) {
            tracing::warn!(
                kind = event.kind.as_str(),
                sink = self.sink.name(),
                error = %err,
                "sink rejected event"
            );
        }
    }
}

/// Capability interface implemented by every sub-engine
pub trait CaptureEngine: Send {
    /// Engine name (for logging and degradation reports)
    fn name(&self) -> &'static str;

    /// Activate the engine. A failure here is logged by the controller and
    /// the engine is skipped; other engines still activate.
    fn install(&mut self, ctx: &CaptureContext<'_>) -> Result<()>;

    /// Deactivate and release all engine-held state
    fn uninstall(&mut self);

    /// Whether the engine is currently active
    fn is_installed(&self) -> bool;

    /// Whether this engine listens for the given signal
    fn wants(&self, signal: &Signal) -> bool;

    /// Handle one signal. Called only when `wants` returned true.
    fn on_signal(&mut self, ctx: &CaptureContext<'_>, signal: &Signal);

    /// Drive trailing edges and periodic evaluations
    fn poll(&mut self, _ctx: &CaptureContext<'_>) {}

    /// Offer element candidates for observation (exposure only)
    fn observe(&mut self, _ctx: &CaptureContext<'_>, _candidates: &[ElementCandidate]) {}

    /// Stop observing one element, dropping its record (exposure only)
    fn unobserve(&mut self, _element: ElementId) {}

    /// Page teardown (unload or uninstall). May emit terminal events;
    /// engines stay wired afterwards.
    fn on_teardown(&mut self, _ctx: &CaptureContext<'_>, _session_started_at: DateTime<Utc>) {}

    /// Clear session-scoped state for a fresh session without re-wiring
    fn reset(&mut self, _ctx: &CaptureContext<'_>) {}
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::clock::ManualClock;
    use crate::signal::PageContext;
    use crate::sink::MemorySink;

    /// Shared fixture owning the collaborators a CaptureContext borrows
    pub struct Fixture {
        pub clock: ManualClock,
        pub sink: Arc<MemorySink>,
        pub page: PageContext,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self {
                clock: ManualClock::at_epoch(),
                sink: Arc::new(MemorySink::new()),
                page: PageContext::new("https://example.com/home", "Home", ""),
            }
        }

        pub fn ctx(&self) -> super::CaptureContext<'_> {
            super::CaptureContext {
                clock: &self.clock,
                sink: self.sink.as_ref(),
                page: &self.page,
                session_id: "session-test",
                user_id: "user-test",
            }
        }
    }
}
