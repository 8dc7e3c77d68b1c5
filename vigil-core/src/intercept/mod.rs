//! Network-call interception
//!
//! Both call-initiation primitives live in swappable slots. Installing an
//! interceptor captures the current occupant once and substitutes a wrapper
//! that observes call lifecycles; uninstalling restores the exact captured
//! reference. The wrapper never changes what the caller sees: resolved
//! values and failures pass through bit-identical, and telemetry-emission
//! problems are logged, never raised into the intercepted call.

mod http;
mod wire;

pub use http::{
    HttpFailure, HttpIntercept, HttpRequest, HttpResponse, HttpSlot, HttpTransport,
    NullHttpTransport,
};
pub use wire::{WireCall, WireFactory, WireIntercept, WireOutcome, WireSlot};

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::clock::{elapsed_ms, Clock};
use crate::event::{Event, EventKind};
use crate::signal::epoch_ms;
use crate::sink::EventSink;

/// Ephemeral record of one intercepted call, created immediately before the
/// original primitive is invoked and destroyed after the terminal event.
#[derive(Debug, Clone)]
pub struct NetworkCallRecord {
    pub method: String,
    pub url: String,
    pub started_at: DateTime<Utc>,
}

/// Shared emission state handed to interceptor wrappers
///
/// The session cell is shared with the tracker so a `reset` retags
/// in-flight interceptors without re-installing them.
#[derive(Clone)]
pub struct NetworkProbe {
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    session: Arc<RwLock<String>>,
}

impl NetworkProbe {
    pub fn new(sink: Arc<dyn EventSink>, clock: Arc<dyn Clock>, session: Arc<RwLock<String>>) -> Self {
        Self {
            sink,
            clock,
            session,
        }
    }

    /// Current instant from the injected clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn session_id(&self) -> String {
        self.session.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Emit the terminal event for a successful call
    pub fn emit_success(&self, call_type: &str, record: &NetworkCallRecord, status: u16) {
        let now = self.now();
        self.track(json!({
            "type": call_type,
            "url": record.url,
            "method": record.method,
            "status": status,
            "duration_ms": elapsed_ms(record.started_at, now),
            "session_id": self.session_id(),
            "timestamp": epoch_ms(now),
        }));
    }

    /// Emit the terminal event for a failed call
    pub fn emit_failure(&self, call_type: &str, record: &NetworkCallRecord, error: &str) {
        let now = self.now();
        self.track(json!({
            "type": call_type,
            "url": record.url,
            "method": record.method,
            "error": error,
            "duration_ms": elapsed_ms(record.started_at, now),
            "session_id": self.session_id(),
            "timestamp": epoch_ms(now),
        }));
    }

    fn track(&self, payload: serde_json::Value) {
        let event = Event::new(EventKind::Network, payload, self.now());
        if let Err(err) = self.sink.track(event.kind.as_str(), &event.payload) {
            tracing::warn!(sink = self.sink.name(), error = %err, "sink rejected network event");
        }
    }
}
