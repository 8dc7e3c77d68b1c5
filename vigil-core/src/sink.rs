//! Pluggable event sink
//!
//! The sink is the downstream consumer of normalized events. The core never
//! inspects the outcome beyond best-effort logging: delivery, batching, and
//! retry policy all live on the other side of this trait.

use std::sync::RwLock;

use serde_json::Value;

use crate::error::{Result, VigilError};

/// Sink contract consumed by the tracker
///
/// All methods take `&self` to allow interior mutability patterns.
pub trait EventSink: Send + Sync {
    /// Receive one normalized event. `kind` is the stable wire name of the
    /// event kind; `payload` is always a JSON object.
    fn track(&self, kind: &str, payload: &Value) -> Result<()>;

    /// Sink name (for logging/debugging)
    fn name(&self) -> &'static str;
}

/// An event captured by [`MemorySink`]
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    /// Wire name of the event kind
    pub kind: String,
    /// The payload as handed to the sink
    pub payload: Value,
}

/// In-memory sink that records every tracked event
///
/// The default sink for tests and local inspection. Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: RwLock<Vec<CapturedEvent>>,
}

impl MemorySink {
    /// Create a new empty memory sink
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// All captured events, in emission order
    pub fn captured(&self) -> Vec<CapturedEvent> {
        self.events
            .read()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Captured events of one kind, in emission order
    pub fn captured_of(&self, kind: &str) -> Vec<CapturedEvent> {
        self.events
            .read()
            .map(|e| e.iter().filter(|ev| ev.kind == kind).cloned().collect())
            .unwrap_or_default()
    }

    /// Count of captured events of one kind
    pub fn count_of(&self, kind: &str) -> usize {
        self.events
            .read()
            .map(|e| e.iter().filter(|ev| ev.kind == kind).count())
            .unwrap_or(0)
    }

    /// Total count of captured events
    pub fn count(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Drop all captured events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }
}

impl EventSink for MemorySink {
    fn track(&self, kind: &str, payload: &Value) -> Result<()> {
        let mut events = self.events.write().map_err(|_| VigilError::StateLocked)?;
        events.push(CapturedEvent {
            kind: kind.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Sink that discards all events
///
/// Useful for hosts that want capture side effects (interception, state
/// machines) without delivery.
#[derive(Debug, Default, Clone)]
pub struct NullSink;

impl NullSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for NullSink {
    fn track(&self, _kind: &str, _payload: &Value) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
