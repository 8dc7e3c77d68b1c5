//! Normalized telemetry events
//!
//! Every capture engine produces the same shape: an [`EventKind`], a JSON
//! object payload, and the timestamp at which the event was synthesized.
//! Events are immutable once constructed and are handed to the sink exactly
//! once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event kinds emitted by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A pointer click on an element
    Click,
    /// Scroll depth crossed the configured threshold upward
    Scroll,
    /// An element entered a visible-enough state (period start)
    Exposure,
    /// An element left its visible-enough state (period end, with duration)
    ExposureEnd,
    /// An intercepted network call reached a terminal state
    Network,
    /// One page activation (PV)
    Pageview,
    /// One user visit (UV); never deduplicated by the core
    Uservisit,
    /// Terminal page stay duration, emitted at teardown
    Pagestay,
    /// The idle threshold was exceeded without user activity
    Inactivity,
}

impl EventKind {
    /// Get the string representation (the sink-facing wire name)
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Scroll => "scroll",
            EventKind::Exposure => "exposure",
            EventKind::ExposureEnd => "exposure_end",
            EventKind::Network => "network",
            EventKind::Pageview => "pageview",
            EventKind::Uservisit => "uservisit",
            EventKind::Pagestay => "pagestay",
            EventKind::Inactivity => "inactivity",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "click" => Ok(EventKind::Click),
            "scroll" => Ok(EventKind::Scroll),
            "exposure" => Ok(EventKind::Exposure),
            "exposure_end" => Ok(EventKind::ExposureEnd),
            "network" => Ok(EventKind::Network),
            "pageview" => Ok(EventKind::Pageview),
            "uservisit" => Ok(EventKind::Uservisit),
            "pagestay" => Ok(EventKind::Pagestay),
            "inactivity" => Ok(EventKind::Inactivity),
            _ => Err(format!("Unknown event kind: {}", s)),
        }
    }
}

/// A single normalized telemetry event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Kind of event
    pub kind: EventKind,

    /// Event payload; always a JSON object
    pub payload: Value,

    /// When the event was synthesized
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create a new event
    pub fn new(kind: EventKind, payload: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            payload,
            timestamp,
        }
    }
}

/// Merge caller-supplied extra fields over a computed base payload.
///
/// Both values are expected to be JSON objects; caller-supplied keys win.
/// A non-object `extra` is ignored, a non-object base is returned unchanged.
pub fn merge_payload(base: Value, extra: Option<Value>) -> Value {
    match (base, extra) {
        (Value::Object(mut base_map), Some(Value::Object(extra_map))) => {
            for (key, value) in extra_map {
                base_map.insert(key, value);
            }
            Value::Object(base_map)
        }
        (base, _) => base,
    }
}
