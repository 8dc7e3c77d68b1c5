//! Raw host signals
//!
//! The host (a wasm shell, an embedder, a test harness) translates its
//! platform's native events into these values and feeds them to the tracker
//! through `dispatch`. Element identity is an opaque key: the engine never
//! holds a reference to any host object, so observed elements stay
//! collectable on the host side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Maximum element text carried in payloads
pub const ELEMENT_TEXT_LIMIT: usize = 100;

/// Opaque element identity assigned by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

/// Descriptive element attributes captured at signal time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementInfo {
    /// Lowercased tag name (e.g. "img", "button")
    pub tag: String,

    /// Element id attribute, empty if absent
    #[serde(default)]
    pub id: String,

    /// Element class attribute, empty if absent
    #[serde(default)]
    pub class_name: String,

    /// Visible text content
    #[serde(default)]
    pub text: String,
}

impl ElementInfo {
    /// Common element payload fields, with text truncated to the carry limit
    pub fn payload_fields(&self) -> Value {
        let text: String = self.text.chars().take(ELEMENT_TEXT_LIMIT).collect();
        json!({
            "element": self.tag.to_lowercase(),
            "text": text,
            "class_name": self.class_name,
            "id": self.id,
        })
    }
}

/// Activity-class signal kinds that feed the activity clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PointerDown,
    PointerMove,
    KeyPress,
    Scroll,
    TouchStart,
}

/// One raw scroll position sample
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScrollSample {
    /// Scroll offset from the top, in pixels
    pub scroll_top: f64,
    /// Total scrollable content height, in pixels
    pub scroll_height: f64,
    /// Viewport height, in pixels
    pub client_height: f64,
}

impl ScrollSample {
    /// Scrolled ratio in [0, ..]; `None` when the page cannot scroll
    /// (non-positive denominator never crosses a threshold).
    pub fn ratio(&self) -> Option<f64> {
        let denominator = self.scroll_height - self.client_height;
        if denominator <= 0.0 {
            None
        } else {
            Some(self.scroll_top / denominator)
        }
    }
}

/// One visibility-ratio observation for a watched element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilitySample {
    /// Which element this observation is about
    pub element: ElementId,
    /// Element attributes at observation time
    pub info: ElementInfo,
    /// Visible fraction in [0, 1]
    pub ratio: f64,
    /// Whether the element currently intersects the viewport
    pub intersecting: bool,
}

/// A candidate for exposure observation, offered by the host once content
/// is parsed. Only candidates matching the selector set are registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementCandidate {
    pub element: ElementId,
    pub info: ElementInfo,
    /// Explicit opt-in marker (the `data-exposure` attribute equivalent)
    #[serde(default)]
    pub opted_in: bool,
}

/// A raw signal pushed into the tracker by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    /// A pointer click landed on an element
    Click {
        target: ElementInfo,
        x: f64,
        y: f64,
    },
    /// The scroll position changed
    Scroll(ScrollSample),
    /// A visibility observation for a watched element
    Visibility(VisibilitySample),
    /// An activity-class event with no further payload
    Activity { kind: ActivityKind },
}

/// Page-level context the host supplies at install time
///
/// Replaces the original's ambient `window.location` / `document` reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContext {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub referrer: String,
}

impl PageContext {
    pub fn new(url: &str, title: &str, referrer: &str) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            referrer: referrer.to_string(),
        }
    }
}

/// Timestamp payload convention: epoch milliseconds, matching the sink's
/// expectations for `timestamp` fields inside payloads.
pub fn epoch_ms(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}
