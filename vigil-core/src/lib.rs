//! # Vigil Core - client behavior telemetry
//!
//! Vigil observes raw, noisy interaction signals and converts them into a
//! small set of discrete, deduplicated, normalized events handed to an
//! external sink:
//!
//! - **Threshold engines**: scroll depth (single global latch), element
//!   exposure (per-element periods), clicks (pass-through with debounce)
//! - **Interceptor layer**: reversible, transparent wrapping of the two
//!   network call-initiation primitives
//! - **Stay-time engine**: activity clock, idle detection, terminal page
//!   stay
//! - **Engine controller**: install/uninstall/reset lifecycle with zero
//!   residue after teardown
//!
//! There is no ambient global state: a [`Tracker`] owns its session,
//! identity, and engines, and every collaborator (sink, clock, identity
//! store, address resolver, primitive slots) is injected through an
//! [`Environment`]. Hosts feed [`Signal`] values in and drive logical time
//! with `poll`; tests swap in [`ManualClock`] and [`MemorySink`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vigil_core::{
//!     Environment, MemorySink, PageContext, ScrollSample, Signal, Tracker,
//!     TrackerConfig,
//! };
//!
//! let sink = Arc::new(MemorySink::new());
//! let page = PageContext::new("https://example.com", "Example", "");
//! let tracker = Tracker::new(TrackerConfig::default(), Environment::new(sink.clone(), page));
//!
//! let handle = tracker.install().unwrap();
//! assert!(tracker.is_active());
//!
//! // One pageview and one uservisit per activation
//! assert_eq!(sink.count_of("pageview"), 1);
//! assert_eq!(sink.count_of("uservisit"), 1);
//!
//! // Scroll past the 50% default threshold
//! tracker.dispatch(&Signal::Scroll(ScrollSample {
//!     scroll_top: 600.0,
//!     scroll_height: 1500.0,
//!     client_height: 500.0,
//! }));
//!
//! tracker.uninstall().unwrap();
//! assert!(!tracker.is_active());
//! # let _ = handle;
//! ```

pub mod capture;
pub mod clock;
pub mod config;
pub mod discovery;
pub mod error;
pub mod event;
pub mod identity;
pub mod intercept;
pub mod schedule;
pub mod session;
pub mod signal;
pub mod sink;
pub mod tracker;

// Re-export main types
pub use capture::{ActivityEngine, CaptureContext, CaptureEngine, ClickEngine, ExposureEngine, ScrollEngine};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrackerConfig;
pub use discovery::{
    AddressResolver, NoAddressResolver, StaticAddressResolver, ADDRESS_PLACEHOLDER,
};
pub use error::{ErrorDetail, Result, VigilError};
pub use event::{merge_payload, Event, EventKind};
pub use identity::{
    FileIdentityStore, IdentityContext, IdentityStore, InMemoryIdentityStore, USER_ID_KEY,
};
pub use intercept::{
    HttpFailure, HttpIntercept, HttpRequest, HttpResponse, HttpSlot, HttpTransport,
    NetworkCallRecord, NetworkProbe, NullHttpTransport, WireCall, WireIntercept, WireOutcome,
    WireSlot,
};
pub use schedule::{Debounce, Throttle, Ticker};
pub use session::Session;
pub use signal::{
    ActivityKind, ElementCandidate, ElementId, ElementInfo, PageContext, ScrollSample, Signal,
    VisibilitySample,
};
pub use sink::{CapturedEvent, EventSink, MemorySink, NullSink};
pub use tracker::{Environment, Tracker, TrackerHandle};

/// Vigil version embedded by hosts that report their instrumentation
pub const VIGIL_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_full_capture_flow() {
        let sink = Arc::new(MemorySink::new());
        let clock = Arc::new(ManualClock::at_epoch());
        let page = PageContext::new("https://example.com/article", "Article", "");
        let env = Environment::new(sink.clone(), page).with_clock(clock.clone());
        let tracker = Tracker::new(TrackerConfig::default(), env);

        let handle = tracker.install().unwrap();
        assert_eq!(tracker.session_id().as_deref(), Some(handle.session_id()));

        // Scroll below, then above the threshold; trailing edge decides
        tracker.dispatch(&Signal::Scroll(ScrollSample {
            scroll_top: 100.0,
            scroll_height: 1500.0,
            client_height: 500.0,
        }));
        clock.advance_ms(50);
        tracker.dispatch(&Signal::Scroll(ScrollSample {
            scroll_top: 700.0,
            scroll_height: 1500.0,
            client_height: 500.0,
        }));
        clock.advance_ms(200);
        tracker.poll();
        assert_eq!(sink.count_of("scroll"), 1);

        tracker.uninstall().unwrap();

        // Teardown emitted the terminal pagestay
        assert_eq!(sink.count_of("pagestay"), 1);

        // No residue: further signals are dropped
        tracker.dispatch(&Signal::Scroll(ScrollSample {
            scroll_top: 700.0,
            scroll_height: 1500.0,
            client_height: 500.0,
        }));
        tracker.poll();
        assert_eq!(sink.count_of("scroll"), 1);
    }
}
