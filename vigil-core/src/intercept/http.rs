//! Fetch-style call interception
//!
//! The promise-shaped primitive is an async [`HttpTransport`] held in an
//! [`HttpSlot`]. The intercepting wrapper records the call before invoking
//! the captured original and re-raises the original outcome unchanged after
//! emitting the `network` event.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use super::{NetworkCallRecord, NetworkProbe};

/// One fetch-style request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Explicit method; `None` means the primitive's default (GET)
    pub method: Option<String>,
    /// Resolved request URL
    pub url: String,
    /// Optional request body
    pub body: Option<String>,
}

impl HttpRequest {
    /// A GET request for the given URL
    pub fn get(url: &str) -> Self {
        Self {
            method: None,
            url: url.to_string(),
            body: None,
        }
    }

    /// A request with an explicit method
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: Some(method.to_uppercase()),
            url: url.to_string(),
            body: None,
        }
    }

    /// The effective method, defaulting to GET
    pub fn method_or_default(&self) -> &str {
        self.method.as_deref().unwrap_or("GET")
    }
}

/// One fetch-style response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// A fetch-style rejection; passes through the interceptor unchanged
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HttpFailure {
    pub message: String,
}

impl HttpFailure {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// The fetch-style call-initiation primitive
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute one call to its terminal state
    async fn execute(&self, request: HttpRequest) -> std::result::Result<HttpResponse, HttpFailure>;

    /// Transport name (for logging)
    fn name(&self) -> &'static str;
}

/// Transport that rejects every call (slot default until the host wires a
/// real one)
#[derive(Debug, Default, Clone)]
pub struct NullHttpTransport;

impl NullHttpTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HttpTransport for NullHttpTransport {
    async fn execute(
        &self,
        _request: HttpRequest,
    ) -> std::result::Result<HttpResponse, HttpFailure> {
        Err(HttpFailure::new("no http transport configured"))
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Global slot holding the current fetch-style primitive
///
/// Callers go through the slot so interception is invisible to them; the
/// interceptor swaps occupants without touching call sites.
pub struct HttpSlot {
    current: RwLock<Arc<dyn HttpTransport>>,
}

impl HttpSlot {
    /// Create a slot occupied by the given base transport
    pub fn new(base: Arc<dyn HttpTransport>) -> Self {
        Self {
            current: RwLock::new(base),
        }
    }

    /// The current occupant
    pub fn current(&self) -> Arc<dyn HttpTransport> {
        self.current.read().unwrap().clone()
    }

    /// Execute a call through the current occupant
    pub async fn execute(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, HttpFailure> {
        let transport = self.current();
        transport.execute(request).await
    }

    pub(crate) fn swap(&self, next: Arc<dyn HttpTransport>) -> Arc<dyn HttpTransport> {
        let mut current = self.current.write().unwrap();
        std::mem::replace(&mut *current, next)
    }
}

/// The observing wrapper installed over the captured original
struct ObservedHttp {
    inner: Arc<dyn HttpTransport>,
    probe: NetworkProbe,
}

#[async_trait]
impl HttpTransport for ObservedHttp {
    async fn execute(&self, request: HttpRequest) -> std::result::Result<HttpResponse, HttpFailure> {
        let record = NetworkCallRecord {
            method: request.method_or_default().to_string(),
            url: request.url.clone(),
            started_at: self.probe.now(),
        };

        match self.inner.execute(request).await {
            Ok(response) => {
                self.probe.emit_success("fetch", &record, response.status);
                Ok(response)
            }
            Err(failure) => {
                self.probe.emit_failure("fetch", &record, &failure.message);
                Err(failure)
            }
        }
    }

    fn name(&self) -> &'static str {
        "observed-http"
    }
}

/// Reversible interception of an [`HttpSlot`]
///
/// Captures the slot occupant once at install; `uninstall` puts that exact
/// reference back. Nested installs unwind in LIFO order.
pub struct HttpIntercept {
    slot: Arc<HttpSlot>,
    original: Option<Arc<dyn HttpTransport>>,
}

impl HttpIntercept {
    /// Swap the observing wrapper into the slot
    pub fn install(slot: Arc<HttpSlot>, probe: NetworkProbe) -> Self {
        let original = slot.current();
        slot.swap(Arc::new(ObservedHttp {
            inner: original.clone(),
            probe,
        }));
        tracing::debug!(transport = original.name(), "http primitive intercepted");
        Self {
            slot,
            original: Some(original),
        }
    }

    /// Restore the captured original. Safe to call repeatedly.
    pub fn uninstall(&mut self) {
        if let Some(original) = self.original.take() {
            self.slot.swap(original);
            tracing::debug!("http primitive restored");
        }
    }

    /// Whether the wrapper is still in place
    pub fn is_installed(&self) -> bool {
        self.original.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::test_support::probe;

    /// Scripted transport: succeeds or fails per request URL
    struct ScriptedHttp;

    #[async_trait]
    impl HttpTransport for ScriptedHttp {
        async fn execute(
            &self,
            request: HttpRequest,
        ) -> std::result::Result<HttpResponse, HttpFailure> {
            if request.url.contains("fail") {
                Err(HttpFailure::new("connection refused"))
            } else {
                Ok(HttpResponse {
                    status: 200,
                    body: format!("body-for-{}", request.url),
                })
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_success_passes_through_unchanged() {
        let (probe, sink, clock) = probe();
        let base: Arc<dyn HttpTransport> = Arc::new(ScriptedHttp);
        let slot = Arc::new(HttpSlot::new(base.clone()));

        let direct = base.execute(HttpRequest::get("https://api/ok")).await;

        let mut intercept = HttpIntercept::install(slot.clone(), probe);
        clock.advance_ms(40);
        let wrapped = slot.execute(HttpRequest::get("https://api/ok")).await;

        assert_eq!(direct.unwrap(), wrapped.unwrap());

        let events = sink.captured_of("network");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["type"], "fetch");
        assert_eq!(events[0].payload["method"], "GET");
        assert_eq!(events[0].payload["status"], 200);
        assert_eq!(events[0].payload["session_id"], "session-test");

        intercept.uninstall();
    }

    #[tokio::test]
    async fn test_failure_reraised_unchanged() {
        let (probe, sink, _clock) = probe();
        let base: Arc<dyn HttpTransport> = Arc::new(ScriptedHttp);
        let slot = Arc::new(HttpSlot::new(base.clone()));
        let _intercept = HttpIntercept::install(slot.clone(), probe);

        let outcome = slot
            .execute(HttpRequest::new("POST", "https://api/fail"))
            .await;

        assert_eq!(outcome.unwrap_err(), HttpFailure::new("connection refused"));

        let events = sink.captured_of("network");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["error"], "connection refused");
        assert_eq!(events[0].payload["method"], "POST");
        assert!(events[0].payload.get("status").is_none());
    }

    #[tokio::test]
    async fn test_uninstall_restores_exact_reference() {
        let (probe, _sink, _clock) = probe();
        let base: Arc<dyn HttpTransport> = Arc::new(ScriptedHttp);
        let slot = Arc::new(HttpSlot::new(base.clone()));

        let mut intercept = HttpIntercept::install(slot.clone(), probe);
        assert!(!Arc::ptr_eq(&slot.current(), &base));

        intercept.uninstall();
        assert!(Arc::ptr_eq(&slot.current(), &base));

        // Second uninstall is a no-op
        intercept.uninstall();
        assert!(Arc::ptr_eq(&slot.current(), &base));
        assert!(!intercept.is_installed());
    }

    #[tokio::test]
    async fn test_nested_installs_unwind_lifo() {
        let (probe, sink, _clock) = probe();
        let base: Arc<dyn HttpTransport> = Arc::new(ScriptedHttp);
        let slot = Arc::new(HttpSlot::new(base.clone()));

        let mut outer = HttpIntercept::install(slot.clone(), probe.clone());
        let inner_wrapper = slot.current();
        let mut inner = HttpIntercept::install(slot.clone(), probe);

        // Two layers: one call emits two network events
        let _ = slot.execute(HttpRequest::get("https://api/ok")).await;
        assert_eq!(sink.count_of("network"), 2);

        inner.uninstall();
        assert!(Arc::ptr_eq(&slot.current(), &inner_wrapper));

        outer.uninstall();
        assert!(Arc::ptr_eq(&slot.current(), &base));
    }

    #[tokio::test]
    async fn test_emission_duration_uses_clock() {
        let (probe, sink, clock) = probe();

        struct SlowScripted {
            clock: Arc<crate::clock::ManualClock>,
        }

        #[async_trait]
        impl HttpTransport for SlowScripted {
            async fn execute(
                &self,
                _request: HttpRequest,
            ) -> std::result::Result<HttpResponse, HttpFailure> {
                self.clock.advance_ms(120);
                Ok(HttpResponse {
                    status: 204,
                    body: String::new(),
                })
            }

            fn name(&self) -> &'static str {
                "slow-scripted"
            }
        }

        let slot = Arc::new(HttpSlot::new(Arc::new(SlowScripted {
            clock: clock.clone(),
        })));
        let _intercept = HttpIntercept::install(slot.clone(), probe);

        let _ = slot.execute(HttpRequest::get("https://api/slow")).await;
        let events = sink.captured_of("network");
        assert_eq!(events[0].payload["duration_ms"], 120);
    }
}
