//! Open/send-style call interception
//!
//! Mirrors the request-object pattern: a call is `open`ed with method and
//! URL, `send` starts it, and a single completion observer fires at the
//! terminal state. The interceptor swaps the call factory so every new call
//! carries a probe: at send time the probe splices itself ahead of the
//! caller's observer. Emit first, then forward, never swallow.

use std::sync::{Arc, RwLock};

use super::{NetworkCallRecord, NetworkProbe};

/// Terminal state of an open/send-style call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireOutcome {
    /// Completed with an HTTP status
    Status(u16),
    /// Failed before producing a status
    Failed(String),
}

/// Caller-registered completion observer
pub type CompletionObserver = Box<dyn FnMut(&WireOutcome) + Send>;

/// One open/send-style call handle
#[derive(Default)]
pub struct WireCall {
    method: Option<String>,
    url: Option<String>,
    observer: Option<CompletionObserver>,
    probe: Option<NetworkProbe>,
    record: Option<NetworkCallRecord>,
    sent: bool,
    finished: bool,
}

impl WireCall {
    /// A plain, uninstrumented call
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach_probe(&mut self, probe: NetworkProbe) {
        self.probe = Some(probe);
    }

    /// Record method and URL; an attached probe captures the call record here
    pub fn open(&mut self, method: &str, url: &str) {
        let method = method.to_uppercase();
        self.method = Some(method.clone());
        self.url = Some(url.to_string());
        if let Some(probe) = &self.probe {
            self.record = Some(NetworkCallRecord {
                method,
                url: url.to_string(),
                started_at: probe.now(),
            });
        }
    }

    /// Register the completion observer, replacing and returning any
    /// previous one (single-slot semantics, like `onreadystatechange`)
    pub fn set_on_complete(&mut self, observer: CompletionObserver) -> Option<CompletionObserver> {
        self.observer.replace(observer)
    }

    /// Start the call. An attached probe splices its emission ahead of the
    /// caller's observer at this point.
    pub fn send(&mut self) {
        if self.sent {
            return;
        }
        self.sent = true;

        if let (Some(probe), Some(record)) = (self.probe.clone(), self.record.clone()) {
            let mut caller = self.observer.take();
            self.observer = Some(Box::new(move |outcome: &WireOutcome| {
                match outcome {
                    WireOutcome::Status(status) => probe.emit_success("wire", &record, *status),
                    WireOutcome::Failed(message) => probe.emit_failure("wire", &record, message),
                }
                if let Some(observer) = caller.as_mut() {
                    observer(outcome);
                }
            }));
        }
    }

    /// Drive the call to its terminal state. The completion observer runs
    /// exactly once; a call that was never sent completes silently.
    pub fn finish(&mut self, outcome: WireOutcome) {
        if !self.sent || self.finished {
            return;
        }
        self.finished = true;
        if let Some(mut observer) = self.observer.take() {
            observer(&outcome);
        }
    }

    /// Method recorded at open time
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// URL recorded at open time
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

/// The open/send call-initiation primitive: a factory producing fresh calls
pub type WireFactory = dyn Fn() -> WireCall + Send + Sync;

/// Global slot holding the current call factory
pub struct WireSlot {
    current: RwLock<Arc<WireFactory>>,
}

impl WireSlot {
    /// Create a slot around the given factory
    pub fn new(factory: Arc<WireFactory>) -> Self {
        Self {
            current: RwLock::new(factory),
        }
    }

    /// A slot producing plain calls
    pub fn with_default_factory() -> Self {
        Self::new(Arc::new(WireCall::new))
    }

    /// Construct a call through the current factory
    pub fn create(&self) -> WireCall {
        let factory = self.current();
        factory()
    }

    /// The current occupant
    pub fn current(&self) -> Arc<WireFactory> {
        self.current.read().unwrap().clone()
    }

    pub(crate) fn swap(&self, next: Arc<WireFactory>) -> Arc<WireFactory> {
        let mut current = self.current.write().unwrap();
        std::mem::replace(&mut *current, next)
    }
}

impl Default for WireSlot {
    fn default() -> Self {
        Self::with_default_factory()
    }
}

/// Reversible interception of a [`WireSlot`]
pub struct WireIntercept {
    slot: Arc<WireSlot>,
    original: Option<Arc<WireFactory>>,
}

impl WireIntercept {
    /// Swap in a factory whose calls carry the probe
    pub fn install(slot: Arc<WireSlot>, probe: NetworkProbe) -> Self {
        let original = slot.current();
        let inner = original.clone();
        slot.swap(Arc::new(move || {
            let mut call = inner();
            call.attach_probe(probe.clone());
            call
        }));
        tracing::debug!("wire primitive intercepted");
        Self {
            slot,
            original: Some(original),
        }
    }

    /// Restore the captured factory. Safe to call repeatedly.
    pub fn uninstall(&mut self) {
        if let Some(original) = self.original.take() {
            self.slot.swap(original);
            tracing::debug!("wire primitive restored");
        }
    }

    /// Whether the wrapper is still in place
    pub fn is_installed(&self) -> bool {
        self.original.is_some()
    }
}
