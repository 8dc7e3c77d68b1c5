//! Engine controller
//!
//! The [`Tracker`] owns everything the original kept in module-level
//! globals: configuration, the session, identity, activity state, the
//! capture engines, and both network interceptors. All collaborators come
//! in through an explicit [`Environment`], so independent tracker instances
//! coexist (and tests inject manual clocks and memory sinks).
//!
//! Lifecycle: `install` activates every enabled sub-engine and wires the
//! interceptors; `uninstall` reverses all of it, leaving zero residue;
//! `reset` swaps in a fresh session without re-wiring.

use std::sync::{Arc, RwLock};

use serde_json::{json, Value};

use crate::capture::{
    ActivityEngine, CaptureContext, CaptureEngine, ClickEngine, ExposureEngine, ScrollEngine,
};
use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::discovery::{lookup_public_address, AddressResolver, NoAddressResolver};
use crate::error::{Result, VigilError};
use crate::event::{merge_payload, EventKind};
use crate::identity::{IdentityContext, IdentityStore, InMemoryIdentityStore};
use crate::intercept::{
    HttpIntercept, HttpSlot, NetworkProbe, NullHttpTransport, WireIntercept, WireSlot,
};
use crate::session::Session;
use crate::signal::{epoch_ms, ElementCandidate, ElementId, ElementInfo, PageContext, Signal};
use crate::sink::EventSink;

/// Injected collaborators for one tracker instance
pub struct Environment {
    pub sink: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
    pub identity_store: Arc<dyn IdentityStore>,
    pub address_resolver: Arc<dyn AddressResolver>,
    pub http_slot: Arc<HttpSlot>,
    pub wire_slot: Arc<WireSlot>,
    pub page: PageContext,
}

impl Environment {
    /// Environment with default collaborators: system clock, in-memory
    /// identity, no address discovery, and unconfigured primitive slots.
    pub fn new(sink: Arc<dyn EventSink>, page: PageContext) -> Self {
        Self {
            sink,
            clock: Arc::new(SystemClock::new()),
            identity_store: Arc::new(InMemoryIdentityStore::new()),
            address_resolver: Arc::new(NoAddressResolver::new()),
            http_slot: Arc::new(HttpSlot::new(Arc::new(NullHttpTransport::new()))),
            wire_slot: Arc::new(WireSlot::with_default_factory()),
            page,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_identity_store(mut self, store: Arc<dyn IdentityStore>) -> Self {
        self.identity_store = store;
        self
    }

    pub fn with_address_resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.address_resolver = resolver;
        self
    }

    pub fn with_http_slot(mut self, slot: Arc<HttpSlot>) -> Self {
        self.http_slot = slot;
        self
    }

    pub fn with_wire_slot(mut self, slot: Arc<WireSlot>) -> Self {
        self.wire_slot = slot;
        self
    }
}

/// Handle representing an active, wired tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerHandle {
    session_id: String,
}

impl TrackerHandle {
    /// Session id of the install this handle belongs to
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Everything that exists only while the tracker is installed
struct ActiveState {
    session: Session,
    user_id: String,
    /// Live session id shared with the network probes; updated on reset
    session_cell: Arc<RwLock<String>>,
    engines: Vec<Box<dyn CaptureEngine>>,
    http_intercept: Option<HttpIntercept>,
    wire_intercept: Option<WireIntercept>,
}

/// The behavior-telemetry engine controller
pub struct Tracker {
    config: TrackerConfig,
    env: Environment,
    state: RwLock<Option<ActiveState>>,
}

impl Tracker {
    /// Create an inactive tracker; nothing is wired until `install`
    pub fn new(config: TrackerConfig, env: Environment) -> Self {
        Self {
            config,
            env,
            state: RwLock::new(None),
        }
    }

    /// The configuration this tracker was built with
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Activate every enabled sub-engine and wire the interceptors.
    ///
    /// Idempotent: calling `install` while active returns the existing
    /// handle without touching anything. A sub-engine that fails to
    /// activate is logged and skipped; the rest still come up.
    pub fn install(&self) -> Result<TrackerHandle> {
        let mut state = self.state.write().map_err(|_| VigilError::StateLocked)?;
        if let Some(active) = state.as_ref() {
            tracing::info!(
                session_id = %active.session.session_id,
                "tracker already active; returning existing handle"
            );
            return Ok(TrackerHandle {
                session_id: active.session.session_id.clone(),
            });
        }

        self.config.validate()?;

        let session = Session::begin(self.env.clock.as_ref());
        let user_id = self.resolve_user_id();
        let session_cell = Arc::new(RwLock::new(session.session_id.clone()));

        let mut engines: Vec<Box<dyn CaptureEngine>> = Vec::new();
        {
            let ctx = self.context(&session, &user_id);
            let mut candidates: Vec<Box<dyn CaptureEngine>> = Vec::new();
            if self.config.enable_click_tracking {
                candidates.push(Box::new(ClickEngine::new(self.config.click_debounce_ms)));
            }
            if self.config.enable_scroll_tracking {
                candidates.push(Box::new(ScrollEngine::new(
                    self.config.scroll_threshold,
                    self.config.scroll_throttle_ms,
                )));
            }
            if self.config.enable_exposure_tracking {
                candidates.push(Box::new(ExposureEngine::new(self.config.exposure_threshold)));
            }
            if self.config.enable_stay_time_tracking {
                candidates.push(Box::new(ActivityEngine::new(
                    self.config.inactivity_threshold_ms,
                    self.config.activity_poll_interval_ms,
                )));
            }

            for mut engine in candidates {
                match engine.install(&ctx) {
                    Ok(()) => engines.push(engine),
                    Err(err) => {
                        // Partial degradation: skip this engine, keep going
                        let failure = VigilError::CaptureFailure {
                            engine: engine.name().to_string(),
                            reason: err.to_string(),
                        };
                        tracing::warn!(error = %failure, "capture engine skipped");
                    }
                }
            }
        }

        let (http_intercept, wire_intercept) = if self.config.enable_network_tracking {
            let probe = NetworkProbe::new(
                self.env.sink.clone(),
                self.env.clock.clone(),
                session_cell.clone(),
            );
            (
                Some(HttpIntercept::install(
                    self.env.http_slot.clone(),
                    probe.clone(),
                )),
                Some(WireIntercept::install(self.env.wire_slot.clone(), probe)),
            )
        } else {
            (None, None)
        };

        let handle = TrackerHandle {
            session_id: session.session_id.clone(),
        };

        {
            let ctx = self.context(&session, &user_id);
            self.emit_page_view(&ctx);
            self.emit_user_visit(&ctx, "new_visit", false);
        }

        tracing::info!(
            session_id = %session.session_id,
            engines = engines.len(),
            network = self.config.enable_network_tracking,
            "tracker installed"
        );

        *state = Some(ActiveState {
            session,
            user_id,
            session_cell,
            engines,
            http_intercept,
            wire_intercept,
        });

        Ok(handle)
    }

    /// Deactivate everything and restore both primitive slots.
    ///
    /// Emits the terminal `pagestay` (once per session) before tearing
    /// down. Idempotent: a second call is a no-op.
    pub fn uninstall(&self) -> Result<()> {
        let mut state = self.state.write().map_err(|_| VigilError::StateLocked)?;
        let Some(mut active) = state.take() else {
            tracing::debug!("uninstall called on inactive tracker");
            return Ok(());
        };

        {
            let ctx = self.context(&active.session, &active.user_id);
            for engine in active.engines.iter_mut() {
                engine.on_teardown(&ctx, active.session.started_at);
            }
        }

        for engine in active.engines.iter_mut() {
            engine.uninstall();
        }
        if let Some(mut intercept) = active.http_intercept.take() {
            intercept.uninstall();
        }
        if let Some(mut intercept) = active.wire_intercept.take() {
            intercept.uninstall();
        }

        tracing::info!(session_id = %active.session.session_id, "tracker uninstalled");
        Ok(())
    }

    /// Begin a fresh session without re-wiring listeners or interceptors
    pub fn reset(&self) -> Result<()> {
        let mut state = self.state.write().map_err(|_| VigilError::StateLocked)?;
        let Some(active) = state.as_mut() else {
            tracing::warn!("reset called on inactive tracker");
            return Ok(());
        };

        active.session = Session::begin(self.env.clock.as_ref());
        active.user_id = self.resolve_user_id();
        if let Ok(mut cell) = active.session_cell.write() {
            *cell = active.session.session_id.clone();
        }

        let ActiveState {
            session,
            user_id,
            engines,
            ..
        } = &mut *active;
        let ctx = context(&self.env, session, user_id);
        for engine in engines.iter_mut() {
            engine.reset(&ctx);
        }

        tracing::info!(session_id = %active.session.session_id, "tracker reset");
        Ok(())
    }

    /// Feed one raw signal to every interested engine
    pub fn dispatch(&self, signal: &Signal) {
        let Ok(mut state) = self.state.write() else {
            tracing::warn!("dispatch dropped: state lock poisoned");
            return;
        };
        let Some(active) = state.as_mut() else {
            return;
        };

        let ActiveState {
            session,
            user_id,
            engines,
            ..
        } = active;
        let ctx = context(&self.env, session, user_id);
        for engine in engines.iter_mut() {
            if engine.is_installed() && engine.wants(signal) {
                engine.on_signal(&ctx, signal);
            }
        }
    }

    /// Drive trailing-edge throttles and the activity ticker
    pub fn poll(&self) {
        let Ok(mut state) = self.state.write() else {
            tracing::warn!("poll dropped: state lock poisoned");
            return;
        };
        let Some(active) = state.as_mut() else {
            return;
        };

        let ActiveState {
            session,
            user_id,
            engines,
            ..
        } = active;
        let ctx = context(&self.env, session, user_id);
        for engine in engines.iter_mut() {
            engine.poll(&ctx);
        }
    }

    /// Offer exposure candidates once content is parsed
    pub fn observe_elements(&self, candidates: &[ElementCandidate]) {
        let Ok(mut state) = self.state.write() else {
            return;
        };
        let Some(active) = state.as_mut() else {
            return;
        };

        let ActiveState {
            session,
            user_id,
            engines,
            ..
        } = active;
        let ctx = context(&self.env, session, user_id);
        for engine in engines.iter_mut() {
            engine.observe(&ctx, candidates);
        }
    }

    /// Stop observing one element, releasing its record
    pub fn unobserve(&self, element: ElementId) {
        let Ok(mut state) = self.state.write() else {
            return;
        };
        let Some(active) = state.as_mut() else {
            return;
        };
        for engine in active.engines.iter_mut() {
            engine.unobserve(element);
        }
    }

    /// Page teardown hook: emits the terminal `pagestay` (once per
    /// session) while leaving everything wired.
    pub fn page_unload(&self) {
        let Ok(mut state) = self.state.write() else {
            return;
        };
        let Some(active) = state.as_mut() else {
            return;
        };

        let ActiveState {
            session,
            user_id,
            engines,
            ..
        } = active;
        let ctx = context(&self.env, session, user_id);
        for engine in engines.iter_mut() {
            engine.on_teardown(&ctx, session.started_at);
        }
    }

    /// Manually synthesize one click event; bypasses the debounce gate
    pub fn track_click(&self, element: &ElementInfo, extra: Option<Value>) -> Result<()> {
        self.with_active(|ctx| {
            let now = ctx.now();
            let payload = merge_payload(
                element.payload_fields(),
                Some(json!({
                    "url": ctx.page.url,
                    "session_id": ctx.session_id,
                    "timestamp": epoch_ms(now),
                })),
            );
            ctx.emit(EventKind::Click, merge_payload(payload, extra));
        })
    }

    /// Manually synthesize one scroll event at the given ratio
    pub fn track_scroll(&self, ratio: f64, extra: Option<Value>) -> Result<()> {
        self.with_active(|ctx| {
            let now = ctx.now();
            let payload = json!({
                "scroll_percentage": ratio,
                "url": ctx.page.url,
                "session_id": ctx.session_id,
                "timestamp": epoch_ms(now),
            });
            ctx.emit(EventKind::Scroll, merge_payload(payload, extra));
        })
    }

    /// Manually synthesize one exposure event for an element
    pub fn track_exposure(&self, element: &ElementInfo, extra: Option<Value>) -> Result<()> {
        self.with_active(|ctx| {
            let now = ctx.now();
            let payload = merge_payload(
                element.payload_fields(),
                Some(json!({
                    "intersection_ratio": 1.0,
                    "url": ctx.page.url,
                    "session_id": ctx.session_id,
                    "timestamp": epoch_ms(now),
                })),
            );
            ctx.emit(EventKind::Exposure, merge_payload(payload, extra));
        })
    }

    /// Record one additional user visit (UV +1); never deduplicated
    pub fn track_new_visit(&self) -> Result<()> {
        let state = self.state.read().map_err(|_| VigilError::StateLocked)?;
        let Some(active) = state.as_ref() else {
            return Err(VigilError::NotActive);
        };
        let ctx = context(&self.env, &active.session, &active.user_id);
        self.emit_user_visit(&ctx, "manual_visit", true);
        Ok(())
    }

    /// Session id of the active install, if any
    pub fn session_id(&self) -> Option<String> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.as_ref().map(|a| a.session.session_id.clone()))
    }

    /// The durable user id; works whether or not the tracker is active
    pub fn user_id(&self) -> Result<String> {
        IdentityContext::new(self.env.identity_store.clone()).user_id()
    }

    /// Whether the tracker is currently installed
    pub fn is_active(&self) -> bool {
        self.state
            .read()
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    fn with_active<F>(&self, emit: F) -> Result<()>
    where
        F: FnOnce(&CaptureContext<'_>),
    {
        let state = self.state.read().map_err(|_| VigilError::StateLocked)?;
        let Some(active) = state.as_ref() else {
            return Err(VigilError::NotActive);
        };
        let ctx = context(&self.env, &active.session, &active.user_id);
        emit(&ctx);
        Ok(())
    }

    fn context<'a>(&'a self, session: &'a Session, user_id: &'a str) -> CaptureContext<'a> {
        context(&self.env, session, user_id)
    }

    fn resolve_user_id(&self) -> String {
        let identity = IdentityContext::new(self.env.identity_store.clone());
        match identity.user_id() {
            Ok(user_id) => user_id,
            Err(err) => {
                // Degrade to an ephemeral id rather than failing the install
                tracing::warn!(
                    store = self.env.identity_store.name(),
                    error = %err,
                    "identity store unavailable; using ephemeral user id"
                );
                format!("user_{}", uuid::Uuid::new_v4().simple())
            }
        }
    }

    fn emit_page_view(&self, ctx: &CaptureContext<'_>) {
        let now = ctx.now();
        ctx.emit(
            EventKind::Pageview,
            json!({
                "url": ctx.page.url,
                "title": ctx.page.title,
                "referrer": ctx.page.referrer,
                "session_id": ctx.session_id,
                "user_id": ctx.user_id,
                "tracker_version": crate::VIGIL_VERSION,
                "timestamp": epoch_ms(now),
            }),
        );
    }

    fn emit_user_visit(&self, ctx: &CaptureContext<'_>, visit_type: &str, manual: bool) {
        let user_ip = lookup_public_address(
            self.env.address_resolver.clone(),
            self.config.address_discovery_timeout_ms,
        );

        let now = ctx.now();
        let mut payload = json!({
            "user_id": ctx.user_id,
            "user_ip": user_ip,
            "session_id": ctx.session_id,
            "url": ctx.page.url,
            "visit_type": visit_type,
            "visit_count": 1,
            "timestamp": epoch_ms(now),
        });
        if manual {
            if let Value::Object(map) = &mut payload {
                map.insert("source".to_string(), json!("manual_trigger"));
            }
        }
        ctx.emit(EventKind::Uservisit, payload);
    }
}

fn context<'a>(env: &'a Environment, session: &'a Session, user_id: &'a str) -> CaptureContext<'a> {
    CaptureContext {
        clock: env.clock.as_ref(),
        sink: env.sink.as_ref(),
        page: &env.page,
        session_id: &session.session_id,
        user_id,
    }
}
