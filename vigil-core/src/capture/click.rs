//! Click capture
//!
//! Clicks pass straight through to the sink; the only state is the optional
//! debounce gate that suppresses bursts from double-clicks and rage clicks.

use serde_json::json;

use crate::error::Result;
use crate::event::{merge_payload, EventKind};
use crate::schedule::Debounce;
use crate::signal::{epoch_ms, Signal};

use super::{CaptureContext, CaptureEngine};

/// Pass-through click engine with an optional quiet-period gate
pub struct ClickEngine {
    debounce: Debounce,
    installed: bool,
}

impl ClickEngine {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce: Debounce::new(debounce_ms),
            installed: false,
        }
    }
}

impl CaptureEngine for ClickEngine {
    fn name(&self) -> &'static str {
        "click"
    }

    fn install(&mut self, _ctx: &CaptureContext<'_>) -> Result<()> {
        self.installed = true;
        Ok(())
    }

    fn uninstall(&mut self) {
        self.installed = false;
        self.debounce.reset();
    }

    fn is_installed(&self) -> bool {
        self.installed
    }

    fn wants(&self, signal: &Signal) -> bool {
        matches!(signal, Signal::Click { .. })
    }

    fn on_signal(&mut self, ctx: &CaptureContext<'_>, signal: &Signal) {
        if !self.installed {
            return;
        }
        let Signal::Click { target, x, y } = signal else {
            return;
        };

        let now = ctx.now();
        if !self.debounce.allow(now) {
            return;
        }

        let payload = merge_payload(
            target.payload_fields(),
            Some(json!({
                "x": x,
                "y": y,
                "url": ctx.page.url,
                "session_id": ctx.session_id,
                "timestamp": epoch_ms(now),
            })),
        );
        ctx.emit(EventKind::Click, payload);
    }

    fn reset(&mut self, _ctx: &CaptureContext<'_>) {
        self.debounce.reset();
    }
}
