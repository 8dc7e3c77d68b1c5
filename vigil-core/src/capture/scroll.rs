//! Scroll threshold capture
//!
//! A single page-global latch: crossing the configured depth upward emits
//! exactly one event; falling back below re-arms it silently. Samples are
//! coalesced through a trailing-edge throttle, so the last position in a
//! rapid sequence decides the transition.

use serde_json::json;

use crate::error::Result;
use crate::event::EventKind;
use crate::schedule::Throttle;
use crate::signal::{epoch_ms, ScrollSample, Signal};

use super::{CaptureContext, CaptureEngine};

/// Latch states: `latched == false` is BELOW, `true` is ABOVE.
pub struct ScrollEngine {
    threshold: f64,
    throttle: Throttle<ScrollSample>,
    latched: bool,
    installed: bool,
}

impl ScrollEngine {
    pub fn new(threshold: f64, throttle_ms: u64) -> Self {
        Self {
            threshold,
            throttle: Throttle::new(throttle_ms),
            latched: false,
            installed: false,
        }
    }

    fn evaluate(&mut self, ctx: &CaptureContext<'_>, sample: ScrollSample) {
        // Unscrollable page: not a crossing in either direction
        let Some(ratio) = sample.ratio() else {
            return;
        };

        if ratio >= self.threshold {
            if !self.latched {
                self.latched = true;
                let now = ctx.now();
                ctx.emit(
                    EventKind::Scroll,
                    json!({
                        "scroll_top": sample.scroll_top,
                        "scroll_percentage": ratio,
                        "scroll_height": sample.scroll_height,
                        "client_height": sample.client_height,
                        "url": ctx.page.url,
                        "session_id": ctx.session_id,
                        "timestamp": epoch_ms(now),
                    }),
                );
            }
        } else if self.latched {
            // Downward reset, no event
            self.latched = false;
        }
    }
}

impl CaptureEngine for ScrollEngine {
    fn name(&self) -> &'static str {
        "scroll"
    }

    fn install(&mut self, _ctx: &CaptureContext<'_>) -> Result<()> {
        self.installed = true;
        Ok(())
    }

    fn uninstall(&mut self) {
        self.installed = false;
        self.latched = false;
        self.throttle.cancel_pending();
    }

    fn is_installed(&self) -> bool {
        self.installed
    }

    fn wants(&self, signal: &Signal) -> bool {
        matches!(signal, Signal::Scroll(_))
    }

    fn on_signal(&mut self, ctx: &CaptureContext<'_>, signal: &Signal) {
        if !self.installed {
            return;
        }
        let Signal::Scroll(sample) = signal else {
            return;
        };

        let now = ctx.now();
        self.throttle.submit(now, *sample);
        // A zero-interval throttle releases immediately
        if let Some(due) = self.throttle.poll(now) {
            self.evaluate(ctx, due);
        }
    }

    fn poll(&mut self, ctx: &CaptureContext<'_>) {
        if !self.installed {
            return;
        }
        if let Some(due) = self.throttle.poll(ctx.now()) {
            self.evaluate(ctx, due);
        }
    }

    fn reset(&mut self, _ctx: &CaptureContext<'_>) {
        self.latched = false;
        self.throttle.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::test_support::Fixture;

    fn scroll_to(ratio: f64) -> Signal {
        // 1000px of scrollable range below a 500px viewport
        Signal::Scroll(ScrollSample {
            scroll_top: ratio * 1000.0,
            scroll_height: 1500.0,
            client_height: 500.0,
        })
    }

    fn engine(fixture: &Fixture, threshold: f64, throttle_ms: u64) -> ScrollEngine {
        let mut engine = ScrollEngine::new(threshold, throttle_ms);
        engine.install(&fixture.ctx()).unwrap();
        engine
    }

    #[test]
    fn test_single_event_per_upward_crossing() {
        let fixture = Fixture::new();
        let mut engine = engine(&fixture, 0.5, 0);

        engine.on_signal(&fixture.ctx(), &scroll_to(0.6));
        assert_eq!(fixture.sink.count_of("scroll"), 1);
        let payload = &fixture.sink.captured_of("scroll")[0].payload;
        assert!((payload["scroll_percentage"].as_f64().unwrap() - 0.6).abs() < 1e-9);

        // Still above: no second event
        engine.on_signal(&fixture.ctx(), &scroll_to(0.8));
        assert_eq!(fixture.sink.count_of("scroll"), 1);

        // Drop below: silent reset
        engine.on_signal(&fixture.ctx(), &scroll_to(0.4));
        assert_eq!(fixture.sink.count_of("scroll"), 1);

        // Cross again: second event
        engine.on_signal(&fixture.ctx(), &scroll_to(0.7));
        assert_eq!(fixture.sink.count_of("scroll"), 2);
    }

    #[test]
    fn test_throttle_coalesces_to_trailing_sample() {
        let fixture = Fixture::new();
        let mut engine = engine(&fixture, 0.5, 150);

        // Rapid burst ending below the threshold
        engine.on_signal(&fixture.ctx(), &scroll_to(0.6));
        fixture.clock.advance_ms(50);
        engine.on_signal(&fixture.ctx(), &scroll_to(0.9));
        fixture.clock.advance_ms(50);
        engine.on_signal(&fixture.ctx(), &scroll_to(0.3));

        // Nothing fired inside the window
        assert_eq!(fixture.sink.count_of("scroll"), 0);

        fixture.clock.advance_ms(100);
        engine.poll(&fixture.ctx());

        // Trailing sample (0.3) is authoritative: no crossing happened
        assert_eq!(fixture.sink.count_of("scroll"), 0);

        // A burst ending above fires exactly once
        engine.on_signal(&fixture.ctx(), &scroll_to(0.2));
        fixture.clock.advance_ms(50);
        engine.on_signal(&fixture.ctx(), &scroll_to(0.7));
        fixture.clock.advance_ms(150);
        engine.poll(&fixture.ctx());
        assert_eq!(fixture.sink.count_of("scroll"), 1);
    }

    #[test]
    fn test_unscrollable_page_never_crosses() {
        let fixture = Fixture::new();
        let mut engine = engine(&fixture, 0.5, 0);

        engine.on_signal(
            &fixture.ctx(),
            &Signal::Scroll(ScrollSample {
                scroll_top: 100.0,
                scroll_height: 500.0,
                client_height: 500.0,
            }),
        );
        assert_eq!(fixture.sink.count(), 0);
    }

    #[test]
    fn test_reset_rearms_latch() {
        let fixture = Fixture::new();
        let mut engine = engine(&fixture, 0.5, 0);

        engine.on_signal(&fixture.ctx(), &scroll_to(0.6));
        assert_eq!(fixture.sink.count_of("scroll"), 1);

        engine.reset(&fixture.ctx());

        // Same depth after reset counts as a new crossing
        engine.on_signal(&fixture.ctx(), &scroll_to(0.6));
        assert_eq!(fixture.sink.count_of("scroll"), 2);
    }
}
