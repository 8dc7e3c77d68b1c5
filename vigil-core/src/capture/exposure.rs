//! Element exposure capture
//!
//! One record per observed element, keyed by the host-assigned opaque id.
//! An exposure period opens when the element is intersecting at or above the
//! threshold ratio and closes when it stops; each continuous period emits
//! exactly one `exposure` event at its start and one `exposure_end` with the
//! duration at its close.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::clock::elapsed_ms;
use crate::error::Result;
use crate::event::{merge_payload, EventKind};
use crate::signal::{epoch_ms, ElementCandidate, ElementId, Signal, VisibilitySample};

use super::{CaptureContext, CaptureEngine};

/// Tags registered for observation without an explicit opt-in
pub const OBSERVED_TAGS: &[&str] = &["img", "video"];

/// Per-element observation state
#[derive(Debug, Clone)]
pub struct ExposureRecord {
    /// When the element was first reported by the observer
    pub first_observed_at: DateTime<Utc>,
    /// Start of the currently open exposure period, if any
    pub exposure_started_at: Option<DateTime<Utc>>,
}

/// Visibility-threshold engine with per-element records
pub struct ExposureEngine {
    threshold: f64,
    watched: HashSet<ElementId>,
    records: HashMap<ElementId, ExposureRecord>,
    installed: bool,
}

impl ExposureEngine {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            watched: HashSet::new(),
            records: HashMap::new(),
            installed: false,
        }
    }

    /// Number of elements currently registered with the observer
    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    fn matches_selector(candidate: &ElementCandidate) -> bool {
        candidate.opted_in
            || OBSERVED_TAGS.contains(&candidate.info.tag.to_lowercase().as_str())
    }

    fn handle_sample(&mut self, ctx: &CaptureContext<'_>, sample: &VisibilitySample) {
        let now = ctx.now();
        let record = self
            .records
            .entry(sample.element)
            .or_insert_with(|| ExposureRecord {
                first_observed_at: now,
                exposure_started_at: None,
            });

        let exposed = sample.intersecting && sample.ratio >= self.threshold;

        if exposed {
            if record.exposure_started_at.is_none() {
                record.exposure_started_at = Some(now);
                let payload = merge_payload(
                    sample.info.payload_fields(),
                    Some(json!({
                        "intersection_ratio": sample.ratio,
                        "threshold": self.threshold,
                        "start_listen_time": epoch_ms(record.first_observed_at),
                        "start_expose_time": epoch_ms(now),
                        "event_send_time": epoch_ms(now),
                        "url": ctx.page.url,
                        "session_id": ctx.session_id,
                        "timestamp": epoch_ms(now),
                    })),
                );
                ctx.emit(EventKind::Exposure, payload);
            }
            // Already exposed: continuation of the same period, no event
        } else if let Some(started) = record.exposure_started_at.take() {
            let payload = merge_payload(
                sample.info.payload_fields(),
                Some(json!({
                    "exposure_duration_ms": elapsed_ms(started, now),
                    "url": ctx.page.url,
                    "session_id": ctx.session_id,
                    "timestamp": epoch_ms(now),
                })),
            );
            ctx.emit(EventKind::ExposureEnd, payload);
        }
    }
}

impl CaptureEngine for ExposureEngine {
    fn name(&self) -> &'static str {
        "exposure"
    }

    fn install(&mut self, _ctx: &CaptureContext<'_>) -> Result<()> {
        self.installed = true;
        Ok(())
    }

    fn uninstall(&mut self) {
        self.installed = false;
        self.watched.clear();
        self.records.clear();
    }

    fn is_installed(&self) -> bool {
        self.installed
    }

    fn wants(&self, signal: &Signal) -> bool {
        matches!(signal, Signal::Visibility(_))
    }

    fn on_signal(&mut self, ctx: &CaptureContext<'_>, signal: &Signal) {
        if !self.installed {
            return;
        }
        let Signal::Visibility(sample) = signal else {
            return;
        };
        if !self.watched.contains(&sample.element) {
            return;
        }
        self.handle_sample(ctx, sample);
    }

    fn observe(&mut self, _ctx: &CaptureContext<'_>, candidates: &[ElementCandidate]) {
        if !self.installed {
            return;
        }
        for candidate in candidates {
            if Self::matches_selector(candidate) {
                self.watched.insert(candidate.element);
            }
        }
    }

    fn unobserve(&mut self, element: ElementId) {
        self.watched.remove(&element);
        self.records.remove(&element);
    }

    fn reset(&mut self, _ctx: &CaptureContext<'_>) {
        // Registration survives a reset; per-session periods do not
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::test_support::Fixture;
    use crate::signal::ElementInfo;

    fn img(id: u64) -> ElementCandidate {
        ElementCandidate {
            element: ElementId(id),
            info: ElementInfo {
                tag: "img".to_string(),
                id: format!("img-{}", id),
                class_name: "hero".to_string(),
                text: String::new(),
            },
            opted_in: false,
        }
    }

    fn report(id: u64, ratio: f64, intersecting: bool) -> Signal {
        Signal::Visibility(VisibilitySample {
            element: ElementId(id),
            info: ElementInfo {
                tag: "img".to_string(),
                id: format!("img-{}", id),
                class_name: "hero".to_string(),
                text: String::new(),
            },
            ratio,
            intersecting,
        })
    }

    fn engine(fixture: &Fixture, threshold: f64, candidates: &[ElementCandidate]) -> ExposureEngine {
        let mut engine = ExposureEngine::new(threshold);
        engine.install(&fixture.ctx()).unwrap();
        engine.observe(&fixture.ctx(), candidates);
        engine
    }

    #[test]
    fn test_one_event_per_continuous_period() {
        let fixture = Fixture::new();
        let mut engine = engine(&fixture, 0.5, &[img(1)]);

        engine.on_signal(&fixture.ctx(), &report(1, 0.6, true));
        engine.on_signal(&fixture.ctx(), &report(1, 0.7, true));
        engine.on_signal(&fixture.ctx(), &report(1, 0.6, true));

        assert_eq!(fixture.sink.count_of("exposure"), 1);
    }

    #[test]
    fn test_reentry_starts_fresh_period() {
        let fixture = Fixture::new();
        let mut engine = engine(&fixture, 0.5, &[img(1)]);

        engine.on_signal(&fixture.ctx(), &report(1, 0.8, true));
        assert_eq!(fixture.sink.count_of("exposure"), 1);

        fixture.clock.advance_ms(2000);
        engine.on_signal(&fixture.ctx(), &report(1, 0.2, true));
        assert_eq!(fixture.sink.count_of("exposure_end"), 1);
        let end = &fixture.sink.captured_of("exposure_end")[0].payload;
        assert_eq!(end["exposure_duration_ms"], 2000);

        engine.on_signal(&fixture.ctx(), &report(1, 0.9, true));
        assert_eq!(fixture.sink.count_of("exposure"), 2);
    }

    #[test]
    fn test_exposure_payload() {
        let fixture = Fixture::new();
        let mut engine = engine(&fixture, 0.5, &[img(1)]);

        fixture.clock.advance_ms(100);
        engine.on_signal(&fixture.ctx(), &report(1, 0.75, true));

        let exposure = &fixture.sink.captured_of("exposure")[0].payload;
        assert_eq!(exposure["element"], "img");
        assert_eq!(exposure["intersection_ratio"], 0.75);
        assert_eq!(exposure["threshold"], 0.5);
        assert_eq!(exposure["start_listen_time"], exposure["start_expose_time"]);
        assert_eq!(exposure["session_id"], "session-test");
    }

    #[test]
    fn test_intersecting_below_ratio_does_not_open_period() {
        let fixture = Fixture::new();
        let mut engine = engine(&fixture, 0.5, &[img(1)]);

        engine.on_signal(&fixture.ctx(), &report(1, 0.3, true));
        engine.on_signal(&fixture.ctx(), &report(1, 0.49, true));
        assert_eq!(fixture.sink.count(), 0);
    }

    #[test]
    fn test_selector_filtering() {
        let fixture = Fixture::new();
        let div = ElementCandidate {
            element: ElementId(2),
            info: ElementInfo {
                tag: "div".to_string(),
                ..Default::default()
            },
            opted_in: false,
        };
        let opted_div = ElementCandidate {
            element: ElementId(3),
            info: ElementInfo {
                tag: "div".to_string(),
                ..Default::default()
            },
            opted_in: true,
        };
        let engine = engine(&fixture, 0.5, &[img(1), div, opted_div]);

        // Plain div rejected; img and opted-in div registered
        assert_eq!(engine.watched_count(), 2);
    }

    #[test]
    fn test_unwatched_element_ignored() {
        let fixture = Fixture::new();
        let mut engine = engine(&fixture, 0.5, &[img(1)]);

        engine.on_signal(&fixture.ctx(), &report(99, 0.9, true));
        assert_eq!(fixture.sink.count(), 0);
    }

    #[test]
    fn test_unobserve_drops_record() {
        let fixture = Fixture::new();
        let mut engine = engine(&fixture, 0.5, &[img(1)]);

        engine.on_signal(&fixture.ctx(), &report(1, 0.8, true));
        engine.unobserve(ElementId(1));
        assert_eq!(engine.watched_count(), 0);

        // Reports after unobserve are ignored, including the exit
        engine.on_signal(&fixture.ctx(), &report(1, 0.0, false));
        assert_eq!(fixture.sink.count_of("exposure_end"), 0);
    }
}
