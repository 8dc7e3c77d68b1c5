//! Threshold-crossing properties, driven end-to-end through the tracker

use std::sync::Arc;

use vigil_core::{
    ActivityKind, ElementCandidate, ElementId, ElementInfo, Environment, ManualClock, MemorySink,
    PageContext, ScrollSample, Signal, Tracker, TrackerConfig, VisibilitySample,
};

struct Harness {
    sink: Arc<MemorySink>,
    clock: Arc<ManualClock>,
    tracker: Tracker,
}

fn harness(config: TrackerConfig) -> Harness {
    let sink = Arc::new(MemorySink::new());
    let clock = Arc::new(ManualClock::at_epoch());
    let page = PageContext::new("https://example.com/article", "Article", "");
    let env = Environment::new(sink.clone(), page).with_clock(clock.clone());
    Harness {
        sink,
        clock,
        tracker: Tracker::new(config, env),
    }
}

fn scroll_to(ratio: f64) -> Signal {
    Signal::Scroll(ScrollSample {
        scroll_top: ratio * 1000.0,
        scroll_height: 1500.0,
        client_height: 500.0,
    })
}

fn img_candidate(id: u64) -> ElementCandidate {
    ElementCandidate {
        element: ElementId(id),
        info: ElementInfo {
            tag: "img".to_string(),
            id: format!("img-{}", id),
            class_name: String::new(),
            text: String::new(),
        },
        opted_in: false,
    }
}

fn visibility(id: u64, ratio: f64, intersecting: bool) -> Signal {
    Signal::Visibility(VisibilitySample {
        element: ElementId(id),
        info: ElementInfo {
            tag: "img".to_string(),
            id: format!("img-{}", id),
            class_name: String::new(),
            text: String::new(),
        },
        ratio,
        intersecting,
    })
}

#[test]
fn test_scroll_crossing_emits_exactly_once() {
    let h = harness(TrackerConfig {
        scroll_threshold: 0.5,
        scroll_throttle_ms: 0,
        ..Default::default()
    });
    h.tracker.install().unwrap();

    // Scroll to 60%: one event with the measured ratio
    h.tracker.dispatch(&scroll_to(0.6));
    let scrolls = h.sink.captured_of("scroll");
    assert_eq!(scrolls.len(), 1);
    let pct = scrolls[0].payload["scroll_percentage"].as_f64().unwrap();
    assert!((pct - 0.6).abs() < 1e-9);

    // Back to 40%: silent reset
    h.tracker.dispatch(&scroll_to(0.4));
    assert_eq!(h.sink.count_of("scroll"), 1);

    // Up to 70%: second crossing
    h.tracker.dispatch(&scroll_to(0.7));
    assert_eq!(h.sink.count_of("scroll"), 2);
}

#[test]
fn test_scroll_coalescing_emits_once_for_bursts() {
    let h = harness(TrackerConfig {
        scroll_threshold: 0.5,
        scroll_throttle_ms: 150,
        ..Default::default()
    });
    h.tracker.install().unwrap();

    // A rapid burst of twenty samples crossing the threshold
    for i in 0..20 {
        h.tracker.dispatch(&scroll_to(0.3 + (i as f64) * 0.02));
        h.clock.advance_ms(5);
    }
    assert_eq!(h.sink.count_of("scroll"), 0);

    h.clock.advance_ms(150);
    h.tracker.poll();

    // However many samples arrived, one upward crossing means one event
    assert_eq!(h.sink.count_of("scroll"), 1);
}

#[test]
fn test_exposure_one_event_per_continuous_interval() {
    let h = harness(TrackerConfig {
        exposure_threshold: 0.5,
        ..Default::default()
    });
    h.tracker.install().unwrap();
    h.tracker.observe_elements(&[img_candidate(1)]);

    // Ratios 0.6, 0.7, 0.6, all at or above threshold: one event
    h.tracker.dispatch(&visibility(1, 0.6, true));
    h.tracker.dispatch(&visibility(1, 0.7, true));
    h.tracker.dispatch(&visibility(1, 0.6, true));
    assert_eq!(h.sink.count_of("exposure"), 1);

    // Leaving closes the period with its duration
    h.clock.advance_ms(4000);
    h.tracker.dispatch(&visibility(1, 0.1, false));
    let ends = h.sink.captured_of("exposure_end");
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].payload["exposure_duration_ms"], 4000);

    // Re-entering starts a fresh interval and emits again
    h.tracker.dispatch(&visibility(1, 0.8, true));
    assert_eq!(h.sink.count_of("exposure"), 2);
}

#[test]
fn test_exposure_tracks_elements_independently() {
    let h = harness(TrackerConfig::default());
    h.tracker.install().unwrap();
    h.tracker.observe_elements(&[img_candidate(1), img_candidate(2)]);

    h.tracker.dispatch(&visibility(1, 0.9, true));
    h.tracker.dispatch(&visibility(2, 0.9, true));
    h.tracker.dispatch(&visibility(1, 0.9, true));
    assert_eq!(h.sink.count_of("exposure"), 2);

    // Element 1 leaves; element 2's period stays open
    h.tracker.dispatch(&visibility(1, 0.0, false));
    assert_eq!(h.sink.count_of("exposure_end"), 1);
    let end = &h.sink.captured_of("exposure_end")[0].payload;
    assert_eq!(end["id"], "img-1");
}

#[test]
fn test_unobserve_releases_element() {
    let h = harness(TrackerConfig::default());
    h.tracker.install().unwrap();
    h.tracker.observe_elements(&[img_candidate(1)]);

    h.tracker.dispatch(&visibility(1, 0.9, true));
    assert_eq!(h.sink.count_of("exposure"), 1);

    h.tracker.unobserve(ElementId(1));
    h.tracker.dispatch(&visibility(1, 0.9, true));
    assert_eq!(h.sink.count_of("exposure"), 1);
}

#[test]
fn test_click_debounce_through_tracker() {
    let h = harness(TrackerConfig {
        click_debounce_ms: 300,
        ..Default::default()
    });
    h.tracker.install().unwrap();

    let click = Signal::Click {
        target: ElementInfo {
            tag: "button".to_string(),
            id: "cta".to_string(),
            class_name: String::new(),
            text: String::new(),
        },
        x: 5.0,
        y: 5.0,
    };

    h.tracker.dispatch(&click);
    h.clock.advance_ms(50);
    h.tracker.dispatch(&click);
    assert_eq!(h.sink.count_of("click"), 1);

    h.clock.advance_ms(300);
    h.tracker.dispatch(&click);
    assert_eq!(h.sink.count_of("click"), 2);
}

#[test]
fn test_inactivity_latches_per_idle_period() {
    const MINUTE: u64 = 60_000;
    let h = harness(TrackerConfig {
        inactivity_threshold_ms: 5 * MINUTE,
        activity_poll_interval_ms: MINUTE,
        ..Default::default()
    });
    h.tracker.install().unwrap();

    // Ten silent minutes: exactly one inactivity event
    for _ in 0..10 {
        h.clock.advance_ms(MINUTE);
        h.tracker.poll();
    }
    assert_eq!(h.sink.count_of("inactivity"), 1);

    // Activity re-arms; a second idle period reports once more
    h.tracker.dispatch(&Signal::Activity {
        kind: ActivityKind::PointerDown,
    });
    for _ in 0..10 {
        h.clock.advance_ms(MINUTE);
        h.tracker.poll();
    }
    assert_eq!(h.sink.count_of("inactivity"), 2);
}

#[test]
fn test_scroll_signals_count_as_activity() {
    const MINUTE: u64 = 60_000;
    let h = harness(TrackerConfig {
        inactivity_threshold_ms: 5 * MINUTE,
        activity_poll_interval_ms: MINUTE,
        scroll_throttle_ms: 0,
        ..Default::default()
    });
    h.tracker.install().unwrap();

    // Scrolling every minute keeps the activity clock fresh
    for _ in 0..10 {
        h.clock.advance_ms(MINUTE);
        h.tracker.dispatch(&scroll_to(0.1));
        h.tracker.poll();
    }
    assert_eq!(h.sink.count_of("inactivity"), 0);
}
