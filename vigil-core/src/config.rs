//! Tracker configuration
//!
//! Every option has a default; a config deserialized from a partial JSON
//! object fills the gaps and never fails validation. Explicitly supplied
//! out-of-range values are rejected by [`TrackerConfig::validate`].

use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};

/// Tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Capture pointer clicks
    #[serde(default = "default_true")]
    pub enable_click_tracking: bool,

    /// Capture scroll threshold crossings
    #[serde(default = "default_true")]
    pub enable_scroll_tracking: bool,

    /// Capture element exposure periods
    #[serde(default = "default_true")]
    pub enable_exposure_tracking: bool,

    /// Intercept network-call primitives
    #[serde(default = "default_true")]
    pub enable_network_tracking: bool,

    /// Track activity, idle time, and page stay
    #[serde(default = "default_true")]
    pub enable_stay_time_tracking: bool,

    /// Scroll depth ratio that latches the scroll event, in (0, 1]
    #[serde(default = "default_scroll_threshold")]
    pub scroll_threshold: f64,

    /// Visibility ratio that opens an exposure period, in (0, 1]
    #[serde(default = "default_exposure_threshold")]
    pub exposure_threshold: f64,

    /// Quiet period between emitted clicks, in milliseconds (0 disables)
    #[serde(default = "default_click_debounce_ms")]
    pub click_debounce_ms: u64,

    /// Trailing-edge coalescing window for scroll samples, in milliseconds
    #[serde(default = "default_scroll_throttle_ms")]
    pub scroll_throttle_ms: u64,

    /// Idle duration that triggers an inactivity event, in milliseconds
    #[serde(default = "default_inactivity_threshold_ms")]
    pub inactivity_threshold_ms: u64,

    /// Interval between idle evaluations, in milliseconds
    #[serde(default = "default_activity_poll_interval_ms")]
    pub activity_poll_interval_ms: u64,

    /// Upper bound on public-address discovery, in milliseconds
    #[serde(default = "default_address_discovery_timeout_ms")]
    pub address_discovery_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}
fn default_scroll_threshold() -> f64 {
    0.5
}
fn default_exposure_threshold() -> f64 {
    0.5
}
fn default_click_debounce_ms() -> u64 {
    300
}
fn default_scroll_throttle_ms() -> u64 {
    150
}
fn default_inactivity_threshold_ms() -> u64 {
    5 * 60 * 1000
}
fn default_activity_poll_interval_ms() -> u64 {
    60 * 1000
}
fn default_address_discovery_timeout_ms() -> u64 {
    500
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enable_click_tracking: true,
            enable_scroll_tracking: true,
            enable_exposure_tracking: true,
            enable_network_tracking: true,
            enable_stay_time_tracking: true,
            scroll_threshold: default_scroll_threshold(),
            exposure_threshold: default_exposure_threshold(),
            click_debounce_ms: default_click_debounce_ms(),
            scroll_throttle_ms: default_scroll_throttle_ms(),
            inactivity_threshold_ms: default_inactivity_threshold_ms(),
            activity_poll_interval_ms: default_activity_poll_interval_ms(),
            address_discovery_timeout_ms: default_address_discovery_timeout_ms(),
        }
    }
}

impl TrackerConfig {
    /// Validate explicitly supplied values
    pub fn validate(&self) -> Result<()> {
        validate_ratio("scroll_threshold", self.scroll_threshold)?;
        validate_ratio("exposure_threshold", self.exposure_threshold)?;

        if self.inactivity_threshold_ms == 0 {
            return Err(VigilError::InvalidConfig {
                field: "inactivity_threshold_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.activity_poll_interval_ms == 0 {
            return Err(VigilError::InvalidConfig {
                field: "activity_poll_interval_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

fn validate_ratio(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        return Err(VigilError::InvalidConfig {
            field: field.to_string(),
            reason: format!("must be in (0, 1], got {}", value),
        });
    }
    Ok(())
}
