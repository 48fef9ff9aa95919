//! # Bridge Settings
//!
//! The small static settings object the bridge consumes.
//!
//! ## Format
//!
//! ```toml
//! run_on_owner_thread = false
//! flush_after_every_outgoing_op = true
//! ops_poll_rate_hz = 1000.0
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// Shortest time the network worker will wait between cycles.
pub const MIN_WAIT_MILLIS: u64 = 1;

/// Default rate at which the network worker polls the connection.
pub const DEFAULT_OPS_POLL_RATE_HZ: f32 = 1000.0;

/// Bridge configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Run polling and sending on the owner thread instead of a worker.
    pub run_on_owner_thread: bool,
    /// Flush after every submission. In background mode this also lets
    /// the worker be woken early.
    pub flush_after_every_outgoing_op: bool,
    /// How often the worker polls the connection, in Hz.
    pub ops_poll_rate_hz: f32,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            run_on_owner_thread: false,
            flush_after_every_outgoing_op: true,
            ops_poll_rate_hz: DEFAULT_OPS_POLL_RATE_HZ,
        }
    }
}

/// Wait interval derived from the poll rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitInterval {
    /// How long the worker waits between cycles.
    pub duration: Duration,
    /// True if the configured rate was raised to [`MIN_WAIT_MILLIS`].
    pub clamped: bool,
}

impl BridgeSettings {
    /// Settings for running on the owner thread.
    #[must_use]
    pub fn inline() -> Self {
        Self {
            run_on_owner_thread: true,
            ..Default::default()
        }
    }

    /// Settings for running a background network worker.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Sets the owner-thread flag.
    #[must_use]
    pub fn with_run_on_owner_thread(mut self, enabled: bool) -> Self {
        self.run_on_owner_thread = enabled;
        self
    }

    /// Sets the flush-after-every-op flag.
    #[must_use]
    pub fn with_flush_after_every_outgoing_op(mut self, enabled: bool) -> Self {
        self.flush_after_every_outgoing_op = enabled;
        self
    }

    /// Sets the poll rate.
    #[must_use]
    pub fn with_ops_poll_rate_hz(mut self, rate: f32) -> Self {
        self.ops_poll_rate_hz = rate;
        self
    }

    /// Parses settings from TOML text.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidConfig`] if the text is not valid TOML or a
    /// field has the wrong type.
    pub fn from_toml_str(text: &str) -> BridgeResult<Self> {
        toml::from_str(text).map_err(|e| BridgeError::InvalidConfig(e.to_string()))
    }

    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// [`BridgeError::InvalidConfig`] if the file cannot be read or does
    /// not parse.
    pub fn load(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Computes the worker wait interval.
    ///
    /// The interval is truncated to whole milliseconds. Anything that
    /// would come out below [`MIN_WAIT_MILLIS`], including zero, negative
    /// or non-finite rates, is raised to it and reported as clamped.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn wait_interval(&self) -> WaitInterval {
        let wait_millis = 1000.0 / f64::from(self.ops_poll_rate_hz);

        if !wait_millis.is_finite() || wait_millis.trunc() < MIN_WAIT_MILLIS as f64 {
            return WaitInterval {
                duration: Duration::from_millis(MIN_WAIT_MILLIS),
                clamped: true,
            };
        }

        WaitInterval {
            duration: Duration::from_millis(wait_millis.trunc() as u64),
            clamped: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = BridgeSettings::default();
        assert!(!settings.run_on_owner_thread);
        assert!(settings.flush_after_every_outgoing_op);
        assert_eq!(settings.wait_interval().duration, Duration::from_millis(1));
        assert!(!settings.wait_interval().clamped);
    }

    #[test]
    fn test_wait_interval_truncates() {
        let settings = BridgeSettings::default().with_ops_poll_rate_hz(60.0);
        let interval = settings.wait_interval();

        assert_eq!(interval.duration, Duration::from_millis(16));
        assert!(!interval.clamped);
    }

    #[test]
    fn test_wait_interval_clamps_sub_millisecond() {
        let settings = BridgeSettings::default().with_ops_poll_rate_hz(2000.0);
        let interval = settings.wait_interval();

        assert_eq!(interval.duration, Duration::from_millis(1));
        assert!(interval.clamped);
    }

    #[test]
    fn test_wait_interval_clamps_nonsense_rates() {
        for rate in [0.0, -10.0, f32::NAN, f32::INFINITY] {
            let interval = BridgeSettings::default().with_ops_poll_rate_hz(rate).wait_interval();
            assert_eq!(interval.duration, Duration::from_millis(1), "rate {rate}");
            assert!(interval.clamped, "rate {rate}");
        }
    }

    #[test]
    fn test_from_toml() {
        let settings = BridgeSettings::from_toml_str(
            r"
            run_on_owner_thread = true
            ops_poll_rate_hz = 30.0
            ",
        )
        .unwrap();

        assert!(settings.run_on_owner_thread);
        assert!(settings.flush_after_every_outgoing_op);
        assert_eq!(settings.wait_interval().duration, Duration::from_millis(33));
    }

    #[test]
    fn test_from_toml_rejects_bad_types() {
        let result = BridgeSettings::from_toml_str("run_on_owner_thread = 3");
        assert!(matches!(result, Err(BridgeError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = BridgeSettings::load("/definitely/not/here/tether.toml");
        assert!(matches!(result, Err(BridgeError::InvalidConfig(_))));
    }
}
