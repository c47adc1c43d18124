//! Retention windows for per-document presence state.

use std::time::Duration;

/// Presence configuration.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// How long a fully reconciled remote announcement is kept before it is
    /// garbage collected. Default: 60s.
    pub received_timeout: Duration,
    /// How far back the cache of applied operations reaches. Remote presence
    /// captured at an older version cannot be transformed and is dropped.
    /// Default: 60s.
    pub cached_ops_timeout: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            received_timeout: Duration::from_secs(60),
            cached_ops_timeout: Duration::from_secs(60),
        }
    }
}

impl PresenceConfig {
    /// Config for testing (windows short enough to expire inside a test).
    pub fn for_testing() -> Self {
        Self {
            received_timeout: Duration::from_millis(50),
            cached_ops_timeout: Duration::from_millis(50),
        }
    }

    pub fn with_received_timeout(mut self, timeout: Duration) -> Self {
        self.received_timeout = timeout;
        self
    }

    pub fn with_cached_ops_timeout(mut self, timeout: Duration) -> Self {
        self.cached_ops_timeout = timeout;
        self
    }
}
