//! Runtime configuration.

use std::time::Duration;

use roomsync_client::ClientConfig;

/// Interval between bootstrap timeout checks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Room event broadcast capacity. Slow subscribers lag past this.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Queued intent requests before callers wait.
pub const DEFAULT_INTENT_CAPACITY: usize = 32;

/// Room runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Channel to join. Defaults to the room id.
    pub channel: Option<String>,
    /// Interval between ticks.
    pub tick_interval: Duration,
    /// Room event channel capacity.
    pub event_capacity: usize,
    /// Intent request channel capacity.
    pub intent_capacity: usize,
    /// Client state machine configuration.
    pub client: ClientConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            channel: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            intent_capacity: DEFAULT_INTENT_CAPACITY,
            client: ClientConfig::default(),
        }
    }
}
