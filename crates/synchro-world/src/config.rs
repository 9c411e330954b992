//! World configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use synchro_tick::{TickConfig, TickPolicy};

/// Configuration for the world actor.
///
/// Every field has a default, and missing fields in a config file fall
/// back to it, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Period of the UPDATE broadcast in milliseconds. 0 is treated as 1.
    pub broadcast_interval_ms: u64,

    /// Capacity of the actor's command channel. Connection handlers wait
    /// when it is full.
    pub command_buffer: usize,

    /// Fraction of the broadcast interval a tick may use before a warning
    /// is logged.
    pub budget_warn_threshold: f64,

    /// Fraction of the interval past which a tick is logged as critical.
    pub budget_critical_threshold: f64,

    /// What to do when a broadcast fires late: `"skip"` or `"drop"`.
    pub tick_policy: TickPolicy,

    /// Random delay (µs) added before the first broadcast. Spreads the
    /// first tick when many worlds start together.
    pub initial_jitter_us: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            broadcast_interval_ms: 100,
            command_buffer: 1024,
            budget_warn_threshold: 0.8,
            budget_critical_threshold: 1.0,
            tick_policy: TickPolicy::Skip,
            initial_jitter_us: 0,
        }
    }
}

impl WorldConfig {
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    /// The scheduler settings for the broadcast tick.
    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            policy: self.tick_policy,
            budget_warn_threshold: self.budget_warn_threshold,
            budget_critical_threshold: self.budget_critical_threshold,
            initial_jitter_us: self.initial_jitter_us,
            ..TickConfig::every(self.broadcast_interval())
        }
    }
}
