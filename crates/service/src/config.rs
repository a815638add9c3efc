//! Service and loopback configuration.

use bondkeep_machine::events::DEFAULT_CHANNEL_CAPACITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Capacity of the lifecycle broadcast channel.
    #[serde(default = "default_callback_channel_capacity")]
    pub callback_channel_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            callback_channel_capacity: default_callback_channel_capacity(),
        }
    }
}

fn default_callback_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

/// Timings of the callbacks a [`LoopbackGateway`](crate::LoopbackGateway) plays back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopbackConfig {
    /// Delay before the link-level bonded callback.
    pub bonded_delay_ms: u64,
    /// Delay after bonding before service discovery completes. `None` never completes it.
    pub discovery_delay_ms: Option<u64>,
    /// Delay before the unbonded callback that follows a remove or cancel.
    pub unbond_delay_ms: u64,
    /// Passkey shown for numeric comparison while bonding, if any.
    pub passkey: Option<u32>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            bonded_delay_ms: 200,
            discovery_delay_ms: Some(400),
            unbond_delay_ms: 100,
            passkey: None,
        }
    }
}

impl LoopbackConfig {
    pub fn bonded_delay(&self) -> Duration {
        Duration::from_millis(self.bonded_delay_ms)
    }

    pub fn discovery_delay(&self) -> Option<Duration> {
        self.discovery_delay_ms.map(Duration::from_millis)
    }

    pub fn unbond_delay(&self) -> Duration {
        Duration::from_millis(self.unbond_delay_ms)
    }
}
