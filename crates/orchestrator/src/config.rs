use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Executor pool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BatchConfig {
    /// Executors used when a batch holds more than one task
    pub parallelism: usize,
    /// Give up on a task after this many seconds; `None` waits forever
    pub task_timeout_secs: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            task_timeout_secs: None,
        }
    }
}

impl BatchConfig {
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }
}

/// Usage limits enforced by [`crate::quota::UsageQuota`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct QuotaConfig {
    pub daily_limit: u32,
    pub monthly_limit: u32,
    /// Times the same image may be processed again after its first treatment
    pub max_retreatments: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: 15,
            monthly_limit: 200,
            max_retreatments: 2,
        }
    }
}
