use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Per-frame work budget used when none is configured. Leaves most of a
/// 16.7 ms frame to rendering.
pub const DEFAULT_MAX_WORK_TIME_MS: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Milliseconds of task work allowed per frame. Zero still runs the
    /// first task of every frame.
    pub max_work_time_ms: f64,
}

impl SchedulerConfig {
    pub fn with_max_work_time_ms(max_work_time_ms: f64) -> Self {
        Self { max_work_time_ms }
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.max_work_time_ms.is_finite() && self.max_work_time_ms >= 0.0 {
            Ok(())
        } else {
            Err(SchedulerError::InvalidConfig(self.max_work_time_ms))
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_work_time_ms: DEFAULT_MAX_WORK_TIME_MS,
        }
    }
}
