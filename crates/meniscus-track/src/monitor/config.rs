use serde::{Deserialize, Serialize};

use super::MonitorError;

/// Settings of the replicate/aggregate/act loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Frames measured per cycle. Must be odd so the median is a sample.
    pub number_of_replicate_measurements: usize,
    /// Modified z-score cut-off for replicate outliers.
    pub z_threshold: f64,
    /// Consecutive "no level" failures before a cycle gives up.
    pub max_tries: usize,
    /// Measured frames kept for inspection.
    pub history_capacity: usize,
    /// Which stored reference distances are measured against.
    pub reference_index: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            number_of_replicate_measurements: 3,
            z_threshold: 1.0,
            max_tries: 5,
            history_capacity: 10,
            reference_index: 0,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        let n = self.number_of_replicate_measurements;
        if n == 0 || n % 2 == 0 {
            return Err(MonitorError::InvalidConfig(format!(
                "number_of_replicate_measurements must be odd and at least 1 (got {n})"
            )));
        }
        if self.z_threshold.is_nan() || self.z_threshold <= 0.0 {
            return Err(MonitorError::InvalidConfig(format!(
                "z_threshold must be positive (got {})",
                self.z_threshold
            )));
        }
        if self.history_capacity == 0 {
            return Err(MonitorError::InvalidConfig(
                "history_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
