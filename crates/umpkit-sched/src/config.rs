//! Scheduler and synchronizer configuration.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration for [`crate::Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Items due within this window of now are dispatched in the same batch.
    pub jitter_tolerance_ms: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            jitter_tolerance_ms: 0.5,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.jitter_tolerance_ms.is_finite() || self.jitter_tolerance_ms < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "jitter_tolerance_ms {} must be finite and >= 0",
                self.jitter_tolerance_ms
            )));
        }
        Ok(())
    }
}

/// Configuration for [`crate::JitterReductionSynchronizer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    /// Host milliseconds per JR clock tick.
    pub unit_ms: f64,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self { unit_ms: 1.0 }
    }
}

impl JitterConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.unit_ms.is_finite() || self.unit_ms <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "unit_ms {} must be finite and > 0",
                self.unit_ms
            )));
        }
        Ok(())
    }
}
