use std::fmt;

use serde::Serialize;

/// Rolling means strictly above this are at least a warning.
pub const WARNING_THRESHOLD_MS: f64 = 200.0;
/// Rolling means strictly above this are critical.
pub const CRITICAL_THRESHOLD_MS: f64 = 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Classifies a function by its rolling mean duration in milliseconds.
    pub fn classify(mean_ms: f64) -> Self {
        if mean_ms > CRITICAL_THRESHOLD_MS {
            HealthStatus::Critical
        } else if mean_ms > WARNING_THRESHOLD_MS {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        })
    }
}

/// How many functions sit in each tier. Functions without rolling data are
/// counted as `no_data`, never as healthy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HealthCounts {
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
    pub no_data: usize,
}

impl HealthCounts {
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Option<HealthStatus>>,
    {
        let mut counts = HealthCounts::default();
        for status in statuses {
            match status {
                Some(HealthStatus::Healthy) => counts.healthy += 1,
                Some(HealthStatus::Warning) => counts.warning += 1,
                Some(HealthStatus::Critical) => counts.critical += 1,
                None => counts.no_data += 1,
            }
        }
        counts
    }
}
