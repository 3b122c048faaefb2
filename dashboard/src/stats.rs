//! Descriptive statistics over duration samples.
//!
//! Percentiles use the nearest-rank index `floor(p * n)` on the ascending
//! sort, with no interpolation. Values stay full precision here;
//! [`FunctionStats::formatted`] is the only place they are rounded.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::FunctionId;
use crate::charts::{Granularity, TimeBucket, trailing};

pub const P50: f64 = 0.50;
pub const P95: f64 = 0.95;
pub const P99: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FunctionStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// [`FunctionStats`] rendered to one decimal place for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedStats {
    pub mean: String,
    pub min: String,
    pub max: String,
    pub p50: String,
    pub p95: String,
    pub p99: String,
}

impl FunctionStats {
    pub fn formatted(&self) -> FormattedStats {
        FormattedStats {
            mean: format!("{:.1}", self.mean),
            min: format!("{:.1}", self.min),
            max: format!("{:.1}", self.max),
            p50: format!("{:.1}", self.p50),
            p95: format!("{:.1}", self.p95),
            p99: format!("{:.1}", self.p99),
        }
    }
}

/// `None` when there is nothing to summarise.
pub fn stats_for(values: &[f64]) -> Option<FunctionStats> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(FunctionStats {
        mean,
        min,
        max,
        p50: nearest_rank(&sorted, P50),
        p95: nearest_rank(&sorted, P95),
        p99: nearest_rank(&sorted, P99),
    })
}

/// `sorted` must be non-empty and ascending.
pub fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    let idx = (p * sorted.len() as f64).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Statistics for every tracked function in one bucket. Functions with no
/// calls in the bucket have no entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub key: String,
    pub timestamp: i64,
    pub functions: BTreeMap<FunctionId, FunctionStats>,
}

impl SeriesPoint {
    pub fn get(&self, function: &str) -> Option<&FunctionStats> {
        self.functions.get(function)
    }
}

/// Per-bucket statistics restricted to `functions`.
pub fn bucket_series(buckets: &[TimeBucket], functions: &[FunctionId]) -> Vec<SeriesPoint> {
    buckets
        .iter()
        .map(|bucket| SeriesPoint {
            key: bucket.key.clone(),
            timestamp: bucket.timestamp,
            functions: functions
                .iter()
                .filter_map(|f| {
                    let durations = bucket.per_function.get(f)?;
                    Some((f.clone(), stats_for(durations)?))
                })
                .collect(),
        })
        .collect()
}

/// Summary of `function` over the rolling window: statistics of its
/// per-bucket means across the most recent buckets of `series`.
pub fn rolling_stats(
    series: &[SeriesPoint],
    function: &str,
    granularity: Granularity,
) -> Option<FunctionStats> {
    let means: Vec<f64> = trailing(series, granularity.rolling_window_len())
        .iter()
        .filter_map(|point| point.get(function).map(|s| s.mean))
        .collect();
    stats_for(&means)
}
