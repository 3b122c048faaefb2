use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use crate::catalog::FunctionId;
use crate::records::NormalizedRecord;

/// Days of history used for rolling summaries, whatever range is displayed.
pub const ROLLING_WINDOW_DAYS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Minute,
    #[default]
    Hour,
    Day,
}

impl Granularity {
    pub fn units_per_day(self) -> usize {
        match self {
            Granularity::Minute => 24 * 60,
            Granularity::Hour => 24,
            Granularity::Day => 1,
        }
    }

    /// Number of buckets that make up the rolling summary window.
    pub fn rolling_window_len(self) -> usize {
        ROLLING_WINDOW_DAYS * self.units_per_day()
    }

    fn key_format(self) -> &'static str {
        match self {
            Granularity::Minute => "%Y-%m-%d %H:%M",
            Granularity::Hour => "%Y-%m-%d %H:00",
            Granularity::Day => "%Y-%m-%d",
        }
    }

    /// Start of the bucket containing `ts`. Falls back to `ts` itself when
    /// the truncated wall time does not exist in `tz` (DST gaps).
    fn bucket_start<Tz: TimeZone>(self, ts: &DateTime<Tz>) -> DateTime<Tz> {
        let minute = ts
            .with_nanosecond(0)
            .and_then(|t| t.with_second(0));
        let start = match self {
            Granularity::Minute => minute,
            Granularity::Hour => minute.and_then(|t| t.with_minute(0)),
            Granularity::Day => minute
                .and_then(|t| t.with_minute(0))
                .and_then(|t| t.with_hour(0)),
        };
        start.unwrap_or_else(|| ts.clone())
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
        })
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minute" => Ok(Granularity::Minute),
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            other => Err(format!("unknown granularity `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "60d")]
    SixtyDays,
}

impl TimeRange {
    pub fn days(self) -> usize {
        match self {
            TimeRange::SevenDays => 7,
            TimeRange::ThirtyDays => 30,
            TimeRange::SixtyDays => 60,
        }
    }

    /// Trailing buckets shown for this range at `granularity`.
    pub fn bucket_count(self, granularity: Granularity) -> usize {
        self.days() * granularity.units_per_day()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d", self.days())
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(TimeRange::SevenDays),
            "30d" => Ok(TimeRange::ThirtyDays),
            "60d" => Ok(TimeRange::SixtyDays),
            other => Err(format!("unknown time range `{other}`")),
        }
    }
}

/// Durations (ms) observed in one time slot, grouped by function in call
/// order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeBucket {
    pub key: String,
    /// Bucket start, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub per_function: BTreeMap<FunctionId, Vec<f64>>,
}

impl TimeBucket {
    pub fn observations(&self) -> usize {
        self.per_function.values().map(Vec::len).sum()
    }
}

/// Buckets records by the observer's local wall-clock time.
pub fn bucket_records(records: &[NormalizedRecord], granularity: Granularity) -> Vec<TimeBucket> {
    bucket_records_in(records, granularity, &Local)
}

/// Groups records into buckets keyed in `tz`, sorted ascending by key.
pub fn bucket_records_in<Tz: TimeZone>(
    records: &[NormalizedRecord],
    granularity: Granularity,
    tz: &Tz,
) -> Vec<TimeBucket>
where
    Tz::Offset: fmt::Display,
{
    let mut buckets: BTreeMap<String, TimeBucket> = BTreeMap::new();

    for record in records {
        let local = record.timestamp.with_timezone(tz);
        let key = local.format(granularity.key_format()).to_string();
        let bucket = buckets.entry(key).or_insert_with_key(|key| TimeBucket {
            key: key.clone(),
            timestamp: granularity.bucket_start(&local).timestamp_millis(),
            per_function: BTreeMap::new(),
        });
        bucket
            .per_function
            .entry(record.function_name.clone())
            .or_default()
            .push(record.duration_ms);
    }

    buckets.into_values().collect()
}

/// The last `count` items, or all of them when there are fewer.
pub fn trailing<T>(items: &[T], count: usize) -> &[T] {
    &items[items.len().saturating_sub(count)..]
}
