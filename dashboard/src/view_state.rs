//! Owns the user-controlled inputs (raw rows, filters, enabled set,
//! selection) and the [`DashboardView`] derived from them.
//!
//! Every mutation re-runs the whole derivation, so a view handed out by
//! [`ViewState::view`] always matches the current inputs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::{self, FunctionId};
use crate::charts::{self, Granularity, TimeRange, trailing};
use crate::fetch::FetchError;
use crate::health::{HealthCounts, HealthStatus};
use crate::records::{self, NormalizedRecord};
use crate::stats::{self, FormattedStats, FunctionStats, SeriesPoint};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewFilters {
    pub granularity: Granularity,
    pub time_range: TimeRange,
    /// Minimum calls for a function to be listed; `<= 0` disables the filter.
    pub min_calls: i64,
    pub truncate: bool,
}

impl Default for ViewFilters {
    fn default() -> Self {
        ViewFilters {
            granularity: Granularity::Hour,
            time_range: TimeRange::SevenDays,
            min_calls: 1,
            truncate: true,
        }
    }
}

/// Per-function card data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionSummary {
    pub name: FunctionId,
    pub calls: usize,
    pub enabled: bool,
    pub rolling: Option<FunctionStats>,
    pub display: Option<FormattedStats>,
    pub health: Option<HealthStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub records: usize,
    /// Distinct functions before threshold and enabled filtering.
    pub functions: usize,
    pub visible: usize,
    pub health: HealthCounts,
}

/// One function's value at one bucket, `None` when it was not called.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionPoint {
    pub key: String,
    pub timestamp: i64,
    pub stats: Option<FunctionStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardView {
    pub filters: ViewFilters,
    /// Functions over the threshold and enabled, i.e. the ones charted.
    pub functions: Vec<FunctionId>,
    /// Every function over the threshold, enabled or not.
    pub summaries: Vec<FunctionSummary>,
    /// Buckets inside the selected time range, restricted to `functions`.
    pub series: Vec<SeriesPoint>,
    /// The same buckets for every function in `summaries`, so a disabled
    /// function still has a detail series.
    #[serde(skip)]
    detail: Vec<SeriesPoint>,
    pub selected: Option<FunctionId>,
    pub totals: Totals,
    pub error: Option<String>,
}

impl DashboardView {
    pub fn summary(&self, function: &str) -> Option<&FunctionSummary> {
        self.summaries.iter().find(|s| s.name == function)
    }

    pub fn health(&self, function: &str) -> Option<HealthStatus> {
        self.summary(function).and_then(|s| s.health)
    }

    /// One function's series over the selected time range, whether or not
    /// it is currently charted.
    pub fn series_for(&self, function: &str) -> Vec<FunctionPoint> {
        self.detail
            .iter()
            .map(|point| FunctionPoint {
                key: point.key.clone(),
                timestamp: point.timestamp,
                stats: point.get(function).copied(),
            })
            .collect()
    }
}

/// Everything [`derive_view`] reads.
pub struct ViewInputs<'a> {
    pub records: &'a [NormalizedRecord],
    pub filters: &'a ViewFilters,
    pub enabled: &'a BTreeSet<FunctionId>,
    pub selected: Option<&'a str>,
}

/// The full derivation: catalog, buckets, statistics and health.
pub fn derive_view(inputs: ViewInputs<'_>) -> DashboardView {
    let ViewInputs {
        records,
        filters,
        enabled,
        selected,
    } = inputs;

    let all = catalog::all_functions(records);
    let counts = catalog::call_counts(records);
    let qualified = catalog::functions_above_threshold(records, filters.min_calls);
    let visible = catalog::enabled_functions(&qualified, enabled);

    let buckets = charts::bucket_records(records, filters.granularity);
    let full_series = stats::bucket_series(&buckets, &qualified);

    let summaries: Vec<FunctionSummary> = qualified
        .iter()
        .map(|name| {
            let rolling = stats::rolling_stats(&full_series, name, filters.granularity);
            FunctionSummary {
                name: name.clone(),
                calls: counts.get(name).copied().unwrap_or(0),
                enabled: catalog::is_enabled(enabled, name),
                rolling,
                display: rolling.as_ref().map(FunctionStats::formatted),
                health: rolling.map(|r| HealthStatus::classify(r.mean)),
            }
        })
        .collect();

    let visible_set: BTreeSet<&str> = visible.iter().map(String::as_str).collect();
    let detail = trailing(
        &full_series,
        filters.time_range.bucket_count(filters.granularity),
    )
    .to_vec();
    let series: Vec<SeriesPoint> = detail
        .iter()
        .map(|point| SeriesPoint {
            key: point.key.clone(),
            timestamp: point.timestamp,
            functions: point
                .functions
                .iter()
                .filter(|(name, _)| visible_set.contains(name.as_str()))
                .map(|(name, s)| (name.clone(), *s))
                .collect(),
        })
        .collect();

    let health = HealthCounts::tally(
        summaries
            .iter()
            .filter(|s| visible_set.contains(s.name.as_str()))
            .map(|s| s.health),
    );

    let selected = match selected {
        Some(name) if qualified.iter().any(|q| q == name) => Some(name.to_owned()),
        _ => qualified.first().cloned(),
    };

    DashboardView {
        filters: *filters,
        totals: Totals {
            records: records.len(),
            functions: all.len(),
            visible: visible.len(),
            health,
        },
        functions: visible,
        summaries,
        series,
        detail,
        selected,
        error: None,
    }
}

/// Identifies one fetch and the URL it was issued for. Only the most
/// recently issued ticket may land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    url: String,
}

impl FetchTicket {
    pub fn url(&self) -> &str {
        &self.url
    }
}

pub struct ViewState {
    api_url: String,
    rows: Vec<Value>,
    filters: ViewFilters,
    enabled: BTreeSet<FunctionId>,
    catalog: Vec<FunctionId>,
    selected: Option<FunctionId>,
    error: Option<String>,
    latest_fetch: u64,
    view: DashboardView,
}

impl ViewState {
    pub fn new(api_url: impl Into<String>, filters: ViewFilters) -> Self {
        let mut state = ViewState {
            api_url: api_url.into(),
            rows: Vec::new(),
            filters,
            enabled: BTreeSet::new(),
            catalog: Vec::new(),
            selected: None,
            error: None,
            latest_fetch: 0,
            view: DashboardView::default(),
        };
        state.recompute();
        state
    }

    pub fn view(&self) -> &DashboardView {
        &self.view
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Points later fetches at `url`. Fetches still in flight for the old
    /// URL are superseded.
    pub fn set_api_url(&mut self, url: impl Into<String>) {
        self.api_url = url.into();
        self.latest_fetch += 1;
    }

    pub fn filters(&self) -> ViewFilters {
        self.filters
    }

    pub fn enabled(&self) -> &BTreeSet<FunctionId> {
        &self.enabled
    }

    /// Replaces the record set wholesale.
    pub fn replace_rows(&mut self, rows: Vec<Value>) {
        self.rows = rows;
        self.error = None;
        self.recompute();
    }

    /// Starts a fetch of the current API URL, superseding any fetch still
    /// in flight.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.latest_fetch += 1;
        FetchTicket {
            generation: self.latest_fetch,
            url: self.api_url.clone(),
        }
    }

    /// Applies a fetch result. Returns `false` and changes nothing when a
    /// newer fetch has started since `ticket` was issued.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Value>, FetchError>,
    ) -> bool {
        if ticket.generation != self.latest_fetch {
            debug!(
                ticket = ticket.generation,
                url = %ticket.url,
                latest = self.latest_fetch,
                "discarding superseded fetch"
            );
            return false;
        }
        match result {
            Ok(rows) => {
                info!(rows = rows.len(), "log fetch completed");
                self.replace_rows(rows);
            }
            Err(e) => {
                warn!(error = %e, "log fetch failed");
                self.rows.clear();
                self.error = Some(e.to_string());
                self.recompute();
            }
        }
        true
    }

    pub fn set_filters(&mut self, filters: ViewFilters) {
        self.filters = filters;
        self.recompute();
    }

    pub fn set_granularity(&mut self, granularity: Granularity) {
        self.filters.granularity = granularity;
        self.recompute();
    }

    pub fn set_time_range(&mut self, time_range: TimeRange) {
        self.filters.time_range = time_range;
        self.recompute();
    }

    pub fn set_min_calls(&mut self, min_calls: i64) {
        self.filters.min_calls = min_calls;
        self.recompute();
    }

    pub fn set_truncate(&mut self, truncate: bool) {
        self.filters.truncate = truncate;
        self.recompute();
    }

    /// Flips one function's visibility. Unknown names are ignored.
    pub fn toggle_function(&mut self, function: &str) -> bool {
        if !self.catalog.iter().any(|f| f == function) {
            return false;
        }
        self.enabled = catalog::toggle(&self.enabled, function);
        self.recompute();
        true
    }

    /// Selects a function for the detail charts. Only functions that pass the
    /// call threshold can be selected.
    pub fn select_function(&mut self, function: &str) -> bool {
        if self.view.summary(function).is_none() {
            return false;
        }
        self.selected = Some(function.to_owned());
        self.recompute();
        true
    }

    fn recompute(&mut self) {
        let records = records::normalize_rows(&self.rows, self.filters.truncate);

        let current = catalog::all_functions(&records);
        if current != self.catalog {
            self.enabled = catalog::reconcile(&self.catalog, &current, &self.enabled);
            self.catalog = current;
        }

        let mut view = derive_view(ViewInputs {
            records: &records,
            filters: &self.filters,
            enabled: &self.enabled,
            selected: self.selected.as_deref(),
        });
        view.error = self.error.clone();

        if view.selected != self.selected {
            debug!(from = ?self.selected, to = ?view.selected, "selection changed");
        }
        self.selected = view.selected.clone();
        self.view = view;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const MS: i64 = 1_000_000;
    const URL: &str = "http://localhost/logs";

    fn day_filters() -> ViewFilters {
        ViewFilters {
            granularity: Granularity::Day,
            time_range: TimeRange::SevenDays,
            min_calls: 0,
            truncate: false,
        }
    }

    fn state_with(rows: Value, filters: ViewFilters) -> ViewState {
        let mut state = ViewState::new(URL, filters);
        let Value::Array(rows) = rows else {
            panic!("rows must be an array");
        };
        state.replace_rows(rows);
        state
    }

    #[test]
    fn empty_state_has_empty_view() {
        let state = ViewState::new(URL, ViewFilters::default());
        let view = state.view();
        assert!(view.functions.is_empty());
        assert!(view.series.is_empty());
        assert_eq!(view.selected, None);
        assert_eq!(view.totals, Totals::default());
    }

    #[test]
    fn foo_scenario_is_healthy() {
        let state = state_with(
            json!([[1, "foo", 0, 1_000_000], [2, "foo", 1_000_000, 3_000_000]]),
            day_filters(),
        );
        let view = state.view();
        let foo = view.summary("foo").unwrap();
        assert_eq!(foo.calls, 2);
        assert_eq!(foo.rolling.unwrap().mean, 2.0);
        assert_eq!(foo.health, Some(HealthStatus::Healthy));
        assert_eq!(view.totals.health.healthy, 1);
        assert_eq!(view.selected.as_deref(), Some("foo"));
    }

    #[test]
    fn threshold_hides_rare_functions() {
        let mut rows = vec![];
        for i in 0..5 {
            rows.push(json!([i, "foo", i * MS, 10 * MS]));
        }
        for i in 5..8 {
            rows.push(json!([i, "bar", i * MS, 10 * MS]));
        }
        let mut state = state_with(Value::Array(rows), day_filters());
        assert_eq!(state.view().functions, vec!["bar", "foo"]);

        state.set_min_calls(5);
        let view = state.view();
        assert_eq!(view.functions, vec!["foo"]);
        assert!(view.summary("bar").is_none());
        assert_eq!(view.totals.functions, 2);
        assert_eq!(view.totals.visible, 1);
    }

    #[test]
    fn toggled_functions_leave_the_chart_but_keep_their_card() {
        let mut state = state_with(
            json!([[1, "a", 0, MS], [2, "b", 0, 2 * MS]]),
            day_filters(),
        );
        assert!(state.toggle_function("a"));
        let view = state.view();
        assert_eq!(view.functions, vec!["b"]);
        assert!(!view.summary("a").unwrap().enabled);
        assert!(view.series[0].get("a").is_none());
        assert!(view.series[0].get("b").is_some());

        assert!(!state.toggle_function("nope"));
    }

    #[test]
    fn selected_function_keeps_its_series_when_disabled() {
        let mut state = state_with(
            json!([[1, "a", 0, 5 * MS], [2, "b", 0, 7 * MS]]),
            day_filters(),
        );
        assert!(state.select_function("a"));
        assert!(state.toggle_function("a"));

        let view = state.view();
        assert_eq!(view.selected.as_deref(), Some("a"));
        assert!(view.series[0].get("a").is_none());
        let points = view.series_for("a");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].stats.unwrap().mean, 5.0);
    }

    #[test]
    fn disabled_functions_stay_disabled_across_refetch() {
        let mut state = state_with(json!([[1, "a", 0, MS], [2, "b", 0, MS]]), day_filters());
        state.toggle_function("a");

        state.replace_rows(vec![json!([3, "a", 0, MS]), json!([4, "c", 0, MS])]);
        let view = state.view();
        assert_eq!(view.functions, vec!["c"]);
        assert!(!view.summary("a").unwrap().enabled);
        assert!(!state.enabled().contains("b"));
    }

    #[test]
    fn stale_selection_falls_back_to_first_function() {
        let mut state = state_with(json!([[1, "a", 0, MS], [2, "b", 0, MS]]), day_filters());
        assert!(state.select_function("b"));
        assert_eq!(state.view().selected.as_deref(), Some("b"));

        state.replace_rows(vec![json!([3, "c", 0, MS]), json!([4, "d", 0, MS])]);
        assert_eq!(state.view().selected.as_deref(), Some("c"));

        assert!(!state.select_function("b"));
        assert_eq!(state.view().selected.as_deref(), Some("c"));
    }

    #[test]
    fn truncate_flag_rederives_names() {
        let mut state = state_with(
            json!([[1, "/api/v1/users/1", 0, MS], [2, "/api/v1/users/2", 0, MS]]),
            day_filters(),
        );
        assert_eq!(state.view().functions.len(), 2);

        state.set_truncate(true);
        assert_eq!(state.view().functions, vec!["/api/v1"]);
        assert_eq!(state.view().summary("/api/v1").unwrap().calls, 2);
    }

    #[test]
    fn health_tiers_from_rolling_mean() {
        let mut rows = vec![];
        for (name, ms) in [("slow", 450), ("mid", 250), ("fast", 150)] {
            for i in 0..401 {
                rows.push(json!([i, name, i * MS, ms * MS]));
            }
        }
        let state = state_with(Value::Array(rows), day_filters());
        let view = state.view();
        assert_eq!(view.health("slow"), Some(HealthStatus::Critical));
        assert_eq!(view.health("mid"), Some(HealthStatus::Warning));
        assert_eq!(view.health("fast"), Some(HealthStatus::Healthy));
        assert_eq!(
            view.totals.health,
            HealthCounts {
                healthy: 1,
                warning: 1,
                critical: 1,
                no_data: 0,
            }
        );
    }

    #[test]
    fn range_trims_series_but_rolling_window_is_fixed() {
        let day_ns = 24 * 60 * 60 * 1_000_000_000_i64;
        // 2024-01-15 12:00 UTC, so daily steps never share a local date.
        let base_ns = 1_705_320_000 * 1_000_000_000_i64;
        let rows: Vec<Value> = (0..40)
            .map(|d| json!([d, "f", base_ns + d * day_ns, (d + 1) * MS]))
            .collect();
        let mut state = state_with(Value::Array(rows), day_filters());
        assert_eq!(state.view().series.len(), 7);

        state.set_time_range(TimeRange::ThirtyDays);
        assert_eq!(state.view().series.len(), 30);
        let rolling = state.view().summary("f").unwrap().rolling.unwrap();
        // Last seven days carry durations 34..=40 ms.
        assert_eq!(rolling.min, 34.0);
        assert_eq!(rolling.max, 40.0);

        state.set_time_range(TimeRange::SixtyDays);
        assert_eq!(state.view().series.len(), 40);
    }

    #[test]
    fn granularity_change_rebuckets() {
        // 2024-01-15 12:00 UTC and five minutes later.
        let base_ns = 1_705_320_000 * 1_000_000_000_i64;
        let minute_ns = 60 * 1_000_000_000_i64;
        let filters = ViewFilters {
            granularity: Granularity::Hour,
            ..day_filters()
        };
        let mut state = state_with(
            json!([[1, "f", base_ns, MS], [2, "f", base_ns + 5 * minute_ns, 3 * MS]]),
            filters,
        );
        assert_eq!(state.view().series.len(), 1);

        state.set_granularity(Granularity::Minute);
        let view = state.view();
        assert_eq!(view.filters.granularity, Granularity::Minute);
        assert_eq!(view.series.len(), 2);
        assert_eq!(view.series_for("f")[1].stats.unwrap().mean, 3.0);
    }

    #[test]
    fn superseded_fetch_is_discarded() {
        let mut state = ViewState::new(URL, day_filters());
        let first = state.begin_fetch();
        let second = state.begin_fetch();

        assert!(state.complete_fetch(second, Ok(vec![json!([1, "new", 0, MS])])));
        assert!(!state.complete_fetch(first, Ok(vec![json!([1, "old", 0, MS])])));
        assert_eq!(state.view().functions, vec!["new"]);
    }

    #[test]
    fn url_switch_supersedes_fetches_of_the_old_url() {
        let mut state = ViewState::new(URL, day_filters());
        let old = state.begin_fetch();
        assert_eq!(old.url(), URL);

        state.set_api_url("http://other/logs");
        assert_eq!(state.api_url(), "http://other/logs");
        let new = state.begin_fetch();
        assert_eq!(new.url(), "http://other/logs");

        assert!(state.complete_fetch(new, Ok(vec![json!([1, "new", 0, MS])])));
        assert!(!state.complete_fetch(old, Ok(vec![json!([1, "old", 0, MS])])));
        assert_eq!(state.view().functions, vec!["new"]);
    }

    #[test]
    fn url_switch_alone_discards_in_flight_fetch() {
        let mut state = ViewState::new(URL, day_filters());
        let old = state.begin_fetch();
        state.set_api_url("http://other/logs");

        assert!(!state.complete_fetch(old, Ok(vec![json!([1, "old", 0, MS])])));
        assert!(state.view().functions.is_empty());
    }

    #[test]
    fn failed_fetch_clears_records_and_reports() {
        let mut state = state_with(json!([[1, "a", 0, MS]]), day_filters());
        let ticket = state.begin_fetch();
        state.complete_fetch(ticket, Err(FetchError::Status(503)));

        let view = state.view();
        assert!(view.functions.is_empty());
        assert_eq!(view.totals.records, 0);
        assert_eq!(view.selected, None);
        assert!(view.error.as_deref().unwrap().contains("503"));

        let ticket = state.begin_fetch();
        state.complete_fetch(ticket, Ok(vec![json!([1, "a", 0, MS])]));
        assert_eq!(state.view().error, None);
    }

    #[test]
    fn series_for_reports_gaps_as_absent() {
        let state = state_with(
            json!([[1, "a", 0, MS], [2, "b", 2 * 24 * 3600 * 1_000_000_000_i64, MS]]),
            day_filters(),
        );
        let points = state.view().series_for("a");
        assert_eq!(points.len(), 2);
        assert!(points[0].stats.is_some());
        assert!(points[1].stats.is_none());
    }
}
