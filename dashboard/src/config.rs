//! Behavioral constants for fetching, refreshing and settings defaults.

/// Endpoint used until the user saves their own.
pub const DEFAULT_API_URL: &str = "https://api.algoboard.org/logs";

/// Previously used API URLs kept in history.
pub const URL_HISTORY_LIMIT: usize = 10;

pub const API_URL_KEY: &str = "api_url";
pub const TRUNCATE_KEY: &str = "truncate_function_names";
pub const MIN_CALLS_KEY: &str = "min_call_threshold";
pub const GRANULARITY_KEY: &str = "granularity";
pub const TIME_RANGE_KEY: &str = "time_range";
pub const URL_HISTORY_KEY: &str = "url_history";
