use std::fmt::Display;
use std::io;
use std::str::FromStr;

use shared::config::SettingsStore;
use thiserror::Error;
use tracing::warn;

use crate::config::{
    API_URL_KEY, DEFAULT_API_URL, GRANULARITY_KEY, MIN_CALLS_KEY, TIME_RANGE_KEY, TRUNCATE_KEY,
};
use crate::view_state::ViewFilters;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("API URL must not be empty")]
    EmptyApiUrl,
    #[error("failed to persist settings: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode `{key}`: {source}")]
    Encode {
        key: &'static str,
        source: serde_json::Error,
    },
}

/// Typed view over the user's persisted preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSettings {
    pub api_url: String,
    pub filters: ViewFilters,
}

impl DashboardSettings {
    /// Reads every preference from `store`. Missing or unparsable values fall
    /// back to their defaults; only an explicitly empty API URL is an error.
    pub fn load(store: &dyn SettingsStore) -> Result<Self, SettingsError> {
        let api_url = match store.get(API_URL_KEY) {
            Some(url) if url.trim().is_empty() => return Err(SettingsError::EmptyApiUrl),
            Some(url) => url,
            None => DEFAULT_API_URL.to_owned(),
        };

        let defaults = ViewFilters::default();
        let filters = ViewFilters {
            granularity: read(store, GRANULARITY_KEY, defaults.granularity),
            time_range: read(store, TIME_RANGE_KEY, defaults.time_range),
            min_calls: read(store, MIN_CALLS_KEY, defaults.min_calls),
            truncate: read(store, TRUNCATE_KEY, defaults.truncate),
        };

        Ok(Self { api_url, filters })
    }

    pub fn save_api_url(store: &mut dyn SettingsStore, url: &str) -> Result<(), SettingsError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(SettingsError::EmptyApiUrl);
        }
        store.set(API_URL_KEY, url.to_owned())?;
        Ok(())
    }

    pub fn save_filters(
        store: &mut dyn SettingsStore,
        filters: &ViewFilters,
    ) -> Result<(), SettingsError> {
        store.set(GRANULARITY_KEY, filters.granularity.to_string())?;
        store.set(TIME_RANGE_KEY, filters.time_range.to_string())?;
        store.set(MIN_CALLS_KEY, filters.min_calls.to_string())?;
        store.set(TRUNCATE_KEY, filters.truncate.to_string())?;
        Ok(())
    }
}

fn read<T>(store: &dyn SettingsStore, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = store.get(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            warn!(key, value = %raw, "ignoring invalid setting: {e}");
            default
        }
    }
}
