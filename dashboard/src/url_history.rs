use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::config::SettingsStore;
use tracing::warn;

use crate::config::{URL_HISTORY_KEY, URL_HISTORY_LIMIT};
use crate::settings::SettingsError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlHistoryItem {
    pub id: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

/// API URLs the user has saved, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlHistory {
    #[serde(default)]
    pub urls: Vec<UrlHistoryItem>,
}

impl UrlHistory {
    /// Reads the history from `store`. A corrupt entry yields an empty
    /// history rather than an error.
    pub fn load(store: &dyn SettingsStore) -> Self {
        let Some(raw) = store.get(URL_HISTORY_KEY) else {
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(history) => history,
            Err(e) => {
                warn!("discarding unreadable URL history: {e}");
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<(), SettingsError> {
        let encoded = serde_json::to_string(self).map_err(|source| SettingsError::Encode {
            key: URL_HISTORY_KEY,
            source,
        })?;
        store.set(URL_HISTORY_KEY, encoded)?;
        Ok(())
    }

    /// Moves `url` to the front, dropping older duplicates and anything past
    /// the history limit.
    pub fn push(&mut self, url: &str, now: DateTime<Utc>) -> &UrlHistoryItem {
        self.urls.retain(|item| item.url != url);

        let mut stamp = now.timestamp_millis();
        while self.urls.iter().any(|item| item.id == stamp.to_string()) {
            stamp += 1;
        }

        self.urls.insert(
            0,
            UrlHistoryItem {
                id: stamp.to_string(),
                url: url.to_owned(),
                timestamp: now,
            },
        );
        self.urls.truncate(URL_HISTORY_LIMIT);
        &self.urls[0]
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.urls.len();
        self.urls.retain(|item| item.id != id);
        self.urls.len() != before
    }
}
