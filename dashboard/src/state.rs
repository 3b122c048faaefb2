use std::sync::{Mutex, RwLock};

use shared::config::SettingsStore;
use tracing::info;

use crate::fetch::LogFetcher;
use crate::settings::{DashboardSettings, SettingsError};
use crate::url_history::UrlHistory;
use crate::view_state::ViewState;

pub struct AppState {
    /// Also owns the API URL, so a refresh reads the URL and claims its
    /// fetch ticket under one lock.
    pub view: RwLock<ViewState>,
    pub history: RwLock<UrlHistory>,
    pub settings: Mutex<Box<dyn SettingsStore>>,
    pub fetcher: LogFetcher,
}

impl AppState {
    pub fn new(store: Box<dyn SettingsStore>) -> Result<Self, SettingsError> {
        Self::with_fetcher(store, LogFetcher::new())
    }

    pub fn with_fetcher(
        store: Box<dyn SettingsStore>,
        fetcher: LogFetcher,
    ) -> Result<Self, SettingsError> {
        let settings = DashboardSettings::load(store.as_ref())?;
        let history = UrlHistory::load(store.as_ref());
        info!(api_url = %settings.api_url, "loaded dashboard settings");

        Ok(AppState {
            view: RwLock::new(ViewState::new(settings.api_url, settings.filters)),
            history: RwLock::new(history),
            settings: Mutex::new(store),
            fetcher,
        })
    }

    /// Re-reads the settings store and applies it to the live view.
    pub fn reload_settings(&self) -> Result<(), SettingsError> {
        let (settings, history) = {
            let store = self.settings.lock().unwrap();
            (
                DashboardSettings::load(store.as_ref())?,
                UrlHistory::load(store.as_ref()),
            )
        };

        *self.history.write().unwrap() = history;
        let mut view = self.view.write().unwrap();
        if view.api_url() != settings.api_url {
            view.set_api_url(settings.api_url);
        }
        view.set_filters(settings.filters);
        Ok(())
    }

    /// Fetches the configured URL and applies the result unless a newer
    /// refresh started in the meantime.
    pub async fn refresh(&self) -> bool {
        let ticket = self.view.write().unwrap().begin_fetch();
        let result = self.fetcher.fetch(ticket.url()).await;
        self.view.write().unwrap().complete_fetch(ticket, result)
    }
}
