use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use anyhow::{Context, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_SETTINGS_PATH: &str = "data/settings.toml";
const DEFAULT_REFRESH_SECS: u64 = 60;

pub struct ServerConfig {
    /// Address the dashboard API listens on
    pub bind_addr: String,
    /// File backing the user settings store
    pub settings_path: PathBuf,
    /// How often the background worker refetches logs
    pub refresh_interval: Duration,
}

impl ServerConfig {
    pub fn load(manifest_dir: &Path) -> Result<Self> {
        #[cfg(debug_assertions)]
        if let Err(e) = dotenvy::from_path(manifest_dir.join(".env")) {
            tracing::debug!("no .env file loaded: {e}");
        }
        #[cfg(not(debug_assertions))]
        let _ = manifest_dir;

        let refresh_secs = match env::var("DASHBOARD_REFRESH_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .context("DASHBOARD_REFRESH_SECS must be a whole number of seconds")?,
            Err(_) => DEFAULT_REFRESH_SECS,
        };

        Ok(Self {
            bind_addr: env::var("DASHBOARD_BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_owned()),
            settings_path: env::var("DASHBOARD_SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_PATH)),
            refresh_interval: Duration::from_secs(refresh_secs.max(1)),
        })
    }
}

/// Load server config using the calling crate's manifest directory.
#[macro_export]
macro_rules! load_server_config {
    () => {
        $crate::config::ServerConfig::load(std::path::Path::new(env!("CARGO_MANIFEST_DIR")))
    };
}

/// Opaque string key-value store for user preferences.
///
/// Consumers read typed values out of it themselves; the store only knows
/// strings.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> io::Result<()>;
}

/// Settings that live only for the lifetime of the process.
#[derive(Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_owned(), value.into());
        self
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> io::Result<()> {
        self.values.insert(key.to_owned(), value);
        Ok(())
    }
}

/// A flat string table persisted as TOML. Every `set` rewrites the file.
pub struct TomlFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl TomlFileStore {
    /// Opens the store at `path`. A missing file is an empty store; other I/O
    /// and parse errors are propagated.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(&self.values)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, content)
    }
}

impl SettingsStore for TomlFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> io::Result<()> {
        self.values.insert(key.to_owned(), value);
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips_values() {
        let mut store = MemoryStore::new().with("api_url", "http://localhost:8000/logs");
        assert_eq!(
            store.get("api_url").as_deref(),
            Some("http://localhost:8000/logs")
        );
        store.set("api_url", "http://other/logs".to_owned()).unwrap();
        assert_eq!(store.get("api_url").as_deref(), Some("http://other/logs"));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn toml_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlFileStore::open(dir.path().join("settings.toml")).unwrap();
        assert_eq!(store.get("api_url"), None);
    }

    #[test]
    fn toml_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut store = TomlFileStore::open(&path).unwrap();
        store.set("min_call_threshold", "5".to_owned()).unwrap();
        store.set("truncate_function_names", "false".to_owned()).unwrap();

        let reopened = TomlFileStore::open(&path).unwrap();
        assert_eq!(reopened.path(), path);
        assert_eq!(reopened.get("min_call_threshold").as_deref(), Some("5"));
        assert_eq!(
            reopened.get("truncate_function_names").as_deref(),
            Some("false")
        );
    }

    #[test]
    fn toml_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "this is = = not toml").unwrap();
        let err = TomlFileStore::open(&path).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
