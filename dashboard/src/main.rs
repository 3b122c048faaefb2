use std::sync::Arc;

use anyhow::{Context, Result};
use dashboard::state::AppState;
use dashboard::{background, routes};
use shared::config::TomlFileStore;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    shared::init_tracing!()?;
    let config = shared::load_server_config!()?;

    let store = TomlFileStore::open(&config.settings_path).with_context(|| {
        format!(
            "failed to open settings at {}",
            config.settings_path.display()
        )
    })?;
    info!(path = %store.path().display(), "opened settings store");
    let state = Arc::new(AppState::new(Box::new(store)).context("invalid dashboard settings")?);

    background::spawn_background_workers(Arc::clone(&state), config.refresh_interval);

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "dashboard listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
