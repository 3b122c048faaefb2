use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::state::AppState;

/// Refetches logs every `interval`. The first tick fires immediately, which
/// doubles as the initial load.
pub fn spawn_background_workers(state: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !state.refresh().await {
                debug!("background refresh superseded by a newer fetch");
            }
        }
    });
}
