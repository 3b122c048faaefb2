use std::sync::Arc;

use axum::Router;
use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::charts::{Granularity, TimeRange};
use crate::settings::DashboardSettings;
use crate::state::AppState;
use crate::url_history::UrlHistory;
use crate::view_state::{DashboardView, FunctionPoint};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/view", get(view))
        .route("/refresh", post(refresh))
        .route("/functions/{name}/series", get(function_series))
        .route("/functions/{name}/toggle", post(toggle_function))
        .route("/selection", put(select_function))
        .route("/filters", put(update_filters))
        .route("/settings/api-url", put(update_api_url))
        .route("/settings/reload", post(reload_settings))
        .route("/settings/url-history", get(url_history))
        .route("/settings/url-history/{id}", delete(remove_url_history))
        .with_state(state)
}

fn snapshot(state: &AppState) -> Json<DashboardView> {
    Json(state.view.read().unwrap().view().clone())
}

pub async fn view(State(state): State<Arc<AppState>>) -> Json<DashboardView> {
    snapshot(&state)
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> Json<DashboardView> {
    state.refresh().await;
    snapshot(&state)
}

pub async fn function_series(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FunctionPoint>>, StatusCode> {
    let view_state = state.view.read().unwrap();
    let view = view_state.view();
    if view.summary(&name).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(view.series_for(&name)))
}

pub async fn toggle_function(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardView>, StatusCode> {
    if !state.view.write().unwrap().toggle_function(&name) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(snapshot(&state))
}

#[derive(Deserialize)]
pub struct SelectionRequest {
    function: String,
}

pub async fn select_function(
    State(state): State<Arc<AppState>>,
    Json(data): Json<SelectionRequest>,
) -> Result<Json<DashboardView>, StatusCode> {
    if !state.view.write().unwrap().select_function(&data.function) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(snapshot(&state))
}

#[derive(Deserialize)]
pub struct FiltersRequest {
    granularity: Option<Granularity>,
    time_range: Option<TimeRange>,
    min_calls: Option<i64>,
    truncate: Option<bool>,
}

pub async fn update_filters(
    State(state): State<Arc<AppState>>,
    Json(data): Json<FiltersRequest>,
) -> Json<DashboardView> {
    let filters = {
        let mut view_state = state.view.write().unwrap();
        let mut filters = view_state.filters();
        if let Some(granularity) = data.granularity {
            filters.granularity = granularity;
        }
        if let Some(time_range) = data.time_range {
            filters.time_range = time_range;
        }
        if let Some(min_calls) = data.min_calls {
            filters.min_calls = min_calls;
        }
        if let Some(truncate) = data.truncate {
            filters.truncate = truncate;
        }
        view_state.set_filters(filters);
        filters
    };

    let mut store = state.settings.lock().unwrap();
    if let Err(e) = DashboardSettings::save_filters(store.as_mut(), &filters) {
        warn!("failed to persist filters: {e}");
    }
    drop(store);

    snapshot(&state)
}

#[derive(Deserialize)]
pub struct ApiUrlRequest {
    url: String,
}

/// Saves a new API URL, records it in history and refetches from it.
pub async fn update_api_url(
    State(state): State<Arc<AppState>>,
    Json(data): Json<ApiUrlRequest>,
) -> Result<Json<DashboardView>, StatusCode> {
    let url = data.url.trim().to_owned();
    {
        // Lock ordering: settings first, then history
        let mut store = state.settings.lock().unwrap();
        DashboardSettings::save_api_url(store.as_mut(), &url).map_err(|e| {
            warn!("rejected API URL: {e}");
            StatusCode::BAD_REQUEST
        })?;

        let mut history = state.history.write().unwrap();
        history.push(&url, Utc::now());
        if let Err(e) = history.save(store.as_mut()) {
            warn!("failed to persist URL history: {e}");
        }
    }

    info!(api_url = %url, "switched API URL");
    state.view.write().unwrap().set_api_url(url);
    state.refresh().await;
    Ok(snapshot(&state))
}

pub async fn reload_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardView>, StatusCode> {
    state.reload_settings().map_err(|e| {
        warn!("failed to reload settings: {e}");
        StatusCode::UNPROCESSABLE_ENTITY
    })?;
    Ok(snapshot(&state))
}

pub async fn url_history(State(state): State<Arc<AppState>>) -> Json<UrlHistory> {
    Json(state.history.read().unwrap().clone())
}

pub async fn remove_url_history(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> StatusCode {
    let mut store = state.settings.lock().unwrap();
    let mut history = state.history.write().unwrap();
    if !history.remove(&id) {
        return StatusCode::NOT_FOUND;
    }
    if let Err(e) = history.save(store.as_mut()) {
        warn!("failed to persist URL history: {e}");
    }
    StatusCode::NO_CONTENT
}
