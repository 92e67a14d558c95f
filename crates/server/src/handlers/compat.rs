//! The `/api/v1` compatibility family: same data, `{data, code, message}`
//! envelope and the compat field casing.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ricotta_models::{BeatmapView, SetView};
use serde::Serialize;

use crate::metrics;
use crate::params;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    data: Option<T>,
    code: u16,
    message: String,
}

fn wrapped<T: Serialize>(data: T) -> Response {
    Json(Envelope {
        data: Some(data),
        code: StatusCode::OK.as_u16(),
        message: String::new(),
    })
    .into_response()
}

fn wrapped_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(Envelope::<serde_json::Value> {
            data: None,
            code: status.as_u16(),
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// GET /api/v1/map/:id - single difficulty in the compat shape.
pub async fn compat_map(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = params::parse_id(&id) else {
        return wrapped_error(StatusCode::NOT_FOUND, "Beatmap not found");
    };
    let beatmap = match ricotta_models::fetch_beatmaps(&state.db, &[id]).await {
        Ok(mut beatmaps) if !beatmaps.is_empty() => beatmaps.swap_remove(0),
        Ok(_) => return wrapped_error(StatusCode::NOT_FOUND, "Beatmap not found"),
        Err(error) => {
            tracing::error!(id, %error, "compat beatmap lookup failed");
            return wrapped_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
        }
    };
    // The compat shape derives OsuFile from the parent set's naming.
    match ricotta_models::fetch_set(&state.db, beatmap.parent_set_id, false).await {
        Ok(Some(set)) => wrapped(BeatmapView::from_parts(
            beatmap,
            &set.artist,
            &set.title,
            &set.creator,
        )),
        Ok(None) => wrapped_error(StatusCode::NOT_FOUND, "Beatmap not found"),
        Err(error) => {
            tracing::error!(id, %error, "compat parent set lookup failed");
            wrapped_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// GET /api/v1/set/:id - set with children in the compat shape.
pub async fn compat_set(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = params::parse_id(&id) else {
        return wrapped_error(StatusCode::NOT_FOUND, "Set not found");
    };
    match ricotta_models::fetch_set(&state.db, id, true).await {
        Ok(Some(set)) => wrapped(SetView::from(set)),
        Ok(None) => wrapped_error(StatusCode::NOT_FOUND, "Set not found"),
        Err(error) => {
            tracing::error!(id, %error, "compat set lookup failed");
            wrapped_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// GET /api/v1/search - search accepting the extended range filters.
pub async fn compat_search(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let opts = params::parse_search(&pairs, true);
    metrics::SEARCHES.inc();
    match ricotta_models::search_sets(&state.db, &state.search_db, &opts).await {
        Ok(sets) => wrapped(sets.into_iter().map(SetView::from).collect::<Vec<_>>()),
        Err(error) => {
            tracing::error!(%error, "compat search failed");
            wrapped_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}
