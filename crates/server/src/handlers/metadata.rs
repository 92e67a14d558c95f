//! Metadata lookups, native search and the gated set refresh.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::metrics;
use crate::params;
use crate::state::AppState;

/// The metadata family answers failures as a JSON `null` body with the
/// matching status, never an error page.
fn json_null(status: StatusCode) -> Response {
    (status, Json(serde_json::Value::Null)).into_response()
}

/// GET /b/:id and /api/b/:id - single beatmap.
pub async fn beatmap(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = params::parse_id(&id) else {
        return json_null(StatusCode::NOT_FOUND);
    };
    match ricotta_models::fetch_beatmaps(&state.db, &[id]).await {
        Ok(mut beatmaps) if !beatmaps.is_empty() => Json(beatmaps.swap_remove(0)).into_response(),
        Ok(_) => json_null(StatusCode::NOT_FOUND),
        Err(error) => {
            tracing::error!(id, %error, "beatmap lookup failed");
            json_null(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /s/:id and /api/s/:id - single set with children.
pub async fn set(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = params::parse_id(&id) else {
        return json_null(StatusCode::NOT_FOUND);
    };
    match ricotta_models::fetch_set(&state.db, id, true).await {
        Ok(Some(set)) => Json(set).into_response(),
        Ok(None) => json_null(StatusCode::NOT_FOUND),
        Err(error) => {
            tracing::error!(id, %error, "set lookup failed");
            json_null(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/md5/:md5 - the set owning the beatmap with this file hash.
pub async fn set_by_md5(State(state): State<AppState>, Path(md5): Path<String>) -> Response {
    let md5 = params::strip_json_suffix(&md5);
    if md5.is_empty() {
        return json_null(StatusCode::NOT_FOUND);
    }
    match ricotta_models::fetch_set_by_md5(&state.db, md5, true).await {
        Ok(Some(set)) => Json(set).into_response(),
        Ok(None) => json_null(StatusCode::NOT_FOUND),
        Err(error) => {
            tracing::error!(md5, %error, "md5 lookup failed");
            json_null(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/search - native search, a bare JSON array of sets.
pub async fn search(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let opts = params::parse_search(&pairs, false);
    metrics::SEARCHES.inc();
    match ricotta_models::search_sets(&state.db, &state.search_db, &opts).await {
        Ok(sets) => Json(sets).into_response(),
        Err(error) => {
            tracing::error!(%error, "search failed");
            json_null(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /api/update?id=&token= - secret-gated refresh of one set through the
/// crawler hook.
pub async fn refresh_set(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let token = params::first(&pairs, "token").unwrap_or_default();
    if state.secret.is_empty() || token != state.secret.as_ref() {
        return json_null(StatusCode::NOT_FOUND);
    }
    let Some(id) = params::first(&pairs, "id").and_then(params::parse_id) else {
        return json_null(StatusCode::NOT_FOUND);
    };
    let Some(refresher) = &state.refresher else {
        return (StatusCode::SERVICE_UNAVAILABLE, "refresh unavailable").into_response();
    };
    match refresher.refresh(id).await {
        Ok(true) => "okay".into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "map not found").into_response(),
        Err(error) => {
            tracing::error!(id, %error, "refresh failed");
            (StatusCode::NOT_FOUND, "map not found").into_response()
        }
    }
}
