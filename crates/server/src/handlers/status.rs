//! Status snapshot.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StatusResponse {
    max_size: u64,
    #[serde(rename = "MaxSizeInGB")]
    max_size_in_gb: u32,
    cache_maps_length: usize,
    /// Downloaded bytes, integer-divided into GB.
    cache_maps_size: u64,
    count_maps: i64,
    #[serde(rename = "BiggestSetID")]
    biggest_set_id: i64,
}

/// GET /status - cache and catalog snapshot. Store failures degrade the
/// counters to zero instead of failing the endpoint.
pub async fn status(State(state): State<AppState>) -> Json<impl Serialize> {
    let biggest_set_id = ricotta_models::biggest_set_id(&state.db)
        .await
        .unwrap_or_else(|error| {
            tracing::warn!(%error, "biggest set id unavailable");
            0
        });
    let count_maps = ricotta_models::count_sets(&state.db)
        .await
        .unwrap_or_else(|error| {
            tracing::warn!(%error, "set count unavailable");
            0
        });

    Json(StatusResponse {
        max_size: state.house.max_size(),
        max_size_in_gb: state.house.max_size_gb(),
        cache_maps_length: state.house.len(),
        cache_maps_size: state.house.cache_size() / GIB,
        count_maps,
        biggest_set_id,
    })
}
