//! Route configuration.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::metrics::expvar_handler;
use crate::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/status", get(handlers::status))
        .route("/expvar", get(expvar_handler))
        // Metadata
        .route("/b/{id}", get(handlers::beatmap))
        .route("/api/b/{id}", get(handlers::beatmap))
        .route("/api/md5/{md5}", get(handlers::set_by_md5))
        .route("/s/{id}", get(handlers::set))
        .route("/api/s/{id}", get(handlers::set))
        .route("/api/search", get(handlers::search))
        .route("/api/update", get(handlers::refresh_set))
        // Archives
        .route("/d/{id}", get(handlers::download))
        .route("/api/v1/download/{id}", get(handlers::download))
        // Compat family
        .route("/api/v1/map/{id}", get(handlers::compat_map))
        .route("/api/v1/set/{id}", get(handlers::compat_set))
        .route("/api/v1/search", get(handlers::compat_search))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
