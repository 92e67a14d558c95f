//! Prometheus process metrics, served at `/expvar`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Registry for all mirror metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static DOWNLOADS_SERVED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ricotta_downloads_served_total",
        "Archives streamed to clients",
    )
    .expect("metric creation failed")
});

pub static DOWNLOADS_UNAVAILABLE: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ricotta_downloads_unavailable_total",
        "Download requests refused because no mirror could supply the archive",
    )
    .expect("metric creation failed")
});

pub static SEARCHES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("ricotta_searches_total", "Search requests served")
        .expect("metric creation failed")
});

static REGISTER: Once = Once::new();

fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: [Box<dyn prometheus::core::Collector>; 3] = [
            Box::new(DOWNLOADS_SERVED.clone()),
            Box::new(DOWNLOADS_UNAVAILABLE.clone()),
            Box::new(SEARCHES.clone()),
        ];
        for collector in collectors {
            REGISTRY
                .register(collector)
                .expect("metric registration failed");
        }
    });
}

/// GET /expvar - process metrics in prometheus text format.
pub async fn expvar_handler() -> impl IntoResponse {
    register_metrics();

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(error) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!(%error, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    match String::from_utf8(buffer) {
        Ok(body) => (StatusCode::OK, body),
        Err(error) => {
            tracing::error!(%error, "metrics are not utf-8");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}
