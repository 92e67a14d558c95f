//! Router-level tests for the paths that do not need a live catalog.
//!
//! Database pools are built lazily against an unroutable address; handlers
//! that reach the store either degrade (status) or answer before touching it
//! (parse failures, token checks).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ricotta_downloader::{Client, DownloaderConfig};
use ricotta_housekeeper::House;
use ricotta_server::{AppState, create_router};
use sqlx::mysql::MySqlPoolOptions;
use tower::ServiceExt;

fn test_state(secret: &str) -> (tempfile::TempDir, AppState) {
    let temp = tempfile::tempdir().expect("tempdir");
    let house = House::new(vec![temp.path().to_path_buf()], 1.0);

    let db = MySqlPoolOptions::new()
        .connect_lazy("mysql://root@127.0.0.1:1/unreachable")
        .expect("lazy pool");
    let search_db = MySqlPoolOptions::new()
        .connect_lazy("mysql://root@127.0.0.1:1/unreachable")
        .expect("lazy pool");
    let downloader = Arc::new(
        Client::new(DownloaderConfig {
            primary_host: "unreachable.invalid".to_string(),
        })
        .expect("client"),
    );

    let state = AppState {
        db,
        search_db,
        house,
        downloader,
        secret: secret.into(),
        refresher: None,
    };
    (temp, state)
}

async fn get(router: &axum::Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&body).to_string())
}

#[tokio::test]
async fn landing_page_shows_the_banner() {
    let (_temp, state) = test_state("");
    let router = create_router(state);

    let (status, body) = get(&router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("ricotta"));
}

#[tokio::test]
async fn expvar_exposes_process_metrics() {
    let (_temp, state) = test_state("");
    let router = create_router(state);

    let (status, body) = get(&router, "/expvar").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("ricotta_downloads_served_total"));
    assert!(body.contains("ricotta_searches_total"));
}

#[tokio::test]
async fn malformed_download_id_is_a_bad_request() {
    let (_temp, state) = test_state("");
    let router = create_router(state);

    let (status, body) = get(&router, "/d/notanid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Malformed ID");

    let (status, _) = get(&router, "/api/v1/download/notanid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_metadata_ids_are_json_null() {
    let (_temp, state) = test_state("");
    let router = create_router(state);

    for uri in ["/b/zero.json", "/api/b/0", "/s/notanid", "/api/s/0"] {
        let (status, body) = get(&router, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body, "null", "{uri}");
    }
}

#[tokio::test]
async fn compat_family_wraps_errors() {
    let (_temp, state) = test_state("");
    let router = create_router(state);

    let (status, body) = get(&router, "/api/v1/map/notanid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["code"], 404);
    assert!(json["data"].is_null());
    assert_eq!(json["message"], "Beatmap not found");
}

#[tokio::test]
async fn refresh_requires_the_secret_token() {
    let (_temp, state) = test_state("s3cret");
    let router = create_router(state);

    let (status, _) = get(&router, "/api/update?id=1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&router, "/api/update?id=1&token=wrong").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Right token, but this deployment carries no crawler.
    let (status, body) = get(&router, "/api/update?id=1&token=s3cret").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "refresh unavailable");
}

#[tokio::test]
async fn refresh_is_disabled_with_an_empty_secret() {
    let (_temp, state) = test_state("");
    let router = create_router(state);

    let (status, _) = get(&router, "/api/update?id=1&token=").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_degrades_when_the_store_is_down() {
    let (_temp, state) = test_state("");
    let max_size = state.house.max_size();
    let router = create_router(state);

    let (status, body) = get(&router, "/status").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["MaxSize"], max_size);
    assert_eq!(json["MaxSizeInGB"], 1);
    assert_eq!(json["CacheMapsLength"], 0);
    assert_eq!(json["CountMaps"], 0);
    assert_eq!(json["BiggestSetID"], 0);
}
