//! Application state shared across handlers.

use std::sync::Arc;

use async_trait::async_trait;
use ricotta_downloader::Client;
use ricotta_housekeeper::House;
use sqlx::MySqlPool;

/// Hook for the external metadata crawler: re-fetch one set from the
/// upstream catalog. The binary ships without an implementation; deployments
/// that embed the crawler wire one in.
#[async_trait]
pub trait SetRefresher: Send + Sync {
    /// Returns whether the set exists upstream.
    async fn refresh(&self, set_id: i64)
    -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Primary relational store (read-only here).
    pub db: MySqlPool,
    /// Full-text engine, speaking the MySQL wire protocol.
    pub search_db: MySqlPool,
    /// On-disk archive cache.
    pub house: Arc<House>,
    /// Mirror download client.
    pub downloader: Arc<Client>,
    /// Token guarding the refresh endpoint.
    pub secret: Arc<str>,
    /// Optional crawler hook for `/api/update`.
    pub refresher: Option<Arc<dyn SetRefresher>>,
}
