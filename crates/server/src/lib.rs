//! HTTP surface of the beatmap mirror.
//!
//! Thin bindings of the catalog read paths, the search composer and the
//! archive cache onto axum routes:
//! - metadata lookups by id and MD5
//! - native and compat search
//! - archive downloads with single-flight cache acquisition
//! - status snapshot and process metrics

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod params;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, SetRefresher};

/// Server version reported on the landing page and in logs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
