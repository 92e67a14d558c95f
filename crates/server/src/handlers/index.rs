//! Landing page.

use std::sync::OnceLock;

use axum::response::{Html, IntoResponse, Response};

use crate::VERSION;

static PAGE: OnceLock<Option<String>> = OnceLock::new();

/// GET / - serves `page.html` from the working directory when present,
/// otherwise a plain banner.
pub async fn index() -> Response {
    let page = PAGE.get_or_init(|| std::fs::read_to_string("page.html").ok());
    match page {
        Some(html) => Html(html.as_str()).into_response(),
        None => Html(format!(
            "ricotta {VERSION}<br>\na caching beatmap mirror and search front-end"
        ))
        .into_response(),
    }
}
