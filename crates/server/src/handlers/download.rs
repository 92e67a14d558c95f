//! Archive downloads.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use ricotta_housekeeper::{AcquireRequest, MIN_ARCHIVE_SIZE};
use ricotta_models::Set;
use time::{Duration, OffsetDateTime};
use tokio_util::io::ReaderStream;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::params;
use crate::state::AppState;

/// Minimum wait before re-trying upstream after every mirror failed for an
/// entry.
const RETRY_COOLDOWN: Duration = Duration::minutes(10);

/// GET /d/:id and /api/v1/download/:id - stream the cached archive,
/// downloading it first if needed.
pub async fn download(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let id = params::parse_id(&id).ok_or(ApiError::MalformedId)?;
    let set = ricotta_models::fetch_set(&state.db, id, false)
        .await?
        .ok_or(ApiError::SetNotFound)?;

    // NoVideo is pinned: the upstream request always asks for the no-video
    // variant and the cache does not key files on it.
    let (entry, must_download) = state.house.acquire(AcquireRequest {
        id,
        no_video: true,
        last_update: set.last_update,
    });

    if must_download {
        if let Err(error) = ricotta_downloader::download(&state.downloader, &entry).await {
            tracing::warn!(id, %error, "download attempt failed");
        }
        if entry.file_size() == 0 {
            entry.set_last_requested(OffsetDateTime::now_utc());
            metrics::DOWNLOADS_UNAVAILABLE.inc();
            return Err(ApiError::Unavailable);
        }
    } else {
        entry.wait_downloaded().await;
        if entry.file_size() == 0 {
            let now = OffsetDateTime::now_utc();
            if now < entry.last_requested() + RETRY_COOLDOWN {
                metrics::DOWNLOADS_UNAVAILABLE.inc();
                return Err(ApiError::Unavailable);
            }
            // Mirrors that were down may be back.
            entry.set_last_requested(now);
            if let Err(error) = ricotta_downloader::download(&state.downloader, &entry).await {
                tracing::warn!(id, %error, "retry after cooldown failed");
            }
            if entry.file_size() == 0 {
                metrics::DOWNLOADS_UNAVAILABLE.inc();
                return Err(ApiError::Unavailable);
            }
        }
    }

    entry.set_last_requested(OffsetDateTime::now_utc());

    let file = entry.open().await?;
    let meta = file.metadata().await?;
    if meta.len() < MIN_ARCHIVE_SIZE {
        // Corrupt placeholder: invalidate before committing a response.
        entry.not_downloaded().await;
        metrics::DOWNLOADS_UNAVAILABLE.inc();
        return Err(ApiError::Unavailable);
    }

    metrics::DOWNLOADS_SERVED.inc();
    let headers = [
        (CONTENT_TYPE, "application/octet-stream".to_string()),
        (CONTENT_DISPOSITION, content_disposition(&set)),
        (CONTENT_LENGTH, entry.file_size().to_string()),
    ];
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((headers, body).into_response())
}

/// `attachment; filename="<id> <artist> - <title>.osz"` with embedded quotes
/// and backslashes escaped; control characters cannot appear in a header and
/// are dropped.
fn content_disposition(set: &Set) -> String {
    let filename = format!("{} {} - {}.osz", set.id, set.artist, set.title);
    let mut escaped = String::with_capacity(filename.len());
    for c in filename.chars() {
        match c {
            '"' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            c if c.is_control() => {}
            c => escaped.push(c),
        }
    }
    format!("attachment; filename=\"{escaped}\"")
}
