//! Archive downloads from upstream mirrors.
//!
//! The [`Client`] walks an ordered list of mirrors, classifying login-page
//! redirects and non-zip bodies, and returns a validated byte stream. The
//! [`download`] orchestrator streams that into the cache entry's file slot
//! and fulfils the entry's completion obligations, so waiters always
//! unblock.

mod error;
mod stream;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use ricotta_housekeeper::CachedBeatmap;
use tokio::io::AsyncWriteExt;

pub use error::{DownloadError, DownloadResult};
pub use stream::ArchiveStream;

/// Host the upstream redirects to when it wants a login instead of serving
/// the archive.
const LOGIN_HOST: &str = "old.ppy.sh";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Download configuration, passed into [`Client::new`]. No process globals.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Host of the primary mirror, e.g. `osu.ppy.sh`.
    pub primary_host: String,
}

/// HTTP client that fetches beatmap archives from the mirror chain.
pub struct Client {
    http: reqwest::Client,
    config: DownloaderConfig,
}

impl Client {
    pub fn new(config: DownloaderConfig) -> DownloadResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }

    /// Candidate download URLs, most preferred first.
    fn mirror_urls(&self, set_id: i64) -> [String; 3] {
        [
            format!(
                "https://{}/d/{}?novideo=1",
                self.config.primary_host, set_id
            ),
            format!("https://storage.ripple.moe/d/{set_id}?novideo=1"),
            format!("https://txy1.sayobot.cn/beatmaps/download/full/{set_id}n?server=null"),
        ]
    }

    /// Fetch the archive for `set_id`, trying each mirror in order.
    ///
    /// Returns the first validated stream, or the last error when every
    /// mirror fails. `NoRedirect` means the archive does not exist upstream.
    pub async fn fetch(&self, set_id: i64, _no_video: bool) -> DownloadResult<ArchiveStream> {
        let mut last_error = DownloadError::NoRedirect;
        for url in self.mirror_urls(set_id) {
            tracing::info!(set_id, %url, "trying mirror");
            match self.try_mirror(&url).await {
                Ok(stream) => {
                    tracing::info!(set_id, %url, "mirror accepted");
                    return Ok(stream);
                }
                Err(error) => {
                    tracing::warn!(set_id, %url, %error, "mirror failed");
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }

    async fn try_mirror(&self, url: &str) -> DownloadResult<ArchiveStream> {
        let response = self.http.get(url).send().await?;
        // Redirect chains that end on the login host mean the upstream does
        // not serve this archive.
        if response.url().host_str() == Some(LOGIN_HOST) {
            return Err(DownloadError::NoRedirect);
        }
        stream::sniff_zip(Box::pin(response.bytes_stream())).await
    }
}

/// Stream the archive for `beatmap` onto disk.
///
/// Skips the network entirely when the file is already present. On success
/// (and on a failure after a partial write) the copied byte count is reported
/// through `download_completed`, so every waiter unblocks and the cleaner
/// sees whatever landed on disk. A `NoRedirect` from every mirror completes
/// with size zero and writes nothing.
pub async fn download(client: &Client, beatmap: &Arc<CachedBeatmap>) -> DownloadResult<()> {
    if let Some(path) = beatmap.existing_path().await {
        match tokio::fs::metadata(&path).await {
            Ok(meta) => {
                tracing::info!(id = beatmap.id(), "archive already on disk, skipping download");
                beatmap.download_completed(meta.len());
                return Ok(());
            }
            Err(error) => {
                tracing::warn!(id = beatmap.id(), %error, "cannot stat cached archive");
            }
        }
    }

    let mut body = match client.fetch(beatmap.id(), beatmap.no_video()).await {
        Ok(body) => body,
        Err(DownloadError::NoRedirect) => {
            beatmap.download_completed(0);
            return Ok(());
        }
        Err(error) => {
            beatmap.not_downloaded().await;
            return Err(error);
        }
    };

    let mut file = match beatmap.create().await {
        Ok(file) => file,
        Err(error) => {
            beatmap.not_downloaded().await;
            return Err(error.into());
        }
    };

    let mut copied: u64 = 0;
    let mut result = Ok(());
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                if let Err(error) = file.write_all(&bytes).await {
                    result = Err(error.into());
                    break;
                }
                copied += bytes.len() as u64;
            }
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }
    if result.is_ok() {
        if let Err(error) = file.flush().await {
            result = Err(error.into());
        }
    }

    match &result {
        Ok(()) => tracing::info!(id = beatmap.id(), bytes = copied, "download complete"),
        Err(error) => {
            tracing::warn!(id = beatmap.id(), bytes = copied, %error, "download failed mid-copy");
        }
    }
    beatmap.download_completed(copied);
    result
}
