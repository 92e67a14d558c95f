//! A single cached archive and its download latch.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use time::OffsetDateTime;
use tokio::fs::File;
use tokio::sync::{Notify, watch};

use crate::MIN_ARCHIVE_SIZE;

/// Coalescing wakeup handle for the cleaner task.
///
/// Entries hold a clone of this instead of a reference back to the registry;
/// any number of [`schedule`](Self::schedule) calls between cleanup passes
/// collapse into a single wakeup.
#[derive(Clone, Default)]
pub struct CleanupSignal(Arc<Notify>);

impl CleanupSignal {
    /// Request a cleanup pass. Never blocks.
    pub fn schedule(&self) {
        self.0.notify_one();
    }

    /// Wait for the next scheduled cleanup.
    pub(crate) async fn wait(&self) {
        self.0.notified().await;
    }
}

/// Mutable header of a cache entry, guarded by the entry lock.
struct Header {
    last_update: OffsetDateTime,
    last_requested: OffsetDateTime,
    file_size: u64,
    downloaded: bool,
    folders: Arc<[PathBuf]>,
}

/// A beatmap archive held (or about to be held) in the cache.
///
/// Identity is the `(id, no_video)` pair; at most one entry per pair lives in
/// a [`House`](crate::House). The download latch is armed by the acquirer
/// that receives the download obligation and released exactly once through
/// [`download_completed`](Self::download_completed) or
/// [`not_downloaded`](Self::not_downloaded). Releasing an unarmed latch is a
/// no-op, so a cooldown retry cannot underflow it.
pub struct CachedBeatmap {
    id: i64,
    no_video: bool,
    header: RwLock<Header>,
    in_flight: watch::Sender<bool>,
    cleanup: CleanupSignal,
}

impl CachedBeatmap {
    pub(crate) fn new(
        id: i64,
        no_video: bool,
        last_update: OffsetDateTime,
        folders: Arc<[PathBuf]>,
        cleanup: CleanupSignal,
    ) -> Self {
        Self {
            id,
            no_video,
            header: RwLock::new(Header {
                last_update,
                last_requested: OffsetDateTime::UNIX_EPOCH,
                file_size: 0,
                downloaded: false,
                folders,
            }),
            in_flight: watch::Sender::new(false),
            cleanup,
        }
    }

    /// Entry for an archive found on disk during the startup scan.
    ///
    /// `last_update` is left at the epoch so the first acquisition against a
    /// catalog record with a real timestamp forces a re-download.
    pub(crate) fn preloaded(
        id: i64,
        file_size: u64,
        folders: Arc<[PathBuf]>,
        cleanup: CleanupSignal,
    ) -> Self {
        let entry = Self::new(id, true, OffsetDateTime::UNIX_EPOCH, folders, cleanup);
        {
            let mut header = entry.header.write().unwrap();
            header.file_size = file_size;
            header.downloaded = true;
            header.last_requested = OffsetDateTime::now_utc();
        }
        entry
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn no_video(&self) -> bool {
        self.no_video
    }

    /// Whether the archive has been fully downloaded.
    pub fn is_downloaded(&self) -> bool {
        self.header.read().unwrap().downloaded
    }

    /// Byte length of the archive on disk; zero when not downloaded.
    pub fn file_size(&self) -> u64 {
        self.header.read().unwrap().file_size
    }

    pub fn last_update(&self) -> OffsetDateTime {
        self.header.read().unwrap().last_update
    }

    /// Instant of the last serving or download attempt; drives eviction order
    /// and the retry cooldown.
    pub fn last_requested(&self) -> OffsetDateTime {
        self.header.read().unwrap().last_requested
    }

    pub fn set_last_requested(&self, at: OffsetDateTime) {
        self.header.write().unwrap().last_requested = at;
    }

    fn file_name(&self) -> String {
        // NoVideo is kept in memory but deliberately not encoded here.
        format!("{}.osz", self.id)
    }

    fn folders(&self) -> Arc<[PathBuf]> {
        Arc::clone(&self.header.read().unwrap().folders)
    }

    /// Path of the cached file, scanning the volumes in order.
    pub async fn existing_path(&self) -> Option<PathBuf> {
        let name = self.file_name();
        for folder in self.folders().iter() {
            let path = folder.join(&name);
            if tokio::fs::metadata(&path).await.is_ok() {
                return Some(path);
            }
        }
        None
    }

    /// Path new archives are written to: always the last volume.
    pub fn write_path(&self) -> Option<PathBuf> {
        self.folders().last().map(|folder| folder.join(self.file_name()))
    }

    /// Open the cached archive for reading, preferring the first volume that
    /// holds it.
    pub async fn open(&self) -> io::Result<File> {
        match self.existing_path().await {
            Some(path) => File::open(path).await,
            None => Err(io::Error::from(io::ErrorKind::NotFound)),
        }
    }

    /// Create the archive file on the write volume, truncating any previous
    /// content.
    pub async fn create(&self) -> io::Result<File> {
        let path = self
            .write_path()
            .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;
        File::create(path).await
    }

    /// Arm the single-flight latch; the caller now owes a release.
    pub(crate) fn arm(&self) {
        self.in_flight.send_replace(true);
    }

    /// Block until the archive is downloaded or the in-flight download has
    /// released the latch (success or terminal failure). Returns immediately
    /// when nothing is in flight.
    pub async fn wait_downloaded(&self) {
        if self.is_downloaded() {
            return;
        }
        let mut busy = self.in_flight.subscribe();
        // An error here means the entry is being dropped; treat as released.
        let _ = busy.wait_for(|in_flight| !in_flight).await;
    }

    /// Record a finished download of `file_size` bytes, release the latch and
    /// schedule a cleanup pass.
    ///
    /// A zero-byte completion (the upstream has no such archive) leaves the
    /// entry not-downloaded: `file_size` is zero exactly when `downloaded`
    /// is false.
    pub fn download_completed(&self, file_size: u64) {
        {
            let mut header = self.header.write().unwrap();
            header.file_size = file_size;
            header.downloaded = file_size > 0;
        }
        self.in_flight.send_replace(false);
        self.cleanup.schedule();
    }

    /// Record a failed download: sweep corrupt placeholders off every volume,
    /// reset the entry, release the latch and schedule a cleanup pass.
    pub async fn not_downloaded(&self) {
        let name = self.file_name();
        for folder in self.folders().iter() {
            let path = folder.join(&name);
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.len() < MIN_ARCHIVE_SIZE => {
                    if let Err(error) = tokio::fs::remove_file(&path).await {
                        tracing::warn!(path = %path.display(), %error, "failed to remove placeholder");
                    }
                }
                _ => {}
            }
        }
        {
            let mut header = self.header.write().unwrap();
            header.file_size = 0;
            header.downloaded = false;
        }
        self.in_flight.send_replace(false);
        self.cleanup.schedule();
    }

    /// Mark the entry evicted. Does not touch the latch: eviction is not a
    /// download completion.
    pub(crate) fn mark_evicted(&self) {
        let mut header = self.header.write().unwrap();
        header.file_size = 0;
        header.downloaded = false;
    }

    /// Refresh folder list and catalog timestamp from a new acquisition.
    ///
    /// A strictly newer candidate invalidates the entry (the archive on disk
    /// no longer matches the catalog) and returns true, obliging the caller
    /// to re-download.
    pub(crate) fn refresh(&self, last_update: OffsetDateTime, folders: Arc<[PathBuf]>) -> bool {
        let mut header = self.header.write().unwrap();
        header.folders = folders;
        if header.last_update >= last_update {
            return false;
        }
        header.last_update = last_update;
        header.downloaded = false;
        header.file_size = 0;
        true
    }
}

impl std::fmt::Debug for CachedBeatmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedBeatmap")
            .field("id", &self.id)
            .field("no_video", &self.no_video)
            .field("downloaded", &self.is_downloaded())
            .field("file_size", &self.file_size())
            .finish()
    }
}
