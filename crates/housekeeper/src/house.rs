//! The registry of cached archives and its background cleaner.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;

use crate::ZIP_MAGIC;
use crate::beatmap::{CachedBeatmap, CleanupSignal};

const GIB: u64 = 1024 * 1024 * 1024;

/// How often the cleaner runs regardless of explicit scheduling.
const CLEANER_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// A candidate for acquisition: the identity pair plus the catalog timestamp
/// used to detect staleness.
#[derive(Debug, Clone, Copy)]
pub struct AcquireRequest {
    pub id: i64,
    pub no_video: bool,
    pub last_update: OffsetDateTime,
}

/// Process-local registry of cached beatmap archives.
///
/// Holds every [`CachedBeatmap`], the ordered data-volume list and the
/// aggregate size bound. Created once at startup, populated by
/// [`load_state`](Self::load_state), then mutated only through
/// [`acquire`](Self::acquire) and the cleaner.
pub struct House {
    max_size: u64,
    max_size_gb: u32,
    folders: Arc<[PathBuf]>,
    state: Mutex<Vec<Arc<CachedBeatmap>>>,
    cleanup: CleanupSignal,
}

impl House {
    pub fn new(data_folders: Vec<PathBuf>, max_disk_gb: f64) -> Arc<Self> {
        Self::with_max_size(
            data_folders,
            (GIB as f64 * max_disk_gb) as u64,
            max_disk_gb as u32,
        )
    }

    pub fn with_max_size(data_folders: Vec<PathBuf>, max_size: u64, max_size_gb: u32) -> Arc<Self> {
        Arc::new(Self {
            max_size,
            max_size_gb,
            folders: data_folders.into(),
            state: Mutex::new(Vec::new()),
            cleanup: CleanupSignal::default(),
        })
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn max_size_gb(&self) -> u32 {
        self.max_size_gb
    }

    pub fn data_folders(&self) -> &[PathBuf] {
        &self.folders
    }

    /// Number of registry entries, downloaded or not.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().is_empty()
    }

    /// Total bytes of downloaded archives.
    pub fn cache_size(&self) -> u64 {
        self.downloaded_entries().0
    }

    /// Explicitly request a cleanup pass; coalesces with other triggers.
    pub fn schedule_cleanup(&self) {
        self.cleanup.schedule();
    }

    /// Look up or register the entry for `req`.
    ///
    /// Returns the entry and whether the caller must download it. A fresh
    /// entry or a candidate with a strictly newer `last_update` arms the
    /// single-flight latch and hands the download obligation to the caller;
    /// otherwise the caller may serve the entry as-is, waiting on
    /// [`CachedBeatmap::wait_downloaded`] if a download is in flight.
    pub fn acquire(&self, req: AcquireRequest) -> (Arc<CachedBeatmap>, bool) {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .iter()
            .find(|entry| entry.id() == req.id && entry.no_video() == req.no_video)
        {
            let existing = Arc::clone(existing);
            drop(state);

            let must_download = existing.refresh(req.last_update, Arc::clone(&self.folders));
            if must_download {
                existing.arm();
            }
            return (existing, must_download);
        }

        let entry = Arc::new(CachedBeatmap::new(
            req.id,
            req.no_video,
            req.last_update,
            Arc::clone(&self.folders),
            self.cleanup.clone(),
        ));
        state.push(Arc::clone(&entry));
        drop(state);

        entry.arm();
        (entry, true)
    }

    /// Rebuild the registry from the data volumes.
    ///
    /// Every `<id>.osz` file with a numeric stem becomes a downloaded entry;
    /// the first volume wins when an id appears on several. Malformed names
    /// are skipped. Returns the number of entries loaded.
    pub async fn load_state(&self) -> io::Result<usize> {
        let mut loaded = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for folder in self.folders.iter() {
            let mut dir = tokio::fs::read_dir(folder).await?;
            while let Some(dirent) = dir.next_entry().await? {
                let name = dirent.file_name();
                let Some(id) = name
                    .to_str()
                    .and_then(|n| n.strip_suffix(".osz"))
                    .and_then(|stem| stem.parse::<i64>().ok())
                else {
                    continue;
                };
                if !seen.insert(id) {
                    continue;
                }
                let meta = dirent.metadata().await?;
                if !meta.is_file() {
                    continue;
                }
                loaded.push(Arc::new(CachedBeatmap::preloaded(
                    id,
                    meta.len(),
                    Arc::clone(&self.folders),
                    self.cleanup.clone(),
                )));
            }
        }

        let count = loaded.len();
        *self.state.lock().unwrap() = loaded;
        tracing::info!(entries = count, "cache state loaded from disk");
        Ok(count)
    }

    /// Delete every file on the data volumes that does not start with the ZIP
    /// magic. Returns the number of files removed. Idempotent.
    pub async fn remove_non_zip(&self) -> io::Result<usize> {
        let mut removed = 0;
        for folder in self.folders.iter() {
            let mut dir = tokio::fs::read_dir(folder).await?;
            while let Some(dirent) = dir.next_entry().await? {
                let path = dirent.path();
                if !dirent.metadata().await?.is_file() {
                    continue;
                }
                let mut head = [0u8; 4];
                let is_zip = match tokio::fs::File::open(&path).await {
                    Ok(mut file) => file.read_exact(&mut head).await.is_ok() && head == ZIP_MAGIC,
                    Err(error) => {
                        tracing::warn!(path = %path.display(), %error, "cannot inspect file");
                        continue;
                    }
                };
                if !is_zip {
                    tracing::info!(path = %path.display(), "removing non-zip file");
                    tokio::fs::remove_file(&path).await?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn downloaded_entries(&self) -> (u64, Vec<Arc<CachedBeatmap>>) {
        let state = self.state.lock().unwrap();
        let downloaded: Vec<_> = state
            .iter()
            .filter(|entry| entry.is_downloaded())
            .cloned()
            .collect();
        let total = downloaded.iter().map(|entry| entry.file_size()).sum();
        (total, downloaded)
    }

    /// One eviction pass: delete least-recently-requested archives until the
    /// aggregate size fits `max_size`. Evicted entries stay registered and
    /// re-download on the next acquisition.
    pub async fn cleanup_once(&self) {
        let (mut total, mut candidates) = self.downloaded_entries();
        if total <= self.max_size {
            return;
        }
        tracing::info!(
            total_bytes = total,
            max_bytes = self.max_size,
            "cache over its size limit, evicting"
        );

        candidates.sort_by(|a, b| {
            a.last_requested()
                .cmp(&b.last_requested())
                .then(a.id().cmp(&b.id()))
        });

        for entry in candidates {
            if total <= self.max_size {
                break;
            }
            let size = entry.file_size();
            if let Some(path) = entry.existing_path().await {
                if let Err(error) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(id = entry.id(), %error, "failed to evict archive");
                    continue;
                }
            }
            entry.mark_evicted();
            total = total.saturating_sub(size);
            tracing::info!(id = entry.id(), freed = size, "evicted archive");
        }
    }

    /// Run the cleaner until the process exits: wakes on the cleanup signal
    /// and on a periodic tick, coalescing simultaneous triggers into one pass.
    pub fn spawn_cleaner(self: &Arc<Self>) -> JoinHandle<()> {
        let house = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(CLEANER_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = house.cleanup.wait() => {}
                    _ = tick.tick() => {}
                }
                house.cleanup_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn ts(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(secs).unwrap()
    }

    fn request(id: i64, last_update: OffsetDateTime) -> AcquireRequest {
        AcquireRequest {
            id,
            no_video: true,
            last_update,
        }
    }

    async fn write_file(dir: &std::path::Path, name: &str, contents: &[u8]) {
        let mut file = tokio::fs::File::create(dir.join(name)).await.unwrap();
        file.write_all(contents).await.unwrap();
    }

    #[tokio::test]
    async fn fresh_acquire_obliges_download() {
        let dir = tempfile::tempdir().unwrap();
        let house = House::new(vec![dir.path().to_path_buf()], 10.0);

        let (entry, must_download) = house.acquire(request(12345, ts(100)));
        assert!(must_download);
        assert!(!entry.is_downloaded());
        assert_eq!(house.len(), 1);

        entry.download_completed(1_048_576);
        let (entry, must_download) = house.acquire(request(12345, ts(100)));
        assert!(!must_download);
        assert_eq!(entry.file_size(), 1_048_576);
        assert_eq!(house.len(), 1);
    }

    #[tokio::test]
    async fn stale_entry_rearms_latch() {
        let dir = tempfile::tempdir().unwrap();
        let house = House::new(vec![dir.path().to_path_buf()], 10.0);

        let (entry, _) = house.acquire(request(12345, ts(100)));
        entry.download_completed(512);

        let (entry, must_download) = house.acquire(request(12345, ts(200)));
        assert!(must_download);
        assert_eq!(entry.last_update(), ts(200));

        // A third acquirer with the same timestamp waits for the re-download.
        let (waiter, must_download) = house.acquire(request(12345, ts(200)));
        assert!(!must_download);

        let waited = tokio::spawn({
            let waiter = Arc::clone(&waiter);
            async move {
                waiter.wait_downloaded().await;
                waiter.file_size()
            }
        });
        tokio::task::yield_now().await;
        assert!(!waited.is_finished());

        entry.download_completed(2048);
        assert_eq!(waited.await.unwrap(), 2048);
    }

    #[tokio::test]
    async fn concurrent_acquires_grant_one_obligation() {
        let dir = tempfile::tempdir().unwrap();
        let house = House::new(vec![dir.path().to_path_buf()], 10.0);

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let house = Arc::clone(&house);
            tasks.push(tokio::spawn(async move {
                let (_, must_download) = house.acquire(request(777, ts(50)));
                must_download
            }));
        }
        let mut grants = 0;
        for task in tasks {
            if task.await.unwrap() {
                grants += 1;
            }
        }
        assert_eq!(grants, 1);
        assert_eq!(house.len(), 1);
    }

    #[tokio::test]
    async fn distinct_no_video_entries_coexist() {
        let dir = tempfile::tempdir().unwrap();
        let house = House::new(vec![dir.path().to_path_buf()], 10.0);

        let (_, first) = house.acquire(AcquireRequest {
            id: 5,
            no_video: true,
            last_update: ts(10),
        });
        let (_, second) = house.acquire(AcquireRequest {
            id: 5,
            no_video: false,
            last_update: ts(10),
        });
        assert!(first);
        assert!(second);
        assert_eq!(house.len(), 2);
    }

    #[tokio::test]
    async fn zero_byte_completion_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let house = House::new(vec![dir.path().to_path_buf()], 10.0);

        let (entry, _) = house.acquire(request(66, ts(10)));
        entry.download_completed(0);

        entry.wait_downloaded().await;
        assert!(!entry.is_downloaded());
        assert_eq!(entry.file_size(), 0);
    }

    #[tokio::test]
    async fn wait_returns_after_failed_download() {
        let dir = tempfile::tempdir().unwrap();
        let house = House::new(vec![dir.path().to_path_buf()], 10.0);

        let (entry, must_download) = house.acquire(request(999, ts(10)));
        assert!(must_download);
        entry.not_downloaded().await;

        // Latch released by the failure: waiting returns immediately.
        entry.wait_downloaded().await;
        assert!(!entry.is_downloaded());
        assert_eq!(entry.file_size(), 0);
    }

    #[tokio::test]
    async fn first_volume_wins_reads_last_volume_takes_writes() {
        let first = tempfile::tempdir().unwrap();
        let last = tempfile::tempdir().unwrap();
        let house = House::new(
            vec![first.path().to_path_buf(), last.path().to_path_buf()],
            10.0,
        );

        let (entry, _) = house.acquire(request(42, ts(1)));
        write_file(first.path(), "42.osz", b"from-first").await;

        let path = entry.existing_path().await.unwrap();
        assert!(path.starts_with(first.path()));

        assert_eq!(entry.write_path().unwrap(), last.path().join("42.osz"));
        entry.create().await.unwrap();
        assert!(last.path().join("42.osz").exists());
    }

    #[tokio::test]
    async fn eviction_is_lru_and_respects_bound() {
        let dir = tempfile::tempdir().unwrap();
        const MIB: u64 = 1024 * 1024;
        let house = House::with_max_size(vec![dir.path().to_path_buf()], 10 * MIB, 0);

        for (id, requested) in [(1, 100), (2, 200), (3, 300)] {
            let (entry, _) = house.acquire(request(id, ts(1)));
            write_file(dir.path(), &format!("{id}.osz"), b"PK\x03\x04 body").await;
            entry.download_completed(4 * MIB);
            entry.set_last_requested(ts(requested));
        }
        assert_eq!(house.cache_size(), 12 * MIB);

        house.cleanup_once().await;

        assert_eq!(house.cache_size(), 8 * MIB);
        assert!(!dir.path().join("1.osz").exists());
        assert!(dir.path().join("2.osz").exists());
        assert!(dir.path().join("3.osz").exists());

        // Entries stay registered; the evicted one re-downloads on acquire.
        assert_eq!(house.len(), 3);
        let (_, must_download) = house.acquire(request(1, ts(1)));
        assert!(!must_download, "equal timestamp does not re-oblige");
    }

    #[tokio::test]
    async fn eviction_tie_breaks_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let house = House::with_max_size(vec![dir.path().to_path_buf()], 100, 0);

        for id in [9, 4] {
            let (entry, _) = house.acquire(request(id, ts(1)));
            write_file(dir.path(), &format!("{id}.osz"), b"PK\x03\x04 body").await;
            entry.download_completed(80);
            entry.set_last_requested(ts(500));
        }

        house.cleanup_once().await;
        assert!(!dir.path().join("4.osz").exists());
        assert!(dir.path().join("9.osz").exists());
    }

    #[tokio::test]
    async fn load_state_skips_malformed_names() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "123.osz", &[0u8; 150]).await;
        write_file(dir.path(), "not-a-number.osz", b"junk").await;
        write_file(dir.path(), "12x.osz", b"junk").await;
        write_file(dir.path(), "readme.txt", b"hello").await;

        let house = House::new(vec![dir.path().to_path_buf()], 10.0);
        assert_eq!(house.load_state().await.unwrap(), 1);

        let (entry, must_download) = house.acquire(request(123, OffsetDateTime::UNIX_EPOCH));
        assert!(!must_download);
        assert!(entry.is_downloaded());
        assert_eq!(entry.file_size(), 150);

        // Any real catalog timestamp forces a conservative re-download.
        let (_, must_download) = house.acquire(request(123, ts(1)));
        assert!(must_download);
    }

    #[tokio::test]
    async fn load_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "1.osz", &[0u8; 200]).await;
        write_file(dir.path(), "2.osz", &[0u8; 300]).await;

        let house = House::new(vec![dir.path().to_path_buf()], 10.0);
        house.load_state().await.unwrap();
        assert_eq!(house.len(), 2);
        assert_eq!(house.cache_size(), 500);

        let restarted = House::new(vec![dir.path().to_path_buf()], 10.0);
        restarted.load_state().await.unwrap();
        assert_eq!(restarted.len(), 2);
        assert_eq!(restarted.cache_size(), 500);
    }

    #[tokio::test]
    async fn load_state_first_volume_wins_duplicates() {
        let first = tempfile::tempdir().unwrap();
        let last = tempfile::tempdir().unwrap();
        write_file(first.path(), "7.osz", &[0u8; 111]).await;
        write_file(last.path(), "7.osz", &[0u8; 999]).await;

        let house = House::new(
            vec![first.path().to_path_buf(), last.path().to_path_buf()],
            10.0,
        );
        assert_eq!(house.load_state().await.unwrap(), 1);
        assert_eq!(house.cache_size(), 111);
    }

    #[tokio::test]
    async fn remove_non_zip_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "1.osz", b"PK\x03\x04rest-of-archive").await;
        write_file(dir.path(), "2.osz", b"<html>login page</html>").await;
        write_file(dir.path(), "3.osz", b"PK").await;

        let house = House::new(vec![dir.path().to_path_buf()], 10.0);
        assert_eq!(house.remove_non_zip().await.unwrap(), 2);
        assert!(dir.path().join("1.osz").exists());
        assert!(!dir.path().join("2.osz").exists());
        assert!(!dir.path().join("3.osz").exists());

        assert_eq!(house.remove_non_zip().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cleaner_task_wakes_on_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let house = House::with_max_size(vec![dir.path().to_path_buf()], 100, 0);

        let (entry, _) = house.acquire(request(31, ts(1)));
        write_file(dir.path(), "31.osz", b"PK\x03\x04 body").await;
        entry.download_completed(400);

        let cleaner = house.spawn_cleaner();
        house.schedule_cleanup();

        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while house.cache_size() > 100 {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("cleaner never ran");
        assert!(!dir.path().join("31.osz").exists());
        cleaner.abort();
    }

    #[tokio::test]
    async fn failed_download_sweeps_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let house = House::new(vec![dir.path().to_path_buf()], 10.0);

        let (entry, _) = house.acquire(request(55, ts(10)));
        write_file(dir.path(), "55.osz", &[0u8; 40]).await;

        entry.not_downloaded().await;
        assert!(!dir.path().join("55.osz").exists());
    }
}
