//! On-disk cache of beatmap archives.
//!
//! The housekeeper owns a process-local registry of `.osz` archives spread
//! over one or more data volumes. It hands out [`CachedBeatmap`] entries with
//! a single-flight download obligation, enforces an aggregate size bound by
//! evicting the least recently requested archives, and rebuilds its state
//! from the volumes on startup.

pub mod beatmap;
pub mod house;

pub use beatmap::{CachedBeatmap, CleanupSignal};
pub use house::{AcquireRequest, House};

/// First four bytes of every ZIP container.
pub const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// Cached files below this size are corrupt placeholders, not archives.
pub const MIN_ARCHIVE_SIZE: u64 = 100;
