//! Data model and read paths of the beatmap catalog.
//!
//! Sets and beatmaps are written by an external crawler; this crate only
//! reads them. The search composer combines the full-text engine (a second
//! MySQL-protocol endpoint) with the relational store, preserving the
//! engine's rank order.

mod beatmap;
mod error;
mod search;
mod set;
mod view;

pub use beatmap::{Beatmap, fetch_beatmaps, fetch_beatmaps_by_md5};
pub use error::{ModelError, ModelResult};
pub use search::{
    DEFAULT_AMOUNT, MAX_AMOUNT, SearchOptions, escape_fulltext, search_sets,
};
pub use set::{Set, biggest_set_id, count_sets, fetch_set, fetch_set_by_md5};
pub use view::{BeatmapView, SetView};
