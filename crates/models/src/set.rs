//! Set records and their read paths.

use serde::Serialize;
use sqlx::MySqlPool;
use time::OffsetDateTime;

use crate::beatmap::{BEATMAP_FIELDS, Beatmap};
use crate::error::ModelResult;

/// Columns selected for every set read, in scan order.
pub(crate) const SET_FIELDS: &str = "\
sets.id, sets.ranked_status, sets.approved_date, sets.last_update, sets.last_checked, \
sets.artist, sets.title, sets.creator, sets.source, sets.tags, sets.has_video, sets.genre, \
sets.language, sets.favourites, sets.set_modes";

/// A bundle of difficulties published together.
///
/// Created and mutated by the external crawler; read-only here.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "PascalCase")]
pub struct Set {
    #[serde(rename = "SetID")]
    pub id: i64,
    #[sqlx(skip)]
    pub children_beatmaps: Vec<Beatmap>,
    pub ranked_status: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub approved_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_update: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_checked: OffsetDateTime,
    pub artist: String,
    pub title: String,
    pub creator: String,
    pub source: String,
    pub tags: String,
    pub has_video: bool,
    pub genre: i32,
    pub language: i32,
    pub favourites: i64,
    /// Bitmask over the modes of the children, bit `m` for mode `m`.
    pub set_modes: i32,
}

/// Fetch a single set, optionally with its child difficulties.
pub async fn fetch_set(db: &MySqlPool, id: i64, with_children: bool) -> ModelResult<Option<Set>> {
    let query = format!("SELECT {SET_FIELDS} FROM sets WHERE sets.id = ?");
    let set: Option<Set> = sqlx::query_as(&query).bind(id).fetch_optional(db).await?;
    let Some(mut set) = set else {
        return Ok(None);
    };
    if with_children {
        set.children_beatmaps = fetch_children(db, set.id).await?;
    }
    Ok(Some(set))
}

/// Fetch the set owning the beatmap whose archive file hashes to `md5`.
pub async fn fetch_set_by_md5(
    db: &MySqlPool,
    md5: &str,
    with_children: bool,
) -> ModelResult<Option<Set>> {
    let beatmaps = crate::beatmap::fetch_beatmaps_by_md5(db, md5).await?;
    let Some(parent_set_id) = beatmaps.first().map(|b| b.parent_set_id) else {
        return Ok(None);
    };
    fetch_set(db, parent_set_id, with_children).await
}

pub(crate) async fn fetch_children(db: &MySqlPool, set_id: i64) -> ModelResult<Vec<Beatmap>> {
    let query = format!("SELECT {BEATMAP_FIELDS} FROM beatmaps WHERE beatmaps.parent_set_id = ?");
    Ok(sqlx::query_as(&query).bind(set_id).fetch_all(db).await?)
}

/// Largest set ID currently stored; zero when the catalog is empty.
pub async fn biggest_set_id(db: &MySqlPool) -> ModelResult<i64> {
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM sets")
        .fetch_one(db)
        .await?;
    Ok(max.unwrap_or(0))
}

/// Total number of sets in the catalog.
pub async fn count_sets(db: &MySqlPool) -> ModelResult<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM sets")
        .fetch_one(db)
        .await?)
}

/// A fully populated set for tests across the crate.
#[cfg(test)]
pub(crate) fn sample_set() -> Set {
    use time::macros::datetime;

    Set {
        id: 320118,
        children_beatmaps: Vec::new(),
        ranked_status: 1,
        approved_date: datetime!(2015-08-01 12:00:00 UTC),
        last_update: datetime!(2015-07-01 09:30:00 UTC),
        last_checked: datetime!(2020-01-01 00:00:00 UTC),
        artist: "Akiakane".to_string(),
        title: "FLOWER".to_string(),
        creator: "Shad0w1and".to_string(),
        source: String::new(),
        tags: "electronic".to_string(),
        has_video: false,
        genre: 2,
        language: 3,
        favourites: 120,
        set_modes: 0b1001,
    }
}
