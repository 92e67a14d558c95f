//! Single-difficulty records and their read paths.

use serde::Serialize;
use sqlx::MySqlPool;

use crate::error::ModelResult;

/// Columns selected for every beatmap read, in scan order.
pub(crate) const BEATMAP_FIELDS: &str = "\
beatmaps.id, beatmaps.parent_set_id, beatmaps.diff_name, beatmaps.file_md5, beatmaps.mode, beatmaps.bpm, \
beatmaps.ar, beatmaps.od, beatmaps.cs, beatmaps.hp, beatmaps.total_length, beatmaps.hit_length, \
beatmaps.playcount, beatmaps.passcount, beatmaps.max_combo, beatmaps.difficulty_rating";

/// One playable difficulty within a set.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "PascalCase")]
pub struct Beatmap {
    #[serde(rename = "BeatmapID")]
    pub id: i64,
    #[serde(rename = "ParentSetID")]
    pub parent_set_id: i64,
    pub diff_name: String,
    #[serde(rename = "FileMD5")]
    pub file_md5: String,
    pub mode: i32,
    #[serde(rename = "BPM")]
    pub bpm: f64,
    #[serde(rename = "AR")]
    pub ar: f32,
    #[serde(rename = "OD")]
    pub od: f32,
    #[serde(rename = "CS")]
    pub cs: f32,
    #[serde(rename = "HP")]
    pub hp: f32,
    pub total_length: i64,
    pub hit_length: i64,
    pub playcount: i64,
    pub passcount: i64,
    pub max_combo: i64,
    pub difficulty_rating: f64,
}

/// `?, ?, …` placeholder list for an `IN` clause of `len` values.
pub(crate) fn in_placeholders(len: usize) -> String {
    vec!["?"; len].join(", ")
}

/// Fetch beatmaps by their IDs. Unknown IDs are silently absent.
pub async fn fetch_beatmaps(db: &MySqlPool, ids: &[i64]) -> ModelResult<Vec<Beatmap>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let query = format!(
        "SELECT {BEATMAP_FIELDS} FROM beatmaps WHERE beatmaps.id IN ({})",
        in_placeholders(ids.len())
    );
    let mut q = sqlx::query_as::<_, Beatmap>(&query);
    for id in ids {
        q = q.bind(id);
    }
    Ok(q.fetch_all(db).await?)
}

/// Fetch every beatmap whose archive file hashes to `md5`. Duplicated
/// difficulties can make this more than one row.
pub async fn fetch_beatmaps_by_md5(db: &MySqlPool, md5: &str) -> ModelResult<Vec<Beatmap>> {
    if md5.is_empty() {
        return Ok(Vec::new());
    }
    let query = format!("SELECT {BEATMAP_FIELDS} FROM beatmaps WHERE beatmaps.file_md5 = ?");
    Ok(sqlx::query_as(&query).bind(md5).fetch_all(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_placeholders_shape() {
        assert_eq!(in_placeholders(1), "?");
        assert_eq!(in_placeholders(3), "?, ?, ?");
    }

    #[test]
    fn json_shape_matches_native_api() {
        let beatmap = Beatmap {
            id: 42,
            parent_set_id: 7,
            diff_name: "Insane".to_string(),
            file_md5: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            mode: 0,
            bpm: 180.0,
            ar: 9.0,
            od: 8.5,
            cs: 4.0,
            hp: 6.0,
            total_length: 215,
            hit_length: 200,
            playcount: 1000,
            passcount: 300,
            max_combo: 1234,
            difficulty_rating: 5.67,
        };
        let json = serde_json::to_value(&beatmap).unwrap();
        assert_eq!(json["BeatmapID"], 42);
        assert_eq!(json["ParentSetID"], 7);
        assert_eq!(json["FileMD5"], "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(json["DiffName"], "Insane");
        assert_eq!(json["BPM"], 180.0);
        assert_eq!(json["AR"], 9.0);
        assert_eq!(json["TotalLength"], 215);
        assert_eq!(json["DifficultyRating"], 5.67);
    }
}
