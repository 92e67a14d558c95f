//! Serialization views for the `/api/v1` compatibility family.
//!
//! Same canonical model, different field casing plus two derived
//! conveniences (`OsuFile`, `DownloadPath`). The views are built from
//! [`Set`]/[`Beatmap`] and never fetched separately.

use serde::Serialize;
use time::OffsetDateTime;

use crate::beatmap::Beatmap;
use crate::set::Set;

/// Compat shape of a single difficulty.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BeatmapView {
    #[serde(rename = "BeatmapId")]
    pub id: i64,
    #[serde(rename = "ParentSetId")]
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
    pub osu_file: String,
    pub download_path: String,
}

impl BeatmapView {
    /// Build the view; the parent set supplies the naming pieces of
    /// `OsuFile`.
    pub fn from_parts(beatmap: Beatmap, artist: &str, title: &str, creator: &str) -> Self {
        let osu_file = format!("{artist} - {title} ({creator}) [{}].osu", beatmap.diff_name);
        let download_path = format!("/d/{}", beatmap.parent_set_id);
        Self {
            id: beatmap.id,
            parent_set_id: beatmap.parent_set_id,
            diff_name: beatmap.diff_name,
            file_md5: beatmap.file_md5,
            mode: beatmap.mode,
            bpm: beatmap.bpm,
            ar: beatmap.ar,
            od: beatmap.od,
            cs: beatmap.cs,
            hp: beatmap.hp,
            total_length: beatmap.total_length,
            hit_length: beatmap.hit_length,
            playcount: beatmap.playcount,
            passcount: beatmap.passcount,
            max_combo: beatmap.max_combo,
            difficulty_rating: beatmap.difficulty_rating,
            osu_file,
            download_path,
        }
    }
}

/// Compat shape of a set with its children.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetView {
    #[serde(rename = "SetId")]
    pub id: i64,
    pub children_beatmaps: Vec<BeatmapView>,
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
}

impl From<Set> for SetView {
    fn from(set: Set) -> Self {
        let children_beatmaps = set
            .children_beatmaps
            .into_iter()
            .map(|child| BeatmapView::from_parts(child, &set.artist, &set.title, &set.creator))
            .collect();
        Self {
            id: set.id,
            children_beatmaps,
            ranked_status: set.ranked_status,
            approved_date: set.approved_date,
            last_update: set.last_update,
            last_checked: set.last_checked,
            artist: set.artist,
            title: set.title,
            creator: set.creator,
            source: set.source,
            tags: set.tags,
            has_video: set.has_video,
            genre: set.genre,
            language: set.language,
            favourites: set.favourites,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_beatmap() -> Beatmap {
        Beatmap {
            id: 11,
            parent_set_id: 320118,
            diff_name: "Extra".to_string(),
            file_md5: "abc".to_string(),
            mode: 0,
            bpm: 200.0,
            ar: 9.3,
            od: 9.0,
            cs: 4.2,
            hp: 5.0,
            total_length: 180,
            hit_length: 170,
            playcount: 10,
            passcount: 2,
            max_combo: 900,
            difficulty_rating: 6.1,
        }
    }

    #[test]
    fn derived_fields_follow_the_compat_format() {
        let view = BeatmapView::from_parts(sample_beatmap(), "Akiakane", "FLOWER", "Shad0w1and");
        assert_eq!(view.osu_file, "Akiakane - FLOWER (Shad0w1and) [Extra].osu");
        assert_eq!(view.download_path, "/d/320118");
    }

    #[test]
    fn compat_json_uses_compat_casing() {
        let mut set = crate::set::sample_set();
        set.children_beatmaps.push(sample_beatmap());
        let json = serde_json::to_value(SetView::from(set)).unwrap();
        assert_eq!(json["SetId"], 320118);
        assert!(json.get("SetID").is_none());
        assert!(json.get("SetModes").is_none());

        let child = &json["ChildrenBeatmaps"][0];
        assert_eq!(child["BeatmapId"], 11);
        assert_eq!(child["ParentSetId"], 320118);
        assert_eq!(child["OsuFile"], "Akiakane - FLOWER (Shad0w1and) [Extra].osu");
        assert_eq!(child["DownloadPath"], "/d/320118");
    }
}
