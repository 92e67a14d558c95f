//! Query/path parameter parsing.
//!
//! Search parameters arrive as raw key/value pairs so repeated keys
//! (`status`, `mode`) accumulate and a literally absent bound is
//! distinguishable from one sent as zero.

use ricotta_models::SearchOptions;

/// Ceiling for the length bounds, in seconds. Lengths are seconds-sized, so
/// the ceiling is a day rather than the 0..10 range the other attributes use.
pub const LENGTH_BOUND_MAX: i64 = 86_400;

/// Strip the optional `.json` suffix route parameters accept.
pub fn strip_json_suffix(raw: &str) -> &str {
    raw.strip_suffix(".json").unwrap_or(raw)
}

/// Parse a path id, tolerating the `.json` suffix. Zero and garbage are both
/// "no such id".
pub fn parse_id(raw: &str) -> Option<i64> {
    match strip_json_suffix(raw).parse::<i64>() {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(id),
    }
}

pub(crate) fn first<'p>(pairs: &'p [(String, String)], key: &str) -> Option<&'p str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Repeated integer parameter, values outside `min..=max` skipped.
fn bounded_list(pairs: &[(String, String)], key: &str, min: i64, max: i64) -> Vec<i64> {
    pairs
        .iter()
        .filter(|(k, _)| k == key)
        .filter_map(|(_, v)| v.parse::<i64>().ok())
        .filter(|v| (min..=max).contains(v))
        .collect()
}

/// Absent or unparseable → `None`; otherwise the value clamped into range.
fn float_bound(pairs: &[(String, String)], key: &str, min: f64, max: f64) -> Option<f64> {
    first(pairs, key)?
        .parse::<f64>()
        .ok()
        .map(|v| v.clamp(min, max))
}

fn int_bound(pairs: &[(String, String)], key: &str, min: i64, max: i64) -> Option<i64> {
    first(pairs, key)?
        .parse::<i64>()
        .ok()
        .map(|v| v.clamp(min, max))
}

/// Set-level filter where the catalog uses zero for "unspecified": only
/// positive values filter.
fn positive_filter(pairs: &[(String, String)], key: &str) -> Option<i32> {
    first(pairs, key)?
        .parse::<i32>()
        .ok()
        .filter(|v| *v > 0)
}

/// Build [`SearchOptions`] from query pairs. The extended variant
/// additionally reads the per-attribute range bounds.
pub fn parse_search(pairs: &[(String, String)], extended: bool) -> SearchOptions {
    let amount = first(pairs, "amount")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    let amount = match amount {
        0 => ricotta_models::DEFAULT_AMOUNT,
        n => n.clamp(1, ricotta_models::MAX_AMOUNT as i64) as u32,
    };
    let offset = first(pairs, "offset")
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0)
        .max(0) as u32;

    let mut opts = SearchOptions {
        status: bounded_list(pairs, "status", -2, 4)
            .into_iter()
            .map(|v| v as i32)
            .collect(),
        mode: bounded_list(pairs, "mode", 0, 3)
            .into_iter()
            .map(|v| v as u8)
            .collect(),
        query: first(pairs, "query").unwrap_or_default().to_string(),
        offset,
        amount,
        ..Default::default()
    };

    if extended {
        let f32_bound = |key| float_bound(pairs, key, 0.0, 10.0).map(|v| v as f32);
        opts.min_ar = f32_bound("min_ar");
        opts.max_ar = f32_bound("max_ar");
        opts.min_od = f32_bound("min_od");
        opts.max_od = f32_bound("max_od");
        opts.min_cs = f32_bound("min_cs");
        opts.max_cs = f32_bound("max_cs");
        opts.min_hp = f32_bound("min_hp");
        opts.max_hp = f32_bound("max_hp");
        opts.min_difficulty = float_bound(pairs, "min_diff", 0.0, 10.0);
        opts.max_difficulty = float_bound(pairs, "max_diff", 0.0, 10.0);
        opts.min_length = int_bound(pairs, "min_length", 0, LENGTH_BOUND_MAX);
        opts.max_length = int_bound(pairs, "max_length", 0, LENGTH_BOUND_MAX);
        opts.min_bpm = float_bound(pairs, "min_bpm", 0.0, 999.0);
        opts.max_bpm = float_bound(pairs, "max_bpm", 0.0, 999.0);
        opts.genre = positive_filter(pairs, "genre");
        opts.language = positive_filter(pairs, "language");
    }

    opts
}
