//! The two-stage search composer.
//!
//! With a text query, the full-text engine picks and ranks candidate set IDs
//! first; the relational store then hydrates those rows and the results are
//! put back into rank order. Without a text query the relational store is
//! queried directly, newest updates first. Filters on child difficulties
//! become a correlated `EXISTS` so they constrain both branches identically.

use std::collections::HashMap;
use std::fmt::Write as _;

use sqlx::MySqlPool;

use crate::beatmap::{BEATMAP_FIELDS, Beatmap};
use crate::error::ModelResult;
use crate::set::{SET_FIELDS, Set};

/// Hard cap on the page size.
pub const MAX_AMOUNT: u32 = 100;

/// Page size used when the caller does not give one.
pub const DEFAULT_AMOUNT: u32 = 50;

/// Search filters. Empty vectors mean "all"; `None` bounds are not applied.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Accepted ranked-status values (−2..4).
    pub status: Vec<i32>,
    /// Accepted mode bits (0..3). The set must support every requested mode.
    pub mode: Vec<u8>,
    /// Free-text query; empty skips the full-text engine.
    pub query: String,

    pub offset: u32,
    pub amount: u32,

    pub min_ar: Option<f32>,
    pub max_ar: Option<f32>,
    pub min_od: Option<f32>,
    pub max_od: Option<f32>,
    pub min_cs: Option<f32>,
    pub max_cs: Option<f32>,
    pub min_hp: Option<f32>,
    pub max_hp: Option<f32>,
    pub min_difficulty: Option<f64>,
    pub max_difficulty: Option<f64>,
    pub min_length: Option<i64>,
    pub max_length: Option<i64>,
    pub min_bpm: Option<f64>,
    pub max_bpm: Option<f64>,

    /// Set-level filters; the catalog uses zero for "unspecified", so zero
    /// never filters.
    pub genre: Option<i32>,
    pub language: Option<i32>,
}

impl SearchOptions {
    /// Bitmask over the requested modes: bit `m` for mode `m`.
    pub fn set_modes_mask(&self) -> u8 {
        self.mode
            .iter()
            .filter(|&&m| m < 4)
            .fold(0, |mask, &m| mask | 1 << m)
    }

    fn page(&self) -> (u32, u32) {
        let amount = match self.amount {
            0 => DEFAULT_AMOUNT,
            n => n.min(MAX_AMOUNT),
        };
        (self.offset, amount)
    }

    /// Predicates over columns of `sets`.
    fn set_conditions(&self) -> Vec<String> {
        let mut conds = Vec::new();
        if !self.status.is_empty() {
            conds.push(format!(
                "sets.ranked_status IN ({})",
                comma_separated(&self.status)
            ));
        }
        if let Some(genre) = self.genre {
            conds.push(format!("sets.genre = {genre}"));
        }
        if let Some(language) = self.language {
            conds.push(format!("sets.language = {language}"));
        }
        conds
    }

    /// Range predicates over columns of `beatmaps`.
    fn beatmap_conditions(&self) -> Vec<String> {
        let mut conds = Vec::new();
        let mut range = |column: &str, min: Option<f64>, max: Option<f64>| {
            if let Some(min) = min {
                conds.push(format!("beatmaps.{column} >= {min}"));
            }
            if let Some(max) = max {
                conds.push(format!("beatmaps.{column} <= {max}"));
            }
        };
        range("ar", self.min_ar.map(f64::from), self.max_ar.map(f64::from));
        range("od", self.min_od.map(f64::from), self.max_od.map(f64::from));
        range("cs", self.min_cs.map(f64::from), self.max_cs.map(f64::from));
        range("hp", self.min_hp.map(f64::from), self.max_hp.map(f64::from));
        range("difficulty_rating", self.min_difficulty, self.max_difficulty);
        range(
            "total_length",
            self.min_length.map(|v| v as f64),
            self.max_length.map(|v| v as f64),
        );
        range("bpm", self.min_bpm, self.max_bpm);
        conds
    }

    /// Correlated existence predicate attaching the beatmap ranges to a set.
    fn exists_clause(&self) -> Option<String> {
        let conds = self.beatmap_conditions();
        if conds.is_empty() {
            return None;
        }
        Some(format!(
            "EXISTS (SELECT 1 FROM beatmaps WHERE beatmaps.parent_set_id = sets.id AND {})",
            conds.join(" AND ")
        ))
    }

    /// The full-text engine statement. The engine takes no bind parameters,
    /// so the query text goes through [`escape_fulltext`]; set-level
    /// predicates are repeated with the `sets.` qualifier stripped.
    fn fulltext_query(&self, mask: u8) -> String {
        let (offset, amount) = self.page();
        let mut sql = format!(
            "SELECT id, set_modes & {mask} AS valid_set_modes FROM cg WHERE MATCH('{}')",
            escape_fulltext(&self.query)
        );
        for cond in self.set_conditions() {
            let _ = write!(sql, " AND {}", cond.replace("sets.", ""));
        }
        if !self.mode.is_empty() {
            let _ = write!(sql, " AND valid_set_modes = {mask}");
        }
        let _ = write!(
            sql,
            " ORDER BY WEIGHT() DESC, id DESC LIMIT {offset}, {amount} \
             OPTION ranker=sph04, max_matches=20000"
        );
        sql
    }
}

/// Escape a free-text query for the full-text engine, which does not accept
/// parameterized statements. Backslash, both quotes, NUL, CR, LF and SUB are
/// backslash-escaped.
pub fn escape_fulltext(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        match c {
            '\\' => escaped.push_str(r"\\"),
            '\'' => escaped.push_str(r"\'"),
            '"' => escaped.push_str("\\\""),
            '\0' => escaped.push_str(r"\0"),
            '\n' => escaped.push_str(r"\n"),
            '\r' => escaped.push_str(r"\r"),
            '\x1a' => escaped.push_str(r"\Z"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn comma_separated<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Place hydrated rows back into full-text rank order. Rows the engine never
/// ranked (the non-text branch) keep their relational order and are appended.
fn rank_ordered(rows: Vec<Set>, positions: &HashMap<i64, usize>, ranked: usize) -> Vec<Set> {
    let mut slots: Vec<Option<Set>> = Vec::new();
    slots.resize_with(ranked, || None);
    let mut extras = Vec::new();
    for set in rows {
        match positions.get(&set.id) {
            Some(&pos) => slots[pos] = Some(set),
            None => extras.push(set),
        }
    }
    // A candidate deleted between the two queries simply drops out.
    slots.into_iter().flatten().chain(extras).collect()
}

/// Run a search and return fully hydrated sets, children attached.
pub async fn search_sets(
    db: &MySqlPool,
    search_db: &MySqlPool,
    opts: &SearchOptions,
) -> ModelResult<Vec<Set>> {
    let mask = opts.set_modes_mask();
    let (offset, amount) = opts.page();

    let mut where_conds = opts.set_conditions();
    let mut having = if opts.mode.is_empty() {
        None
    } else {
        Some(format!("valid_set_modes = {mask}"))
    };
    let mut limit = Some(format!("LIMIT {offset}, {amount}"));

    let mut positions: HashMap<i64, usize> = HashMap::new();
    if !opts.query.is_empty() {
        let fulltext = opts.fulltext_query(mask);
        tracing::debug!(query = %fulltext, "ranking candidates");
        let ranked: Vec<i64> = sqlx::query_scalar(&fulltext).fetch_all(search_db).await?;
        if ranked.is_empty() {
            return Ok(Vec::new());
        }
        positions = ranked
            .iter()
            .enumerate()
            .map(|(pos, &id)| (id, pos))
            .collect();
        // Ranking, paging and the mode filter already happened in the
        // engine; hydration only restricts to the candidates.
        where_conds = vec![format!("sets.id IN ({})", comma_separated(&ranked))];
        having = None;
        limit = None;
    }

    if let Some(exists) = opts.exists_clause() {
        where_conds.push(exists);
    }

    let mut sql = format!(
        "SELECT {SET_FIELDS}, sets.set_modes & {mask} AS valid_set_modes FROM sets"
    );
    if !where_conds.is_empty() {
        let _ = write!(sql, " WHERE {}", where_conds.join(" AND "));
    }
    if let Some(having) = having {
        let _ = write!(sql, " HAVING {having}");
    }
    sql.push_str(" ORDER BY last_update DESC");
    if let Some(limit) = limit {
        let _ = write!(sql, " {limit}");
    }

    let ranked = positions.len();
    tracing::debug!(query = %sql, "hydrating sets");
    let rows: Vec<Set> = sqlx::query_as(&sql).fetch_all(db).await?;
    let mut sets = rank_ordered(rows, &positions, ranked);
    if sets.is_empty() {
        return Ok(sets);
    }

    attach_children(db, &mut sets).await?;
    Ok(sets)
}

/// One query over all hydrated sets, each child appended to its parent.
async fn attach_children(db: &MySqlPool, sets: &mut [Set]) -> ModelResult<()> {
    let ids: Vec<i64> = sets.iter().map(|set| set.id).collect();
    let index: HashMap<i64, usize> = ids
        .iter()
        .enumerate()
        .map(|(pos, &id)| (id, pos))
        .collect();

    let query = format!(
        "SELECT {BEATMAP_FIELDS} FROM beatmaps WHERE beatmaps.parent_set_id IN ({})",
        comma_separated(&ids)
    );
    let children: Vec<Beatmap> = sqlx::query_as(&query).fetch_all(db).await?;
    for child in children {
        if let Some(&pos) = index.get(&child.parent_set_id) {
            sets[pos].children_beatmaps.push(child);
        }
    }
    Ok(())
}
