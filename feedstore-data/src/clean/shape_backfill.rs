//! Backfill of missing trip `shape_id` values.
//!
//! Some feeds ship `shapes.txt` but leave `trips.shape_id` empty. The shape
//! is recoverable from the tail of the trip id: characters from the 21st
//! onward form a fuzzy key. A shape whose id equals the key is a strong
//! match; a shape sharing the key's first four characters is a weak match.
//! Within a tier the shape with the most points wins, then the smallest id.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use log::{info, warn};
use rusqlite::{Connection, params};

use super::{CleanupError, RuleReport};
use crate::import::codec::quote_identifier;
use crate::store::{count_query, count_rows, mark_cleaned, table_columns, table_exists};

pub(super) const RULE: &str = "shape-backfill";

const TRIPS: &str = "trips";
const FUZZY_OFFSET: usize = 20;
const WEAK_PREFIX: usize = 4;
const DEFECT_FILTER: &str = "shape_id IS NULL OR shape_id = ''";

/// Confidence of a chosen candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Tier {
    Strong,
    Weak,
}

impl Tier {
    /// Tag written to `x_clean`.
    const fn tag(self) -> &'static str {
        match self {
            Self::Strong => "shape_id_fix_strong_match",
            Self::Weak => "shape_id_fix_weak_match",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Candidate {
    pub(super) shape_id: String,
    pub(super) points: u64,
}

pub(super) fn fuzzy_key(trip_id: &str) -> String {
    trip_id.chars().skip(FUZZY_OFFSET).collect()
}

fn prefix(text: &str) -> String {
    text.chars().take(WEAK_PREFIX).collect()
}

/// Pick the best candidate for `key` from `candidates`, which must already be
/// ranked by descending point count then ascending id.
pub(super) fn choose<'a>(key: &str, candidates: &'a [Candidate]) -> Option<(Tier, &'a str)> {
    if key.is_empty() {
        return None;
    }
    if let Some(found) = candidates.iter().find(|candidate| candidate.shape_id == key) {
        return Some((Tier::Strong, &found.shape_id));
    }
    let wanted = prefix(key);
    candidates
        .iter()
        .find(|candidate| prefix(&candidate.shape_id) == wanted)
        .map(|found| (Tier::Weak, found.shape_id.as_str()))
}

pub(super) fn run(connection: &mut Connection, rule: &'static str) -> Result<RuleReport, CleanupError> {
    let mut report = RuleReport {
        agency_key: String::new(),
        rule,
        defects: 0,
        repaired: 0,
        strong: 0,
        weak: 0,
    };
    if !table_exists(connection, TRIPS).map_err(|source| CleanupError::store(rule, "inspect trips", source))? {
        return Ok(report);
    }
    let columns = table_columns(connection, TRIPS)
        .map_err(|source| CleanupError::store(rule, "inspect trips", source))?;
    let has_shape = columns.iter().any(|column| column == "shape_id");
    let has_flag = columns.iter().any(|column| column == "x_clean");

    report.defects = if has_shape {
        count_defects(connection)
    } else {
        count_rows(connection, TRIPS)
    }
    .map_err(|source| CleanupError::store(rule, "count defects", source))?;
    if report.defects == 0 {
        return Ok(report);
    }

    let groups = defect_groups(connection, has_shape)
        .map_err(|source| CleanupError::store(rule, "read defective trips", source))?;
    let candidates =
        ranked_candidates(connection).map_err(|source| CleanupError::store(rule, "read shapes", source))?;
    let mut plan = Vec::with_capacity(groups.len());
    for (key, rows) in groups {
        let Some((tier, shape_id)) = choose(&key, &candidates) else {
            return Err(CleanupError::Match {
                rule,
                fuzzy_key: key,
                trips: rows.len(),
            });
        };
        if tier == Tier::Weak {
            warn!("{rule}: fuzzy key {key:?} matched shape {shape_id} by prefix only");
        }
        plan.push((tier, shape_id.to_owned(), rows));
    }

    let transaction = connection
        .transaction()
        .map_err(|source| CleanupError::store(rule, "begin transaction", source))?;
    for (missing, column) in [(!has_shape, "shape_id"), (!has_flag, "x_clean")] {
        if missing {
            transaction
                .execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {} TEXT",
                    quote_identifier(TRIPS),
                    quote_identifier(column)
                ))
                .map_err(|source| CleanupError::store(rule, "add trips column", source))?;
        }
    }
    {
        let mut update = transaction
            .prepare("UPDATE trips SET shape_id = ?1, x_clean = ?2 WHERE rowid = ?3")
            .map_err(|source| CleanupError::store(rule, "prepare repair", source))?;
        for (tier, shape_id, rows) in &plan {
            for rowid in rows {
                update
                    .execute(params![shape_id, tier.tag(), rowid])
                    .map_err(|source| CleanupError::store(rule, "repair trip", source))?;
                report.repaired += 1;
                match tier {
                    Tier::Strong => report.strong += 1,
                    Tier::Weak => report.weak += 1,
                }
            }
        }
    }
    let remaining = count_defects(&transaction)
        .map_err(|source| CleanupError::store(rule, "verify repair", source))?;
    if remaining > 0 {
        return Err(CleanupError::Unrepaired { rule, remaining });
    }
    mark_cleaned(&transaction, TRIPS, rule)
        .map_err(|source| CleanupError::store(rule, "record cleanup", source))?;
    transaction
        .commit()
        .map_err(|source| CleanupError::store(rule, "commit", source))?;
    info!(
        "{rule}: repaired {} trips ({} strong, {} weak)",
        report.repaired, report.strong, report.weak
    );
    Ok(report)
}

fn count_defects(connection: &Connection) -> rusqlite::Result<u64> {
    count_query(connection, &format!("SELECT COUNT(*) FROM trips WHERE {DEFECT_FILTER}"))
}

fn defect_groups(connection: &Connection, has_shape: bool) -> rusqlite::Result<BTreeMap<String, Vec<i64>>> {
    let sql = if has_shape {
        format!("SELECT rowid, trip_id FROM trips WHERE {DEFECT_FILTER} ORDER BY rowid")
    } else {
        "SELECT rowid, trip_id FROM trips ORDER BY rowid".to_owned()
    };
    let mut statement = connection.prepare(&sql)?;
    let mut rows = statement.query([])?;
    let mut groups: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let rowid: i64 = row.get(0)?;
        let trip_id: Option<String> = row.get(1)?;
        groups
            .entry(fuzzy_key(trip_id.as_deref().unwrap_or_default()))
            .or_default()
            .push(rowid);
    }
    Ok(groups)
}

fn ranked_candidates(connection: &Connection) -> rusqlite::Result<Vec<Candidate>> {
    if !table_exists(connection, "shapes")? {
        return Ok(Vec::new());
    }
    let mut statement = connection.prepare(
        "SELECT shape_id, COUNT(*) FROM shapes
         WHERE shape_id IS NOT NULL AND shape_id <> ''
         GROUP BY shape_id",
    )?;
    let mut candidates = statement
        .query_map([], |row| {
            let points: i64 = row.get(1)?;
            Ok(Candidate {
                shape_id: row.get(0)?,
                points: u64::try_from(points).unwrap_or_default(),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    candidates.sort_by(|left, right| {
        Reverse(left.points)
            .cmp(&Reverse(right.points))
            .then_with(|| left.shape_id.cmp(&right.shape_id))
    });
    Ok(candidates)
}
