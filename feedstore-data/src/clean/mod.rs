//! Agency-specific data repairs.
//!
//! Every agency row is reduced to an identity key with
//! [`feedstore_core::agency_key`]. Keys found in the rule table select a
//! [`CleanupRule`]; rules for different agencies run independently, each in
//! its own transaction.

mod shape_backfill;

use feedstore_core::{FailureKind, agency_key};
use log::{debug, info};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::store::{FeedStore, StoreError};

/// A repair keyed by agency identity.
#[derive(Debug, Clone, Copy)]
pub struct CleanupRule {
    /// Normalised agency identity the rule applies to.
    pub agency_key: &'static str,
    /// Rule name, recorded on the repaired table's checkpoint.
    pub name: &'static str,
    run: fn(&mut Connection, &'static str) -> Result<RuleReport, CleanupError>,
}

const RULES: &[CleanupRule] = &[CleanupRule {
    agency_key: "mta-nyct-mta-new-york-city-transit",
    name: shape_backfill::RULE,
    run: shape_backfill::run,
}];

/// Look up the rule registered for `agency_key`.
///
/// # Examples
/// ```
/// use feedstore_data::clean::rule_for;
///
/// let rule = rule_for("mta-nyct-mta-new-york-city-transit").expect("known agency");
/// assert_eq!(rule.name, "shape-backfill");
/// assert!(rule_for("metro-transit").is_none());
/// ```
#[must_use]
pub fn rule_for(agency_key: &str) -> Option<&'static CleanupRule> {
    RULES.iter().find(|rule| rule.agency_key == agency_key)
}

/// What one rule found and fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    /// Agency identity that selected the rule.
    pub agency_key: String,
    /// Rule name.
    pub rule: &'static str,
    /// Defective rows found before repair.
    pub defects: u64,
    /// Rows repaired.
    pub repaired: u64,
    /// Rows repaired through an exact match.
    pub strong: u64,
    /// Rows repaired through a prefix match.
    pub weak: u64,
}

/// Summary of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Distinct agency identity keys found in the feed.
    pub agencies: Vec<String>,
    /// Reports of the rules that ran.
    pub rules: Vec<RuleReport>,
}

/// Distinct identity keys of every agency row, in table order.
pub fn agency_keys(store: &FeedStore) -> Result<Vec<String>, CleanupError> {
    if !store.has_table("agency").map_err(|source| CleanupError::Agency { source })? {
        return Ok(Vec::new());
    }
    let available = store
        .columns("agency")
        .map_err(|source| CleanupError::Agency { source })?;
    let columns: Vec<&str> = ["agency_id", "agency_name"]
        .into_iter()
        .filter(|column| available.iter().any(|name| name == column))
        .collect();
    if columns.is_empty() {
        return Ok(Vec::new());
    }
    let records = store
        .query_records(&format!("SELECT {} FROM agency ORDER BY rowid", columns.join(", ")))
        .map_err(|source| CleanupError::Agency { source })?;

    let mut keys: Vec<String> = Vec::new();
    for record in records {
        let identity = record.iter().map(|(_, value)| value).collect::<Vec<_>>().join(" ");
        let key = agency_key(&identity);
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    }
    Ok(keys)
}

/// Run the rule of every agency in the feed that has one.
pub fn run_cleanup(store: &mut FeedStore) -> Result<CleanupReport, CleanupError> {
    let agencies = agency_keys(store)?;
    let mut rules = Vec::new();
    for key in &agencies {
        let Some(rule) = rule_for(key) else {
            debug!("no cleanup rule for agency {key}");
            continue;
        };
        info!("agency {key}: running {}", rule.name);
        let mut report = (rule.run)(store.connection_mut(), rule.name)?;
        report.agency_key.clone_from(key);
        rules.push(report);
    }
    Ok(CleanupReport { agencies, rules })
}

/// Errors raised by cleanup rules.
#[derive(Debug, Error)]
pub enum CleanupError {
    /// The agency table could not be read.
    #[error("failed to read agency identities")]
    Agency {
        /// Underlying store failure.
        #[source]
        source: StoreError,
    },
    /// A statement failed while a rule was running.
    #[error("{rule}: failed to {operation}")]
    Store {
        /// Rule being applied.
        rule: &'static str,
        /// Step that failed.
        operation: &'static str,
        /// Underlying SQLite failure.
        #[source]
        source: rusqlite::Error,
    },
    /// A group of defective rows had no candidate in any tier.
    #[error("{rule}: no candidate matches fuzzy key {fuzzy_key:?} ({trips} trips)")]
    Match {
        /// Rule being applied.
        rule: &'static str,
        /// Key derived from the defective rows.
        fuzzy_key: String,
        /// Rows sharing the key.
        trips: usize,
    },
    /// Defects remained after the repair pass.
    #[error("{rule}: {remaining} defective rows remain after repair")]
    Unrepaired {
        /// Rule being applied.
        rule: &'static str,
        /// Defects counted after repair.
        remaining: u64,
    },
}

impl CleanupError {
    pub(crate) const fn store(
        rule: &'static str,
        operation: &'static str,
        source: rusqlite::Error,
    ) -> Self {
        Self::Store {
            rule,
            operation,
            source,
        }
    }

    /// Failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Agency { .. } | Self::Store { .. } => FailureKind::Store,
            Self::Match { .. } => FailureKind::Match,
            Self::Unrepaired { .. } => FailureKind::Consistency,
        }
    }
}
