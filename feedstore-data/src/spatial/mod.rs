//! Spatial derivation: geometry tables computed from imported base tables.
//!
//! Each derived table is described by a [`DerivedTable`] entry: its key
//! columns, the base tables it needs, its geometry columns and two SQL
//! templates, one counting the keys the table should hold and one populating
//! it. A table whose row count matches the expected key count is left alone;
//! anything else is dropped and rebuilt inside a single transaction.

pub mod extension;
mod metadata;

use feedstore_core::{FailureKind, GeometryType, IndexSpec, WGS84};
use log::{debug, info};
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use thiserror::Error;

use crate::import::codec::{create_table_sql, quote_identifier};
use crate::import::create_index_sql;
use crate::store::{count_query, count_rows, table_columns, table_exists, FeedStore};

/// Placeholder replaced by the trip direction expression.
const DIRECTION: &str = "{direction}";

struct DerivedTable {
    name: &'static str,
    key: &'static [&'static str],
    index: IndexSpec,
    requires: &'static [&'static str],
    columns: &'static [(&'static str, &'static str)],
    geometry: &'static [(&'static str, GeometryType)],
    expected_sql: &'static str,
    populate_sql: &'static str,
}

const STOPS_GEO: DerivedTable = DerivedTable {
    name: "stops_geo",
    key: &["stop_id"],
    index: IndexSpec {
        name: "stops_geo_idx",
        columns: &["stop_id"],
        unique: true,
    },
    requires: &["stops"],
    columns: &[("stops", "stop_id"), ("stops", "stop_lat"), ("stops", "stop_lon")],
    geometry: &[("geom", GeometryType::Point)],
    expected_sql: "SELECT COUNT(DISTINCT stop_id) FROM stops",
    populate_sql: "\
INSERT INTO stops_geo (stop_id, geom)
SELECT stop_id, geom FROM (
    SELECT stop_id, MakePoint(stop_lon, stop_lat, 4326) AS geom FROM stops
) WHERE geom IS NOT NULL",
};

const SHAPES_GEO: DerivedTable = DerivedTable {
    name: "shapes_geo",
    key: &["shape_id"],
    index: IndexSpec {
        name: "shapes_geo_idx",
        columns: &["shape_id"],
        unique: true,
    },
    requires: &["shapes"],
    columns: &[
        ("shapes", "shape_id"),
        ("shapes", "shape_pt_lat"),
        ("shapes", "shape_pt_lon"),
        ("shapes", "shape_pt_sequence"),
    ],
    geometry: &[("geom", GeometryType::LineString)],
    expected_sql: "SELECT COUNT(DISTINCT shape_id) FROM shapes",
    populate_sql: "\
INSERT INTO shapes_geo (shape_id, geom)
SELECT shape_id, geom FROM (
    SELECT shape_id,
           MakeLine(shape_pt_sequence, shape_pt_lon, shape_pt_lat, 4326) AS geom
    FROM shapes GROUP BY shape_id
) WHERE geom IS NOT NULL",
};

const ROUTES_GEO: DerivedTable = DerivedTable {
    name: "routes_geo",
    key: &["route_id", "direction_id"],
    index: IndexSpec {
        name: "routes_geo_idx",
        columns: &["route_id", "direction_id"],
        unique: true,
    },
    requires: &["trips", "stop_times", "shapes_geo", "stops_geo"],
    columns: &[
        ("trips", "route_id"),
        ("trips", "trip_id"),
        ("trips", "shape_id"),
        ("stop_times", "trip_id"),
        ("stop_times", "stop_id"),
    ],
    geometry: &[
        ("geom", GeometryType::MultiLineString),
        ("stopgeom", GeometryType::MultiPoint),
        ("pathgeom", GeometryType::MultiLineString),
    ],
    expected_sql: "\
SELECT COUNT(*) FROM (
    SELECT DISTINCT t.route_id, {direction}
    FROM trips t JOIN shapes_geo s ON s.shape_id = t.shape_id
)",
    populate_sql: "\
WITH lines AS (
    SELECT t.route_id AS route_id, {direction} AS direction_id,
           CollectLines(s.geom) AS geom
    FROM trips t JOIN shapes_geo s ON s.shape_id = t.shape_id
    GROUP BY 1, 2
),
served AS (
    SELECT t.route_id AS route_id, {direction} AS direction_id,
           CollectPoints(g.geom) AS stopgeom
    FROM trips t
    JOIN shapes_geo s ON s.shape_id = t.shape_id
    JOIN stop_times st ON st.trip_id = t.trip_id
    JOIN stops_geo g ON g.stop_id = st.stop_id
    GROUP BY 1, 2
)
INSERT INTO routes_geo (route_id, direction_id, geom, stopgeom, pathgeom)
SELECT l.route_id, l.direction_id, l.geom, p.stopgeom, SegmentLines(l.geom, p.stopgeom)
FROM lines l
LEFT JOIN served p ON p.route_id = l.route_id AND p.direction_id = l.direction_id
WHERE l.geom IS NOT NULL",
};

/// Points before lines, lines before the tables segmenting them.
const DERIVED_TABLES: [&DerivedTable; 3] = [&STOPS_GEO, &SHAPES_GEO, &ROUTES_GEO];

/// State of one derived table after a derivation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DerivedOutcome {
    /// The table already held the expected rows and was left untouched.
    Fresh {
        /// Row count found.
        rows: u64,
    },
    /// The table was dropped and rebuilt.
    Rebuilt {
        /// Row count after the rebuild.
        rows: u64,
    },
}

impl DerivedOutcome {
    /// Row count held by the table.
    #[must_use]
    pub const fn rows(self) -> u64 {
        match self {
            Self::Fresh { rows } | Self::Rebuilt { rows } => rows,
        }
    }
}

/// Outcome for a named derived table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedTableReport {
    /// Derived table name.
    pub table: &'static str,
    /// What the pass did to it.
    #[serde(flatten)]
    pub outcome: DerivedOutcome,
}

/// Summary of a derivation pass, in build order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpatialReport {
    /// Derived tables whose base tables were present.
    pub tables: Vec<DerivedTableReport>,
}

impl SpatialReport {
    /// Outcome recorded for `table`, if it was derived.
    #[must_use]
    pub fn outcome(&self, table: &str) -> Option<DerivedOutcome> {
        self.tables
            .iter()
            .find(|report| report.table == table)
            .map(|report| report.outcome)
    }
}

/// Build or refresh every derived geometry table the store can support.
///
/// # Errors
/// Returns [`SpatialError::ExtensionUnavailable`] when the store was opened
/// without geometry support and [`SpatialError::Consistency`] when a rebuilt
/// table does not hold one row per expected key. A failed rebuild is rolled
/// back, leaving the previous state of that table in place.
pub fn derive_spatial(store: &mut FeedStore) -> Result<SpatialReport, SpatialError> {
    if !store.has_geometry_extension() {
        return Err(SpatialError::ExtensionUnavailable);
    }
    let connection = store.connection_mut();
    if metadata::ensure_metadata(connection).map_err(|source| SpatialError::Metadata { source })? {
        info!("initialised spatial metadata tables");
    }

    let mut report = SpatialReport::default();
    for derived in DERIVED_TABLES {
        if let Some(missing) = missing_base(connection, derived)? {
            debug!("skipping {}: {missing} is absent", derived.name);
            continue;
        }
        let outcome = refresh(connection, derived)?;
        report.tables.push(DerivedTableReport {
            table: derived.name,
            outcome,
        });
    }
    Ok(report)
}

fn missing_base(
    connection: &Connection,
    derived: &DerivedTable,
) -> Result<Option<String>, SpatialError> {
    for base in derived.requires {
        let present = table_exists(connection, base)
            .map_err(|source| SpatialError::store(derived.name, "inspect base tables", source))?;
        if !present {
            return Ok(Some(format!("base table {base}")));
        }
    }
    for (base, column) in derived.columns {
        let columns = table_columns(connection, base)
            .map_err(|source| SpatialError::store(derived.name, "inspect base columns", source))?;
        if !columns.iter().any(|name| name == column) {
            return Ok(Some(format!("column {base}.{column}")));
        }
    }
    Ok(None)
}

fn direction_expression(connection: &Connection) -> rusqlite::Result<&'static str> {
    let columns = table_columns(connection, "trips")?;
    Ok(if columns.iter().any(|column| column == "direction_id") {
        "COALESCE(t.direction_id, '')"
    } else {
        "''"
    })
}

fn render(template: &str, direction: &str) -> String {
    template.replace(DIRECTION, direction)
}

fn refresh(
    connection: &mut Connection,
    derived: &DerivedTable,
) -> Result<DerivedOutcome, SpatialError> {
    let table = derived.name;
    let direction = if derived.requires.contains(&"trips") {
        direction_expression(connection)
            .map_err(|source| SpatialError::store(table, "inspect trips", source))?
    } else {
        "''"
    };
    let expected = count_query(connection, &render(derived.expected_sql, direction))
        .map_err(|source| SpatialError::store(table, "count expected keys", source))?;
    let exists = table_exists(connection, table)
        .map_err(|source| SpatialError::store(table, "inspect table", source))?;
    if exists {
        let found = count_rows(connection, table)
            .map_err(|source| SpatialError::store(table, "count rows", source))?;
        if found == expected {
            info!("{table} is fresh with {found} rows");
            return Ok(DerivedOutcome::Fresh { rows: found });
        }
        info!("{table} is stale: {found} rows, expected {expected}");
    }

    let transaction = connection
        .transaction()
        .map_err(|source| SpatialError::store(table, "begin transaction", source))?;
    rebuild(&transaction, derived, direction)?;
    let found = count_rows(&transaction, table)
        .map_err(|source| SpatialError::store(table, "count rows", source))?;
    if found != expected {
        return Err(SpatialError::Consistency {
            table,
            expected,
            found,
        });
    }
    transaction
        .commit()
        .map_err(|source| SpatialError::store(table, "commit", source))?;
    info!("rebuilt {table} with {found} rows");
    Ok(DerivedOutcome::Rebuilt { rows: found })
}

fn rebuild(
    transaction: &Transaction<'_>,
    derived: &DerivedTable,
    direction: &str,
) -> Result<(), SpatialError> {
    let table = derived.name;
    let key: Vec<String> = derived.key.iter().map(|column| (*column).to_owned()).collect();
    transaction
        .execute_batch(&format!(
            "DROP TABLE IF EXISTS {};\n{};",
            quote_identifier(table),
            create_table_sql(table, &key)
        ))
        .map_err(|source| SpatialError::store(table, "recreate table", source))?;
    metadata::discard_geometry_columns(transaction, table)
        .map_err(|source| SpatialError::store(table, "release geometry columns", source))?;
    for (column, geometry_type) in derived.geometry {
        metadata::add_geometry_column(transaction, table, column, *geometry_type, WGS84)
            .map_err(|source| SpatialError::store(table, "add geometry column", source))?;
    }
    transaction
        .execute_batch(&render(derived.populate_sql, direction))
        .map_err(|source| SpatialError::store(table, "populate", source))?;
    transaction
        .execute_batch(&create_index_sql(table, &derived.index))
        .map_err(|source| SpatialError::store(table, "create key index", source))?;
    Ok(())
}

/// Errors raised while deriving geometry tables.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The store was opened without the geometry extension.
    #[error("the store has no geometry extension; open it with spatial support")]
    ExtensionUnavailable,
    /// The spatial metadata tables could not be initialised.
    #[error("failed to initialise spatial metadata")]
    Metadata {
        /// Underlying SQLite failure.
        #[source]
        source: rusqlite::Error,
    },
    /// A statement failed while refreshing a derived table.
    #[error("failed to {operation} for {table}")]
    Store {
        /// Derived table being refreshed.
        table: &'static str,
        /// Step that failed.
        operation: &'static str,
        /// Underlying SQLite failure.
        #[source]
        source: rusqlite::Error,
    },
    /// A rebuilt table does not hold one row per expected key.
    #[error("{table} holds {found} rows after rebuild, expected {expected}; check base coordinates")]
    Consistency {
        /// Derived table name.
        table: &'static str,
        /// Distinct keys in the base tables.
        expected: u64,
        /// Rows produced.
        found: u64,
    },
}

impl SpatialError {
    const fn store(table: &'static str, operation: &'static str, source: rusqlite::Error) -> Self {
        Self::Store {
            table,
            operation,
            source,
        }
    }

    /// Failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::ExtensionUnavailable => FailureKind::ExtensionUnavailable,
            Self::Metadata { .. } | Self::Store { .. } => FailureKind::Store,
            Self::Consistency { .. } => FailureKind::Consistency,
        }
    }
}
