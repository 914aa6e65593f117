//! Spatial metadata tables: `geometry_columns` and `spatial_ref_sys`.

use feedstore_core::{GeometryType, Srid, WGS84};
use rusqlite::{params, Connection};

use crate::import::codec::quote_identifier;
use crate::store::table_exists;

const METADATA_SQL: &str = "\
DROP TABLE IF EXISTS geometry_columns;
DROP TABLE IF EXISTS spatial_ref_sys;
CREATE TABLE spatial_ref_sys (
    srid INTEGER PRIMARY KEY,
    auth_name TEXT NOT NULL,
    auth_srid INTEGER NOT NULL,
    ref_sys_name TEXT NOT NULL,
    proj4text TEXT NOT NULL
);
CREATE TABLE geometry_columns (
    f_table_name TEXT NOT NULL,
    f_geometry_column TEXT NOT NULL,
    geometry_type TEXT NOT NULL,
    coord_dimension INTEGER NOT NULL,
    srid INTEGER NOT NULL REFERENCES spatial_ref_sys (srid),
    PRIMARY KEY (f_table_name, f_geometry_column)
);";

/// Create both metadata tables unless both already exist.
///
/// Returns `true` when the tables were (re)initialised.
pub(crate) fn ensure_metadata(connection: &Connection) -> rusqlite::Result<bool> {
    if table_exists(connection, "geometry_columns")? && table_exists(connection, "spatial_ref_sys")? {
        return Ok(false);
    }
    connection.execute_batch(METADATA_SQL)?;
    connection.execute(
        "INSERT INTO spatial_ref_sys (srid, auth_name, auth_srid, ref_sys_name, proj4text)
         VALUES (?1, 'epsg', ?1, 'WGS 84', '+proj=longlat +datum=WGS84 +no_defs')",
        params![WGS84.code()],
    )?;
    Ok(true)
}

/// Add a geometry column to `table` and register it.
pub(crate) fn add_geometry_column(
    connection: &Connection,
    table: &str,
    column: &str,
    geometry_type: GeometryType,
    srid: Srid,
) -> rusqlite::Result<()> {
    connection.execute_batch(&format!(
        "ALTER TABLE {} ADD COLUMN {} TEXT",
        quote_identifier(table),
        quote_identifier(column)
    ))?;
    connection.execute(
        "INSERT OR REPLACE INTO geometry_columns
            (f_table_name, f_geometry_column, geometry_type, coord_dimension, srid)
         VALUES (?1, ?2, ?3, 2, ?4)",
        params![table, column, geometry_type.as_str(), srid.code()],
    )?;
    Ok(())
}

/// Drop every registration held by `table`.
pub(crate) fn discard_geometry_columns(connection: &Connection, table: &str) -> rusqlite::Result<usize> {
    connection.execute(
        "DELETE FROM geometry_columns WHERE f_table_name = ?1",
        [table],
    )
}
