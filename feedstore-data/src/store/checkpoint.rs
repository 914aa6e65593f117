//! Import checkpoints: one row per fully imported table.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

/// Marker that every row of a table was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    /// Imported table.
    pub table: String,
    /// ISO-8601 UTC completion time.
    pub imported_at: String,
    /// Cleanup rule that last repaired the table.
    pub cleaned: Option<String>,
}

pub(crate) fn ensure_checkpoint_table(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS import_checkpoints (
            tablename TEXT PRIMARY KEY,
            imported_at TEXT NOT NULL,
            cleaned TEXT
        )",
    )
}

pub(crate) fn load_checkpoint(
    connection: &Connection,
    table: &str,
) -> rusqlite::Result<Option<Checkpoint>> {
    connection
        .query_row(
            "SELECT tablename, imported_at, cleaned FROM import_checkpoints WHERE tablename = ?1",
            [table],
            |row| {
                Ok(Checkpoint {
                    table: row.get(0)?,
                    imported_at: row.get(1)?,
                    cleaned: row.get(2)?,
                })
            },
        )
        .optional()
}

pub(crate) fn record_checkpoint(connection: &Connection, table: &str) -> rusqlite::Result<()> {
    connection
        .execute(
            "INSERT OR REPLACE INTO import_checkpoints (tablename, imported_at, cleaned)
             VALUES (?1, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'), NULL)",
            [table],
        )
        .map(|_| ())
}

pub(crate) fn discard_checkpoint(connection: &Connection, table: &str) -> rusqlite::Result<bool> {
    connection
        .execute("DELETE FROM import_checkpoints WHERE tablename = ?1", [table])
        .map(|removed| removed > 0)
}

pub(crate) fn mark_cleaned(connection: &Connection, table: &str, rule: &str) -> rusqlite::Result<()> {
    connection
        .execute(
            "UPDATE import_checkpoints SET cleaned = ?2 WHERE tablename = ?1",
            [table, rule],
        )
        .map(|_| ())
}
