//! The store handle owned by a pipeline run.
//!
//! [`FeedStore`] wraps one SQLite connection for the whole run. There is no
//! process-wide registry: callers pass the handle explicitly and snapshot it
//! with [`FeedStore::snapshot_to`] when the build completes.

mod checkpoint;

use camino::{Utf8Path, Utf8PathBuf};
use feedstore_core::{FailureKind, Record};
use log::info;
use rusqlite::{Connection, DatabaseName, OptionalExtension, types::ValueRef};
use thiserror::Error;

use crate::import::codec::quote_identifier;
use crate::spatial::extension;

pub use checkpoint::Checkpoint;
pub(crate) use checkpoint::{
    discard_checkpoint, load_checkpoint, mark_cleaned, record_checkpoint,
};

use checkpoint::ensure_checkpoint_table;

/// Options applied when a store is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Install the geometry extension on the connection.
    pub spatial: bool,
}

impl StoreOptions {
    /// Options with the geometry extension enabled.
    #[must_use]
    pub const fn spatial() -> Self {
        Self { spatial: true }
    }
}

/// A relational store holding imported feed tables.
///
/// # Examples
/// ```
/// use feedstore_data::{FeedStore, StoreOptions};
///
/// let store = FeedStore::open_in_memory(StoreOptions::default()).expect("open store");
/// assert!(!store.has_table("stops").expect("introspect"));
/// assert!(!store.has_geometry_extension());
/// ```
#[derive(Debug)]
pub struct FeedStore {
    connection: Connection,
}

impl FeedStore {
    /// Open a transient store in memory.
    pub fn open_in_memory(options: StoreOptions) -> Result<Self, StoreError> {
        let connection =
            Connection::open_in_memory().map_err(|source| StoreError::OpenMemory { source })?;
        Self::prepare(connection, options)
    }

    /// Open (or create) the store file at `path`.
    pub fn open(path: &Utf8Path, options: StoreOptions) -> Result<Self, StoreError> {
        feedstore_fs::ensure_parent_dir(path).map_err(|source| StoreError::CreateParent {
            path: path.to_owned(),
            source,
        })?;
        let connection = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_owned(),
            source,
        })?;
        Self::prepare(connection, options)
    }

    fn prepare(connection: Connection, options: StoreOptions) -> Result<Self, StoreError> {
        if options.spatial {
            extension::install(&connection)
                .map_err(|source| StoreError::InstallExtension { source })?;
        }
        ensure_checkpoint_table(&connection).map_err(|source| StoreError::Sqlite {
            operation: "create checkpoint table",
            source,
        })?;
        Ok(Self { connection })
    }

    /// Borrow the underlying connection for read-only queries.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    pub(crate) const fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    /// Whether the geometry extension answers on this connection.
    #[must_use]
    pub fn has_geometry_extension(&self) -> bool {
        extension::is_available(&self.connection)
    }

    /// Whether a table named `table` exists.
    pub fn has_table(&self, table: &str) -> Result<bool, StoreError> {
        table_exists(&self.connection, table).map_err(|source| StoreError::Table {
            table: table.to_owned(),
            operation: "look up table",
            source,
        })
    }

    /// Column names of `table` in declaration order; empty when it is absent.
    pub fn columns(&self, table: &str) -> Result<Vec<String>, StoreError> {
        table_columns(&self.connection, table).map_err(|source| StoreError::Table {
            table: table.to_owned(),
            operation: "list columns",
            source,
        })
    }

    /// Whether `table` has a column named `column`.
    pub fn has_column(&self, table: &str, column: &str) -> Result<bool, StoreError> {
        Ok(self.columns(table)?.iter().any(|name| name == column))
    }

    /// Number of rows in `table`.
    pub fn count(&self, table: &str) -> Result<u64, StoreError> {
        count_rows(&self.connection, table).map_err(|source| StoreError::Table {
            table: table.to_owned(),
            operation: "count rows",
            source,
        })
    }

    /// Run a read-only `sql` query and collect every row as a [`Record`].
    ///
    /// `NULL` cells read back as empty strings; numbers are formatted as text.
    pub fn query_records(&self, sql: &str) -> Result<Vec<Record>, StoreError> {
        read_records(&self.connection, sql).map_err(|source| StoreError::Sqlite {
            operation: "query records",
            source,
        })
    }

    /// Checkpoint row for `table`, if its import completed.
    pub fn checkpoint(&self, table: &str) -> Result<Option<Checkpoint>, StoreError> {
        load_checkpoint(&self.connection, table).map_err(|source| StoreError::Table {
            table: table.to_owned(),
            operation: "read checkpoint",
            source,
        })
    }

    /// Copy the whole store to `path` using the online backup API.
    pub fn snapshot_to(&self, path: &Utf8Path) -> Result<(), StoreError> {
        feedstore_fs::ensure_parent_dir(path).map_err(|source| StoreError::CreateParent {
            path: path.to_owned(),
            source,
        })?;
        self.connection
            .backup(DatabaseName::Main, path, None)
            .map_err(|source| StoreError::Snapshot {
                path: path.to_owned(),
                source,
            })?;
        info!("snapshot written to {path}");
        Ok(())
    }
}

pub(crate) fn table_exists(connection: &Connection, table: &str) -> rusqlite::Result<bool> {
    connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
}

pub(crate) fn table_columns(connection: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut statement = connection.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let names = statement.query_map([table], |row| row.get::<_, String>(0))?;
    names.collect()
}

pub(crate) fn count_rows(connection: &Connection, table: &str) -> rusqlite::Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
    count_query(connection, &sql)
}

pub(crate) fn count_query(connection: &Connection, sql: &str) -> rusqlite::Result<u64> {
    let count: i64 = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or_default())
}

fn read_records(connection: &Connection, sql: &str) -> rusqlite::Result<Vec<Record>> {
    let mut statement = connection.prepare(sql)?;
    let columns: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(str::to_owned)
        .collect();
    let mut rows = statement.query([])?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Record::default();
        for (index, column) in columns.iter().enumerate() {
            record.push(column.as_str(), cell_text(row.get_ref(index)?));
        }
        records.push(record);
    }
    Ok(records)
}

fn cell_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(number) => number.to_string(),
        ValueRef::Real(number) => number.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Errors raised by the store handle.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The in-memory store could not be created.
    #[error("failed to open in-memory store")]
    OpenMemory {
        /// Underlying SQLite failure.
        #[source]
        source: rusqlite::Error,
    },
    /// The store file could not be opened.
    #[error("failed to open store at {path}")]
    Open {
        /// Store location.
        path: Utf8PathBuf,
        /// Underlying SQLite failure.
        #[source]
        source: rusqlite::Error,
    },
    /// The parent directory of a store file could not be created.
    #[error("failed to create parent directory for {path}")]
    CreateParent {
        /// Target file.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// Registering the geometry extension failed.
    #[error("failed to install the geometry extension")]
    InstallExtension {
        /// Underlying SQLite failure.
        #[source]
        source: rusqlite::Error,
    },
    /// A statement against a specific table failed.
    #[error("failed to {operation} for table {table}")]
    Table {
        /// Table involved.
        table: String,
        /// Short description of the statement.
        operation: &'static str,
        /// Underlying SQLite failure.
        #[source]
        source: rusqlite::Error,
    },
    /// Any other statement failed.
    #[error("store operation '{operation}' failed")]
    Sqlite {
        /// Short description of the statement.
        operation: &'static str,
        /// Underlying SQLite failure.
        #[source]
        source: rusqlite::Error,
    },
    /// The online backup to `path` failed.
    #[error("failed to snapshot store to {path}")]
    Snapshot {
        /// Snapshot target.
        path: Utf8PathBuf,
        /// Underlying SQLite failure.
        #[source]
        source: rusqlite::Error,
    },
}

impl StoreError {
    /// Failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        FailureKind::Store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn store() -> FeedStore {
        let store = FeedStore::open_in_memory(StoreOptions::default()).expect("open store");
        store
            .connection()
            .execute_batch(
                "CREATE TABLE stops (stop_id TEXT, stop_name TEXT);
                 INSERT INTO stops VALUES ('S1', 'Main St'), ('S2', NULL);",
            )
            .expect("seed stops");
        store
    }

    #[rstest]
    fn introspects_tables_and_columns(store: FeedStore) {
        assert!(store.has_table("stops").expect("has stops"));
        assert!(store.has_table("import_checkpoints").expect("has checkpoints"));
        assert!(!store.has_table("trips").expect("has trips"));
        assert_eq!(
            store.columns("stops").expect("columns"),
            vec!["stop_id".to_owned(), "stop_name".to_owned()]
        );
        assert!(store.has_column("stops", "stop_name").expect("column"));
        assert!(store.columns("trips").expect("columns").is_empty());
        assert_eq!(store.count("stops").expect("count"), 2);
    }

    #[rstest]
    fn reads_null_cells_as_empty_strings(store: FeedStore) {
        let records = store
            .query_records("SELECT stop_id, stop_name FROM stops ORDER BY stop_id")
            .expect("query");
        assert_eq!(records.len(), 2);
        assert_eq!(records.get(1).and_then(|r| r.get("stop_name")), Some(""));
    }

    #[rstest]
    fn snapshot_copies_every_table(store: FeedStore) {
        let dir = TempDir::new().expect("temp dir");
        let target = Utf8PathBuf::from_path_buf(dir.path().join("out/feed.sqlite"))
            .expect("utf-8 path");
        store.snapshot_to(&target).expect("snapshot");

        let copy = FeedStore::open(&target, StoreOptions::default()).expect("reopen");
        assert_eq!(copy.count("stops").expect("count"), 2);
    }

    #[rstest]
    fn spatial_option_installs_extension() {
        let store = FeedStore::open_in_memory(StoreOptions::spatial()).expect("open store");
        assert!(store.has_geometry_extension());
    }
}
