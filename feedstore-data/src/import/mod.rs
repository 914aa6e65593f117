//! Batch import engine.
//!
//! Each recognised resource becomes one all-text table. Rows are read with
//! the `csv` crate, decoded by the [`codec`], and committed in batches of at
//! most [`MAX_BATCH_ROWS`] rows, each batch a single multi-row `INSERT` in
//! its own transaction. The index plan and the checkpoint row are written
//! together once every batch has committed, so a checkpoint always means the
//! table is complete. A table found without a checkpoint is a leftover from
//! an interrupted run and is recreated from scratch.

pub mod codec;
mod index;

use std::collections::HashSet;
use std::io::Read;

use csv::{ByteRecord, Position, ReaderBuilder};
use feedstore_core::{FailureKind, ResourceKind};
use log::{debug, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::feed::{FeedError, FeedSource};
use crate::store::{self, FeedStore, discard_checkpoint, record_checkpoint};

pub use codec::CodecError;
pub use index::create_index_sql;

/// Ceiling on rows per bulk statement, set by the store's compound-select
/// limit.
pub const MAX_BATCH_ROWS: usize = 500;

/// Knobs for one import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    resume: bool,
    batch_rows: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ImportOptions {
    /// Options with full-size batches.
    ///
    /// With `resume` set, tables that already carry a checkpoint are skipped;
    /// otherwise every resource is imported again.
    #[must_use]
    pub const fn new(resume: bool) -> Self {
        Self {
            resume,
            batch_rows: MAX_BATCH_ROWS,
        }
    }

    /// Lower the batch size. Values are clamped to `1..=MAX_BATCH_ROWS`.
    #[must_use]
    pub const fn with_batch_rows(mut self, rows: usize) -> Self {
        self.batch_rows = if rows == 0 {
            1
        } else if rows > MAX_BATCH_ROWS {
            MAX_BATCH_ROWS
        } else {
            rows
        };
        self
    }

    /// Whether checkpointed tables are skipped.
    #[must_use]
    pub const fn resume(&self) -> bool {
        self.resume
    }

    /// Rows per bulk statement.
    #[must_use]
    pub const fn batch_rows(&self) -> usize {
        self.batch_rows
    }
}

/// Result of importing one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportOutcome {
    /// Every row was committed and the table checkpointed.
    Imported {
        /// Data rows written.
        rows: u64,
        /// Bulk statements committed.
        batches: u64,
    },
    /// The table was already checkpointed and left untouched.
    Skipped,
}

/// Outcome of one table within a feed import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableImport {
    /// Store table name.
    pub table: &'static str,
    /// What happened to it.
    #[serde(flatten)]
    pub outcome: ImportOutcome,
}

/// Import every recognised resource of `feed`, in feed order.
///
/// Unrecognised names are skipped; only the first resource of each kind is
/// imported.
pub fn import_feed<F>(
    store: &mut FeedStore,
    feed: &mut F,
    options: &ImportOptions,
) -> Result<Vec<TableImport>, ImportError>
where
    F: FeedSource + ?Sized,
{
    let mut seen = HashSet::new();
    let mut imports = Vec::new();
    for name in feed.resource_names() {
        let Some(kind) = ResourceKind::from_resource_name(&name) else {
            debug!("skipping unrecognised resource {name}");
            continue;
        };
        if !seen.insert(kind) {
            debug!("skipping second copy of {name}");
            continue;
        }
        let outcome = if is_checkpointed(store.connection(), kind, options)? {
            skipped(kind)
        } else {
            let reader = feed.open(&name).map_err(|source| ImportError::Open {
                resource: name.clone(),
                source,
            })?;
            import_rows(store, kind, reader, options)?
        };
        imports.push(TableImport {
            table: kind.table_name(),
            outcome,
        });
    }
    Ok(imports)
}

/// Import one resource of `kind` from `reader`.
///
/// With resumability on, a checkpointed table returns
/// [`ImportOutcome::Skipped`] before `reader` is touched.
pub fn import_resource<R: Read>(
    store: &mut FeedStore,
    kind: ResourceKind,
    reader: R,
    options: &ImportOptions,
) -> Result<ImportOutcome, ImportError> {
    if is_checkpointed(store.connection(), kind, options)? {
        return Ok(skipped(kind));
    }
    import_rows(store, kind, reader, options)
}

fn is_checkpointed(
    connection: &Connection,
    kind: ResourceKind,
    options: &ImportOptions,
) -> Result<bool, ImportError> {
    if !options.resume {
        return Ok(false);
    }
    let table = kind.table_name();
    let checkpoint = store::load_checkpoint(connection, table)
        .map_err(store_error(table, "read checkpoint"))?;
    Ok(checkpoint.is_some())
}

fn skipped(kind: ResourceKind) -> ImportOutcome {
    info!("skipping {}: already imported", kind.table_name());
    ImportOutcome::Skipped
}

fn import_rows<R: Read>(
    store: &mut FeedStore,
    kind: ResourceKind,
    reader: R,
    options: &ImportOptions,
) -> Result<ImportOutcome, ImportError> {
    let table = kind.table_name();
    info!("importing {table}");
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut record = ByteRecord::new();

    let header = read_header(&mut reader, &mut record, table)?;
    recreate_table(store.connection_mut(), table, &header)?;

    let mut batch = Batch::new(table, &header, options.batch_rows);
    loop {
        let more = reader
            .read_byte_record(&mut record)
            .map_err(|source| read_failure(table, reader.position().line(), source))?;
        if !more {
            break;
        }
        let line = record
            .position()
            .map_or_else(|| reader.position().line(), Position::line);
        batch.push(line, decode_row(&record, table, line, header.len())?);
        if batch.is_full() {
            batch.commit(store.connection_mut())?;
        }
    }
    batch.commit(store.connection_mut())?;

    finish_table(store.connection_mut(), kind, &header)?;
    info!(
        "imported {} rows into {table} in {} batches",
        batch.rows_committed, batch.batches_committed
    );
    Ok(ImportOutcome::Imported {
        rows: batch.rows_committed,
        batches: batch.batches_committed,
    })
}

fn read_header<R: Read>(
    reader: &mut csv::Reader<R>,
    record: &mut ByteRecord,
    table: &'static str,
) -> Result<Vec<String>, ImportError> {
    let found = reader
        .read_byte_record(record)
        .map_err(|source| read_failure(table, 1, source))?;
    if !found {
        return Err(ImportError::EmptyHeader { table });
    }
    let line = record.position().map_or(1, Position::line);
    let header =
        codec::decode_header(record.iter()).map_err(|source| ImportError::Encoding {
            table,
            line,
            source,
        })?;

    let mut names = HashSet::new();
    for (index, column) in header.iter().enumerate() {
        if column.is_empty() {
            return Err(ImportError::BlankColumn {
                table,
                position: index + 1,
            });
        }
        if !names.insert(column.as_str()) {
            return Err(ImportError::DuplicateColumn {
                table,
                column: column.clone(),
            });
        }
    }
    Ok(header)
}

fn decode_row(
    record: &ByteRecord,
    table: &'static str,
    line: u64,
    width: usize,
) -> Result<Vec<String>, ImportError> {
    if record.len() > width {
        return Err(ImportError::TooManyFields {
            table,
            line,
            expected: width,
            found: record.len(),
        });
    }
    let mut row = record
        .iter()
        .enumerate()
        .map(|(index, bytes)| codec::decode_field(bytes, index + 1))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ImportError::Encoding {
            table,
            line,
            source,
        })?;
    row.resize(width, String::new());
    Ok(row)
}

fn recreate_table(
    connection: &mut Connection,
    table: &'static str,
    header: &[String],
) -> Result<(), ImportError> {
    let transaction = connection
        .transaction()
        .map_err(store_error(table, "begin table setup"))?;
    let existed =
        store::table_exists(&transaction, table).map_err(store_error(table, "look up table"))?;
    let had_checkpoint = discard_checkpoint(&transaction, table)
        .map_err(store_error(table, "discard checkpoint"))?;
    if had_checkpoint {
        info!("re-importing {table}: previous checkpoint discarded");
    } else if existed {
        warn!("recreating partially imported table {table}");
    }
    transaction
        .execute_batch(&format!(
            "DROP TABLE IF EXISTS {}",
            codec::quote_identifier(table)
        ))
        .map_err(store_error(table, "drop table"))?;
    transaction
        .execute_batch(&codec::create_table_sql(table, header))
        .map_err(store_error(table, "create table"))?;
    transaction
        .commit()
        .map_err(store_error(table, "commit table setup"))
}

fn finish_table(
    connection: &mut Connection,
    kind: ResourceKind,
    header: &[String],
) -> Result<(), ImportError> {
    let table = kind.table_name();
    let transaction = connection
        .transaction()
        .map_err(store_error(table, "begin checkpoint"))?;
    let created = index::apply_index_plan(&transaction, kind, header)
        .map_err(|(index, source)| ImportError::Index {
            table,
            index,
            source,
        })?;
    record_checkpoint(&transaction, table).map_err(store_error(table, "record checkpoint"))?;
    transaction
        .commit()
        .map_err(store_error(table, "commit checkpoint"))?;
    if !created.is_empty() {
        debug!("indexed {table}: {}", created.join(", "));
    }
    Ok(())
}

struct Batch<'a> {
    table: &'static str,
    header: &'a [String],
    capacity: usize,
    first_line: u64,
    rows: Vec<Vec<String>>,
    rows_committed: u64,
    batches_committed: u64,
}

impl<'a> Batch<'a> {
    fn new(table: &'static str, header: &'a [String], capacity: usize) -> Self {
        Self {
            table,
            header,
            capacity,
            first_line: 0,
            rows: Vec::with_capacity(capacity),
            rows_committed: 0,
            batches_committed: 0,
        }
    }

    fn push(&mut self, line: u64, row: Vec<String>) {
        if self.rows.is_empty() {
            self.first_line = line;
        }
        self.rows.push(row);
    }

    fn is_full(&self) -> bool {
        self.rows.len() >= self.capacity
    }

    fn commit(&mut self, connection: &mut Connection) -> Result<(), ImportError> {
        let Some(sql) = codec::insert_batch_sql(self.table, self.header, &self.rows) else {
            return Ok(());
        };
        let table = self.table;
        let line = self.first_line;
        let insert_error = |source| ImportError::Insert {
            table,
            line,
            source,
        };
        let transaction = connection.transaction().map_err(insert_error)?;
        transaction.execute_batch(&sql).map_err(insert_error)?;
        transaction.commit().map_err(insert_error)?;

        let rows = u64::try_from(self.rows.len()).unwrap_or(u64::MAX);
        self.rows_committed += rows;
        self.batches_committed += 1;
        debug!(
            "committed batch {} of {table}: {rows} rows from line {line}",
            self.batches_committed
        );
        self.rows.clear();
        Ok(())
    }
}

fn store_error(
    table: &'static str,
    operation: &'static str,
) -> impl Fn(rusqlite::Error) -> ImportError {
    move |source| ImportError::Store {
        table,
        operation,
        source,
    }
}

/// Flexible byte records only fail on the underlying reader.
fn read_failure(table: &'static str, line: u64, err: csv::Error) -> ImportError {
    let source = if err.is_io_error() {
        match err.into_kind() {
            csv::ErrorKind::Io(io) => io,
            other => std::io::Error::other(format!("{other:?}")),
        }
    } else {
        std::io::Error::other(err)
    };
    ImportError::Read {
        table,
        line,
        source,
    }
}

/// Errors raised while importing a resource.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The resource could not be opened from the feed.
    #[error("failed to open resource {resource}")]
    Open {
        /// Resource name.
        resource: String,
        /// Feed failure.
        #[source]
        source: FeedError,
    },
    /// The resource bytes could not be read.
    #[error("failed to read {table} near line {line}")]
    Read {
        /// Target table.
        table: &'static str,
        /// 1-based line.
        line: u64,
        /// Reader failure.
        #[source]
        source: std::io::Error,
    },
    /// A field could not be decoded.
    #[error("invalid text in {table} at line {line}")]
    Encoding {
        /// Target table.
        table: &'static str,
        /// 1-based line.
        line: u64,
        /// Codec failure.
        #[source]
        source: CodecError,
    },
    /// The resource has no header row.
    #[error("{table} has no header row")]
    EmptyHeader {
        /// Target table.
        table: &'static str,
    },
    /// A header column name is empty.
    #[error("{table} header column {position} is blank")]
    BlankColumn {
        /// Target table.
        table: &'static str,
        /// 1-based column position.
        position: usize,
    },
    /// A header column name repeats.
    #[error("{table} header repeats column {column}")]
    DuplicateColumn {
        /// Target table.
        table: &'static str,
        /// Repeated name.
        column: String,
    },
    /// A row is wider than the header.
    #[error("{table} line {line} has {found} fields but the header has {expected}")]
    TooManyFields {
        /// Target table.
        table: &'static str,
        /// 1-based line.
        line: u64,
        /// Header width.
        expected: usize,
        /// Row width.
        found: usize,
    },
    /// The store rejected a bulk insert.
    #[error("failed to insert the batch of {table} starting at line {line}")]
    Insert {
        /// Target table.
        table: &'static str,
        /// Line of the first row in the batch.
        line: u64,
        /// Store failure.
        #[source]
        source: rusqlite::Error,
    },
    /// An index from the plan could not be created.
    #[error("failed to create index {index} on {table}")]
    Index {
        /// Target table.
        table: &'static str,
        /// Index name.
        index: &'static str,
        /// Store failure.
        #[source]
        source: rusqlite::Error,
    },
    /// Any other store statement failed.
    #[error("failed to {operation} for {table}")]
    Store {
        /// Target table.
        table: &'static str,
        /// Short description of the statement.
        operation: &'static str,
        /// Store failure.
        #[source]
        source: rusqlite::Error,
    },
}

impl ImportError {
    /// Failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Open { .. } | Self::Read { .. } => FailureKind::Acquisition,
            Self::Encoding { .. } => FailureKind::Encoding,
            Self::EmptyHeader { .. }
            | Self::BlankColumn { .. }
            | Self::DuplicateColumn { .. }
            | Self::TooManyFields { .. } => FailureKind::Schema,
            Self::Insert { .. } => FailureKind::Insert,
            Self::Index { .. } | Self::Store { .. } => FailureKind::Store,
        }
    }
}
