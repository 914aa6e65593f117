//! Index plans applied once a resource's import completes.

use feedstore_core::{IndexSpec, ResourceKind};
use log::debug;
use rusqlite::Connection;

use super::codec::quote_identifier;

/// Build the `CREATE INDEX` statement for `spec` on `table`.
#[must_use]
pub fn create_index_sql(table: &str, spec: &IndexSpec) -> String {
    let unique = if spec.unique { "UNIQUE " } else { "" };
    let columns = spec
        .columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE {unique}INDEX IF NOT EXISTS {} ON {} ({columns})",
        quote_identifier(spec.name),
        quote_identifier(table)
    )
}

/// Apply the index plan of `kind` to its freshly imported table.
///
/// Indexes over columns missing from `header` are skipped. Returns the names
/// of the indexes created; the first failing statement stops the plan.
pub(crate) fn apply_index_plan(
    connection: &Connection,
    kind: ResourceKind,
    header: &[String],
) -> Result<Vec<&'static str>, (&'static str, rusqlite::Error)> {
    let table = kind.table_name();
    let mut created = Vec::new();
    for spec in kind.index_plan() {
        if !spec.is_covered_by(header) {
            debug!("skipping index {} on {table}: columns absent", spec.name);
            continue;
        }
        connection
            .execute_batch(&create_index_sql(table, spec))
            .map_err(|source| (spec.name, source))?;
        created.push(spec.name);
    }
    Ok(created)
}
