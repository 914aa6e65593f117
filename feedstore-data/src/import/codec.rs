//! Value codec for bulk statements.
//!
//! Feed fields are embedded directly in multi-row `INSERT` statements, so
//! every value passes through here: bytes are validated as UTF-8 without
//! interior NUL characters, trimmed, and quoted as SQL string literals.

use std::str::Utf8Error;

use thiserror::Error;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Reasons a field cannot be embedded in a statement.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The field bytes are not UTF-8.
    #[error("field {field} is not valid UTF-8")]
    InvalidUtf8 {
        /// 1-based field position.
        field: usize,
        /// Decoder failure.
        #[source]
        source: Utf8Error,
    },
    /// The field holds a NUL character, which statement text cannot carry.
    #[error("field {field} contains a NUL character")]
    NulCharacter {
        /// 1-based field position.
        field: usize,
    },
}

/// Decode one raw field into trimmed text.
///
/// `field` is the 1-based position reported on failure.
pub fn decode_field(bytes: &[u8], field: usize) -> Result<String, CodecError> {
    let text = std::str::from_utf8(bytes).map_err(|source| CodecError::InvalidUtf8 { field, source })?;
    if text.contains('\0') {
        return Err(CodecError::NulCharacter { field });
    }
    Ok(text.trim().to_owned())
}

/// Decode a header record, dropping a leading byte-order mark.
pub fn decode_header<'a, I>(fields: I) -> Result<Vec<String>, CodecError>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    fields
        .into_iter()
        .enumerate()
        .map(|(index, bytes)| {
            let position = index + 1;
            let decoded = decode_field(bytes, position)?;
            if index == 0 {
                Ok(decoded.trim_start_matches(BYTE_ORDER_MARK).trim().to_owned())
            } else {
                Ok(decoded)
            }
        })
        .collect()
}

/// Quote `name` as an SQL identifier.
///
/// # Examples
/// ```
/// use feedstore_data::import::codec::quote_identifier;
///
/// assert_eq!(quote_identifier("stop_id"), "\"stop_id\"");
/// assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
/// ```
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote `value` as an SQL string literal.
///
/// # Examples
/// ```
/// use feedstore_data::import::codec::quote_literal;
///
/// assert_eq!(quote_literal("O'Connell St"), "'O''Connell St'");
/// ```
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Build the `CREATE TABLE` statement for an all-text table.
#[must_use]
pub fn create_table_sql(table: &str, columns: &[String]) -> String {
    let columns = columns
        .iter()
        .map(|column| format!("{} TEXT", quote_identifier(column)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({columns})", quote_identifier(table))
}

/// Build one multi-row `INSERT` for `rows`, each already padded to the
/// header width.
///
/// Returns `None` for an empty batch.
#[must_use]
pub fn insert_batch_sql(table: &str, columns: &[String], rows: &[Vec<String>]) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let column_list = columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    let values = rows
        .iter()
        .map(|row| {
            let literals = row
                .iter()
                .map(|value| quote_literal(value))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({literals})")
        })
        .collect::<Vec<_>>()
        .join(",\n");
    Some(format!(
        "INSERT INTO {} ({column_list}) VALUES\n{values}",
        quote_identifier(table)
    ))
}
