//! String-valued rows keyed by column name.

/// An ordered record of `(column, value)` pairs.
///
/// Every value stays a string while it lives in the store; conversion to
/// native types happens only where a row is serialised.
///
/// # Examples
/// ```
/// use feedstore_core::Record;
///
/// let record = Record::from_row(&["stop_id", "stop_name", "stop_lat"], &["S1", "Main St"]);
/// assert_eq!(record.get("stop_name"), Some("Main St"));
/// assert_eq!(record.get("stop_lat"), Some(""));
/// assert_eq!(record.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    /// Pair `header` with `row`, padding missing trailing values with `""`.
    ///
    /// Values beyond the header width are ignored.
    #[must_use]
    pub fn from_row<H, V>(header: &[H], row: &[V]) -> Self
    where
        H: AsRef<str>,
        V: AsRef<str>,
    {
        let mut values = row.iter().map(AsRef::as_ref);
        let fields = header
            .iter()
            .map(|column| {
                let value = values.next().unwrap_or_default();
                (column.as_ref().to_owned(), value.to_owned())
            })
            .collect();
        Self { fields }
    }

    /// Append a column.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.push((column.into(), value.into()));
    }

    /// Value of the first column named `column`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Iterate `(column, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Consume the record, returning its values in column order.
    #[must_use]
    pub fn into_values(self) -> Vec<String> {
        self.fields.into_iter().map(|(_, value)| value).collect()
    }
}

impl FromIterator<(String, String)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
