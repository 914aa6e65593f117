//! Classification shared by every pipeline error.

use std::fmt;

/// Kind of a fatal pipeline failure.
///
/// Every component error maps onto one of these so callers can react to the
/// class of failure without matching on component-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The feed archive could not be fetched or unpacked.
    Acquisition,
    /// Feed text was not valid UTF-8 or could not be embedded in a statement.
    Encoding,
    /// A resource header or row shape was unusable.
    Schema,
    /// The store rejected a bulk insert.
    Insert,
    /// Spatial derivation ran without the geometry extension.
    ExtensionUnavailable,
    /// A derived table did not hold the expected number of rows.
    Consistency,
    /// A cleanup rule found no candidate for a defect.
    Match,
    /// Any other store failure (introspection, transactions, indexes).
    Store,
}

impl FailureKind {
    /// Stable identifier for logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Acquisition => "acquisition",
            Self::Encoding => "encoding",
            Self::Schema => "schema",
            Self::Insert => "insert",
            Self::ExtensionUnavailable => "extension-unavailable",
            Self::Consistency => "consistency",
            Self::Match => "match",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
