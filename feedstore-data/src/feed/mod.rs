//! Named tabular resources inside a feed.
//!
//! A [`FeedSource`] lists resource names and opens each as a byte reader.
//! Archives, unpacked directories and in-memory maps all implement it, so the
//! import engine never sees how the feed was packaged.

mod archive;
mod directory;
mod memory;

use std::io::{self, Read};

use camino::Utf8PathBuf;
use feedstore_core::FailureKind;
use thiserror::Error;

pub use archive::ZipFeed;
pub use directory::DirectoryFeed;
pub use memory::MemoryFeed;

/// A packaged set of named resources.
pub trait FeedSource {
    /// Resource names in feed order.
    fn resource_names(&self) -> Vec<String>;

    /// Open the resource called `name` for reading.
    fn open(&mut self, name: &str) -> Result<Box<dyn Read + '_>, FeedError>;
}

impl<F: FeedSource + ?Sized> FeedSource for Box<F> {
    fn resource_names(&self) -> Vec<String> {
        (**self).resource_names()
    }

    fn open(&mut self, name: &str) -> Result<Box<dyn Read + '_>, FeedError> {
        (**self).open(name)
    }
}

/// Errors raised while listing or opening feed resources.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The archive could not be read.
    #[error("failed to read feed archive")]
    Archive {
        /// Archive failure.
        #[source]
        source: zip::result::ZipError,
    },
    /// An archive entry could not be opened.
    #[error("failed to open archive entry {name}")]
    ArchiveEntry {
        /// Resource name.
        name: String,
        /// Archive failure.
        #[source]
        source: zip::result::ZipError,
    },
    /// The feed directory could not be listed.
    #[error("failed to list feed directory {path}")]
    Directory {
        /// Directory location.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },
    /// A resource file could not be opened.
    #[error("failed to open resource {name}")]
    Resource {
        /// Resource name.
        name: String,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },
    /// The feed has no resource with this name.
    #[error("feed has no resource named {name}")]
    Missing {
        /// Requested name.
        name: String,
    },
}

impl FeedError {
    /// Failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        FailureKind::Acquisition
    }
}

#[cfg(test)]
mod tests;
