//! Run orchestration: import, cleanup and spatial derivation in order.
//!
//! Acquisition and snapshotting stay with the caller, which owns the
//! [`FeedSource`] and the [`FeedStore`]. A run either returns a
//! [`PipelineReport`] or stops at the first failure, tagged with its
//! [`Stage`].

use std::fmt;

use feedstore_core::{FailureKind, ResourceKind};
use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::acquire::AcquireError;
use crate::clean::{CleanupError, CleanupReport, run_cleanup};
use crate::feed::FeedSource;
use crate::import::{ImportError, ImportOptions, TableImport, import_feed};
use crate::spatial::{SpatialError, SpatialReport, derive_spatial};
use crate::store::{FeedStore, StoreError};

/// Stages a run passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fetching and unpacking the feed.
    Acquire,
    /// Batch import of every resource.
    Import,
    /// Agency-specific repairs.
    Clean,
    /// Derived geometry tables.
    Spatial,
    /// Writing the finished store.
    Snapshot,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Acquire => "acquire",
            Self::Import => "import",
            Self::Clean => "clean",
            Self::Spatial => "spatial",
            Self::Snapshot => "snapshot",
        })
    }
}

/// What a run should do besides importing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Import behaviour.
    pub import: ImportOptions,
    /// Run agency cleanup rules.
    pub clean: bool,
    /// Build derived geometry tables.
    pub spatial: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            import: ImportOptions::default(),
            clean: true,
            spatial: false,
        }
    }
}

/// Everything a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Per-table import outcomes, in feed order.
    pub imports: Vec<TableImport>,
    /// Required resources the feed did not provide.
    pub missing_required: Vec<String>,
    /// Cleanup summary, when cleanup ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupReport>,
    /// Spatial summary, when derivation ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spatial: Option<SpatialReport>,
}

/// Import `feed` into `store`, then clean and derive as configured.
///
/// # Examples
/// ```
/// use feedstore_data::pipeline::{PipelineOptions, run_pipeline};
/// use feedstore_data::{FeedStore, MemoryFeed, StoreOptions};
///
/// let mut store = FeedStore::open_in_memory(StoreOptions::default()).expect("open store");
/// let mut feed = MemoryFeed::new()
///     .with_resource("stops.txt", "stop_id,stop_name\nS1,Main St\n")
///     .with_resource("readme.txt", "not a table");
/// let report = run_pipeline(&mut store, &mut feed, &PipelineOptions::default()).expect("run");
/// assert_eq!(report.imports.len(), 1);
/// assert!(report.missing_required.contains(&"agency.txt".to_owned()));
/// ```
pub fn run_pipeline<F>(
    store: &mut FeedStore,
    feed: &mut F,
    options: &PipelineOptions,
) -> Result<PipelineReport, PipelineError>
where
    F: FeedSource + ?Sized,
{
    let missing = missing_required(&feed.resource_names());
    for name in &missing {
        warn!("feed is missing required resource {name}");
    }

    info!("importing feed resources");
    let imports = import_feed(store, feed, &options.import)
        .map_err(|source| PipelineError::new(Stage::Import, StageError::Import(source)))?;

    let cleanup = if options.clean {
        info!("running cleanup rules");
        let report = run_cleanup(store)
            .map_err(|source| PipelineError::new(Stage::Clean, StageError::Clean(source)))?;
        Some(report)
    } else {
        None
    };

    let spatial = if options.spatial {
        info!("deriving geometry tables");
        let report = derive_spatial(store)
            .map_err(|source| PipelineError::new(Stage::Spatial, StageError::Spatial(source)))?;
        Some(report)
    } else {
        None
    };

    Ok(PipelineReport {
        imports,
        missing_required: missing,
        cleanup,
        spatial,
    })
}

/// Required resource names absent from `names`.
#[must_use]
pub fn missing_required(names: &[String]) -> Vec<String> {
    ResourceKind::ALL
        .into_iter()
        .filter(|kind| kind.is_required())
        .map(ResourceKind::resource_name)
        .filter(|required| !names.contains(required))
        .collect()
}

/// Failure of one pipeline stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// Acquisition failure.
    #[error(transparent)]
    Acquire(AcquireError),
    /// Import failure.
    #[error(transparent)]
    Import(ImportError),
    /// Cleanup failure.
    #[error(transparent)]
    Clean(CleanupError),
    /// Spatial derivation failure.
    #[error(transparent)]
    Spatial(SpatialError),
    /// Store failure while opening or snapshotting.
    #[error(transparent)]
    Store(StoreError),
}

impl StageError {
    /// Failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Acquire(err) => err.kind(),
            Self::Import(err) => err.kind(),
            Self::Clean(err) => err.kind(),
            Self::Spatial(err) => err.kind(),
            Self::Store(err) => err.kind(),
        }
    }
}

/// The terminal failure of a run.
#[derive(Debug, Error)]
#[error("{stage} stage failed ({}): {source}", .source.kind())]
pub struct PipelineError {
    /// Stage that failed.
    pub stage: Stage,
    /// What went wrong.
    #[source]
    pub source: StageError,
}

impl PipelineError {
    /// Tag `source` with the stage it came from.
    #[must_use]
    pub const fn new(stage: Stage, source: StageError) -> Self {
        Self { stage, source }
    }

    /// Failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.source.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::MemoryFeed;
    use crate::store::StoreOptions;
    use rstest::rstest;

    #[rstest]
    fn reports_missing_required_resources() {
        let names = vec!["agency.txt".to_owned(), "stops.txt".to_owned()];
        assert_eq!(
            missing_required(&names),
            vec![
                "routes.txt".to_owned(),
                "trips.txt".to_owned(),
                "stop_times.txt".to_owned(),
                "calendar.txt".to_owned()
            ]
        );
    }

    #[rstest]
    fn import_failure_names_its_stage() {
        let mut store = FeedStore::open_in_memory(StoreOptions::default()).expect("open store");
        let mut feed = MemoryFeed::new().with_resource("stops.txt", "stop_id,stop_id\nS1,S1\n");
        let err = run_pipeline(&mut store, &mut feed, &PipelineOptions::default())
            .expect_err("duplicate column");
        assert_eq!(err.stage, Stage::Import);
        assert_eq!(err.kind(), FailureKind::Schema);
        assert!(err.to_string().starts_with("import stage failed (schema)"));
    }

    #[rstest]
    fn spatial_stage_requires_extension() {
        let mut store = FeedStore::open_in_memory(StoreOptions::default()).expect("open store");
        let mut feed = MemoryFeed::new();
        let options = PipelineOptions {
            spatial: true,
            ..PipelineOptions::default()
        };
        let err = run_pipeline(&mut store, &mut feed, &options).expect_err("no extension");
        assert_eq!(err.stage, Stage::Spatial);
        assert_eq!(err.kind(), FailureKind::ExtensionUnavailable);
    }

    #[rstest]
    fn skips_optional_stages() {
        let mut store = FeedStore::open_in_memory(StoreOptions::default()).expect("open store");
        let mut feed = MemoryFeed::new().with_resource("agency.txt", "agency_name\nMetro\n");
        let options = PipelineOptions {
            clean: false,
            ..PipelineOptions::default()
        };
        let report = run_pipeline(&mut store, &mut feed, &options).expect("run");
        assert!(report.cleanup.is_none());
        assert!(report.spatial.is_none());
        let json = serde_json::to_value(&report).expect("serialise");
        assert_eq!(json["imports"][0]["table"], "agency");
        assert_eq!(json["imports"][0]["status"], "imported");
    }
}
