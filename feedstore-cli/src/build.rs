//! The `build` command: acquire a feed and run the pipeline into a store.

use camino::Utf8PathBuf;
use feedstore_data::{
    FeedLocation, FeedStore, ImportOptions, PipelineError, PipelineOptions, PipelineReport, Stage,
    StageError, StoreOptions, acquire, run_pipeline,
};
use log::info;

use crate::CliError;

/// Validated settings for one `build` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Feed URL, archive path or directory.
    pub feed: String,
    /// Store file written by the run.
    pub output: Utf8PathBuf,
    /// Reopen `output` and skip checkpointed tables.
    pub resume: bool,
    /// Build the derived geometry tables.
    pub spatial: bool,
    /// Run agency cleanup rules.
    pub clean: bool,
}

impl BuildConfig {
    const fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            import: ImportOptions::new(self.resume),
            clean: self.clean,
            spatial: self.spatial,
        }
    }

    const fn store_options(&self) -> StoreOptions {
        StoreOptions {
            spatial: self.spatial,
        }
    }
}

/// Run the whole build described by `config`.
///
/// A fresh build runs in memory and is snapshotted to `config.output`, which
/// must not exist yet. A resumed build works on `config.output` directly.
pub fn build_feed(config: &BuildConfig) -> Result<PipelineReport, CliError> {
    let location = FeedLocation::resolve(&config.feed)
        .map_err(|source| PipelineError::new(Stage::Acquire, StageError::Acquire(source)))?;
    let exists = feedstore_fs::path_exists(&config.output).map_err(|source| {
        CliError::InspectOutput {
            path: config.output.clone(),
            source,
        }
    })?;
    if exists && !config.resume {
        return Err(CliError::OutputExists {
            path: config.output.clone(),
        });
    }

    let mut store = if config.resume {
        FeedStore::open(&config.output, config.store_options())
    } else {
        FeedStore::open_in_memory(config.store_options())
    }
    .map_err(|source| CliError::OpenStore {
        path: config.output.clone(),
        source,
    })?;

    info!("acquiring feed from {location}");
    let mut feed = acquire(&location)
        .map_err(|source| PipelineError::new(Stage::Acquire, StageError::Acquire(source)))?;
    let report = run_pipeline(&mut store, feed.as_mut(), &config.pipeline_options())?;

    if !config.resume {
        store
            .snapshot_to(&config.output)
            .map_err(|source| PipelineError::new(Stage::Snapshot, StageError::Store(source)))?;
    }
    info!("feed store ready at {}", config.output);
    Ok(report)
}
