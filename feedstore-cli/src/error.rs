//! Error types emitted by the feedstore CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use feedstore_core::FailureKind;
use feedstore_data::{PipelineError, StoreError};
use thiserror::Error;

/// Errors emitted by the feedstore CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required value is missing after configuration merging.
    #[error("missing {field} (pass it on the command line or set {env})")]
    MissingArgument {
        /// Argument name.
        field: &'static str,
        /// Environment variable that can supply it.
        env: &'static str,
    },
    /// A fresh build would overwrite an existing store.
    #[error("output {path:?} already exists (pass --resume to continue it)")]
    OutputExists {
        /// Existing output path.
        path: Utf8PathBuf,
    },
    /// The output path could not be inspected.
    #[error("failed to inspect output path {path:?}: {source}")]
    InspectOutput {
        /// Output path.
        path: Utf8PathBuf,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// Opening the working store failed.
    #[error("failed to open store for {path:?}: {source}")]
    OpenStore {
        /// Output path the store belongs to.
        path: Utf8PathBuf,
        /// Store failure.
        #[source]
        source: StoreError,
    },
    /// A pipeline stage failed.
    #[error(transparent)]
    Pipeline(Box<PipelineError>),
    /// Serializing the run report failed.
    #[error("failed to serialize run report: {0}")]
    SerializeReport(#[source] serde_json::Error),
    /// Writing the run report failed.
    #[error("failed to write run report: {0}")]
    WriteReport(#[source] std::io::Error),
}

impl CliError {
    /// Failure classification, for errors raised by a pipeline stage.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Pipeline(err) => Some(err.kind()),
            Self::OpenStore { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(Box::new(err))
    }
}
