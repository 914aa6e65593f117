//! Storage and ingestion for feedstore.
//!
//! Responsibilities:
//! - Read packaged feeds from archives, directories or memory.
//! - Import every recognised resource into an all-text SQLite table.
//! - Repair known agency-specific defects and derive geometry tables.
//!
//! Boundaries:
//! - Domain vocabulary (resource kinds, geometry encoding, agency keys) lives
//!   in `feedstore-core`.
//! - All I/O is blocking; the HTTP fetcher drives its own runtime.
//!
//! Invariants:
//! - A checkpoint row exists only for tables whose every row committed.
//! - No global mutable state; the store handle is passed explicitly.
#![forbid(unsafe_code)]

pub mod acquire;
pub mod clean;
pub mod feed;
pub mod import;
pub mod pipeline;
pub mod spatial;
pub mod store;

pub use acquire::{AcquireError, FeedLocation, acquire};
pub use clean::{CleanupError, CleanupReport, run_cleanup};
pub use feed::{DirectoryFeed, FeedError, FeedSource, MemoryFeed, ZipFeed};
pub use import::{ImportError, ImportOptions, ImportOutcome, TableImport, import_feed, import_resource};
pub use pipeline::{PipelineError, PipelineOptions, PipelineReport, Stage, StageError, run_pipeline};
pub use spatial::{SpatialError, SpatialReport, derive_spatial};
pub use store::{Checkpoint, FeedStore, StoreError, StoreOptions};
