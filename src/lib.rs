//! Facade crate for feedstore.
//!
//! This crate re-exports the core domain types and, behind the
//! `store-sqlite` feature, the SQLite-backed import pipeline.

#![forbid(unsafe_code)]

pub use feedstore_core::{
    FailureKind, GeometryError, GeometryType, IndexSpec, KindProfile, Record, ResourceKind, Srid,
    WGS84, agency_key,
};

#[cfg(feature = "store-sqlite")]
pub use feedstore_data::{
    FeedLocation, FeedSource, FeedStore, PipelineError, PipelineOptions, PipelineReport, Stage,
    StoreError, StoreOptions, acquire, run_pipeline,
};
