//! Core domain types for feedstore.
//!
//! The crate stays free of any storage engine. It describes which feed
//! resources are recognised and how each kind is indexed, the string-valued
//! [`Record`] used when rows leave the store, the geometry encoding shared by
//! every derived table, and the agency identity keys that select cleanup
//! rules.
#![forbid(unsafe_code)]

mod agency;
mod failure;
pub mod geometry;
mod record;
mod resource;

pub use agency::agency_key;
pub use failure::FailureKind;
pub use geometry::{GeometryError, GeometryType, Srid, WGS84};
pub use record::Record;
pub use resource::{IndexSpec, KindProfile, ResourceKind};
