//! Canonical tracking records and the builder that produces them.

pub mod builder;
pub mod types;

pub use builder::{BuildOptions, TrackingResultBuilder};
pub use types::*;
