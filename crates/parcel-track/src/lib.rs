//! parcel-track: look up parcel references across several couriers and
//! normalize every courier's scan history into one record shape.

pub mod config;
pub mod couriers;
pub mod dates;
pub mod error;
pub mod executor;
pub mod http_client;
pub mod result;
pub mod single_flight;
pub mod status;
pub mod tracker;

pub use config::TrackerConfig;
pub use couriers::{Courier, CourierAdapter};
pub use error::{TrackError, TrackResult};
pub use executor::Executor;
pub use result::{
    BuildOptions, HistoryEvent, TrackFailure, TrackOptions, TrackOutcome, TrackingIdentity,
    TrackingResult, TrackingResultBuilder,
};
pub use single_flight::SingleFlightCache;
pub use status::StatusCode;
pub use tracker::{TrackInput, TrackResponse, Tracker};
