//! Canonical status taxonomy shared by every courier adapter.
//!
//! Adapters keep their own native vocabularies private and map them onto
//! [`StatusCode`]. An adapter must refuse a native code it does not know
//! (see [`TrackError::UnrecognizedStatus`]) instead of guessing.
//!
//! [`TrackError::UnrecognizedStatus`]: crate::error::TrackError::UnrecognizedStatus

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical tracking status.
///
/// Serialized as the single-letter codes `M`, `I`, `D`, `X` and `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StatusCode {
    /// Shipment details received, parcel not yet handed over.
    #[serde(rename = "M")]
    Manifested,
    /// Moving through the courier network.
    #[serde(rename = "I")]
    InTransit,
    /// Handed to the recipient.
    #[serde(rename = "D")]
    Delivered,
    /// Delivery problem: failed attempt, damage, return.
    #[serde(rename = "X")]
    Exception,
    #[default]
    #[serde(rename = "?")]
    Unknown,
}

impl StatusCode {
    const ALL: [StatusCode; 5] = [
        StatusCode::Manifested,
        StatusCode::InTransit,
        StatusCode::Delivered,
        StatusCode::Exception,
        StatusCode::Unknown,
    ];

    /// Single-letter wire code.
    pub fn as_code(&self) -> &'static str {
        match self {
            StatusCode::Manifested => "M",
            StatusCode::InTransit => "I",
            StatusCode::Delivered => "D",
            StatusCode::Exception => "X",
            StatusCode::Unknown => "?",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Manifested => "manifested",
            StatusCode::InTransit => "in transit",
            StatusCode::Delivered => "delivered",
            StatusCode::Exception => "exception",
            StatusCode::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl FromStr for StatusCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatusCode::ALL
            .into_iter()
            .find(|code| code.as_code() == s)
            .ok_or_else(|| format!("not a canonical status code: {s}"))
    }
}
