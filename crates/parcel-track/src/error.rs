//! Error types for tracking lookups.

use crate::result::TrackingIdentity;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Everything that can go wrong while tracking a reference.
///
/// Payloads are plain strings so one failure can be handed to every caller
/// waiting on the same shared lookup.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TrackError {
    /// No courier claims the reference.
    #[error("Couldn't identify tracking number: {0}")]
    Unidentified(String),

    /// The courier endpoint answered with a non-success HTTP status.
    #[error("Bad status code: {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Transport failure or a response the adapter could not make sense of.
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// The courier returned no events for the parcel.
    #[error("No tracking history")]
    EmptyHistory(Box<TrackingIdentity>),

    /// A native status code with no canonical mapping.
    #[error("Unrecognised status code: {code} : {description}")]
    UnrecognizedStatus { code: String, description: String },

    /// A batch request produced nothing at all.
    #[error("No results returned")]
    NoResults,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TrackError {
    /// Stable machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            TrackError::Unidentified(_) => "identification",
            TrackError::HttpStatus { .. } | TrackError::Fetch(_) => "fetch",
            TrackError::EmptyHistory(_) => "empty_history",
            TrackError::UnrecognizedStatus { .. } => "unrecognized_status",
            TrackError::NoResults => "no_results",
            TrackError::Config(_) => "config",
        }
    }

    /// Partially built identity attached to an empty-history failure.
    pub fn partial_result(&self) -> Option<&TrackingIdentity> {
        match self {
            TrackError::EmptyHistory(identity) => Some(identity),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TrackError {
    fn from(e: reqwest::Error) -> Self {
        TrackError::Fetch(e.to_string())
    }
}

impl From<serde_json::Error> for TrackError {
    fn from(e: serde_json::Error) -> Self {
        TrackError::Fetch(format!("malformed JSON response: {e}"))
    }
}

impl From<quick_xml::Error> for TrackError {
    fn from(e: quick_xml::Error) -> Self {
        TrackError::Fetch(format!("malformed XML response: {e}"))
    }
}

impl Serialize for TrackError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let partial = self.partial_result();
        let len = if partial.is_some() { 3 } else { 2 };
        let mut state = serializer.serialize_struct("TrackError", len)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        if let Some(identity) = partial {
            state.serialize_field("partial", identity)?;
        }
        state.end()
    }
}

pub type TrackResult<T> = Result<T, TrackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_variants_share_kind() {
        let status = TrackError::HttpStatus {
            status: 503,
            url: "http://example.test".into(),
        };
        assert_eq!(status.kind(), "fetch");
        assert_eq!(TrackError::Fetch("boom".into()).kind(), "fetch");
    }

    #[test]
    fn test_empty_history_carries_partial_record() {
        let identity = TrackingIdentity::new("ups", "1Z0000000000000000");
        let err = TrackError::EmptyHistory(Box::new(identity.clone()));
        assert_eq!(err.partial_result(), Some(&identity));
        assert_eq!(err.to_string(), "No tracking history");
    }

    #[test]
    fn test_serialized_entry_keeps_partial_record() {
        let identity = TrackingIdentity::new("truline", "04123456781234567");
        let json = serde_json::to_value(TrackError::EmptyHistory(Box::new(identity))).unwrap();
        assert_eq!(json["kind"], "empty_history");
        assert_eq!(json["partial"]["courier"], "truline");
        assert_eq!(json["partial"]["tracking_ref"], "04123456781234567");

        let json = serde_json::to_value(TrackError::NoResults).unwrap();
        assert!(json.get("partial").is_none());
    }

    #[test]
    fn test_unrecognized_message() {
        let err = TrackError::UnrecognizedStatus {
            code: "QQ".into(),
            description: "Mystery scan".into(),
        };
        assert_eq!(err.to_string(), "Unrecognised status code: QQ : Mystery scan");
    }
}
