//! Canonical tracking record shapes.

use crate::error::TrackError;
use crate::status::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder used for descriptions and locations a courier did not supply.
pub const UNKNOWN: &str = "Unknown";

/// One scan or status change reported by a courier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub status_code: StatusCode,
    pub description: String,
    pub location: String,
    pub pod_signatory: Option<String>,
    pub pod_image_url: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub comments: Option<String>,
}

impl Default for HistoryEvent {
    fn default() -> Self {
        Self {
            status_code: StatusCode::Unknown,
            description: UNKNOWN.to_string(),
            location: UNKNOWN.to_string(),
            pod_signatory: None,
            pod_image_url: None,
            date: None,
            comments: None,
        }
    }
}

impl HistoryEvent {
    /// Event with the given status and description; everything else defaulted.
    pub fn new(status_code: StatusCode, description: impl Into<String>) -> Self {
        Self {
            status_code,
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.date = date;
        self
    }

    /// Set the location, keeping the `Unknown` default for blank input.
    pub fn located(mut self, location: impl Into<String>) -> Self {
        let location = location.into();
        if !location.trim().is_empty() {
            self.location = location;
        }
        self
    }

    pub fn signed_by(mut self, signatory: Option<String>) -> Self {
        self.pod_signatory = signatory.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_pod_image(mut self, url: Option<String>) -> Self {
        self.pod_image_url = url.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_comments(mut self, comments: Option<String>) -> Self {
        self.comments = comments;
        self
    }
}

/// Identity of one physical parcel, independent of its history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingIdentity {
    pub courier: Option<String>,
    pub service: Option<String>,
    pub tracking_ref: Option<String>,
    pub dispatch_ref: Option<String>,
    pub consignment_ref: Option<String>,
    pub parcel_ref: Option<String>,
    pub po_number: Option<String>,
    pub dest_postal_code: Option<String>,
    pub dest_country_code: Option<String>,
}

impl TrackingIdentity {
    /// Identity for `tracking_ref` handled by `courier`.
    pub fn new(courier: &str, tracking_ref: &str) -> Self {
        Self {
            courier: Some(courier.to_string()),
            tracking_ref: Some(tracking_ref.to_string()),
            ..Default::default()
        }
    }
}

/// Canonical per-parcel result: identity plus the latest event promoted to
/// the top level, and optionally the earlier events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingResult {
    #[serde(flatten)]
    pub identity: TrackingIdentity,
    #[serde(flatten)]
    pub latest: HistoryEvent,
    /// Events before `latest`, oldest first. Present only when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEvent>>,
}

impl TrackingResult {
    pub fn tracking_ref(&self) -> Option<&str> {
        self.identity.tracking_ref.as_deref()
    }

    pub fn status(&self) -> StatusCode {
        self.latest.status_code
    }
}

/// Caller options for a tracking request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackOptions {
    /// Return every event, not only the latest.
    pub history: bool,
}

/// Per-reference failure carried inside a batch response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackFailure {
    pub tracking_ref: String,
    pub error: TrackError,
}

/// One element of a batch response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrackOutcome {
    Found(TrackingResult),
    Failed(TrackFailure),
}

impl TrackOutcome {
    pub fn failed(tracking_ref: impl Into<String>, error: TrackError) -> Self {
        TrackOutcome::Failed(TrackFailure {
            tracking_ref: tracking_ref.into(),
            error,
        })
    }

    /// Reference this outcome belongs to, for correlating batch output.
    pub fn tracking_ref(&self) -> Option<&str> {
        match self {
            TrackOutcome::Found(result) => result.tracking_ref(),
            TrackOutcome::Failed(failure) => Some(&failure.tracking_ref),
        }
    }

    pub fn is_err(&self) -> bool {
        matches!(self, TrackOutcome::Failed(_))
    }

    pub fn into_result(self) -> Result<TrackingResult, TrackError> {
        match self {
            TrackOutcome::Found(result) => Ok(result),
            TrackOutcome::Failed(failure) => Err(failure.error),
        }
    }
}
