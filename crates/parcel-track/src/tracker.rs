//! Aggregation across couriers.
//!
//! One pass per request:
//!
//! 1. classify each reference by the first courier whose pattern matches;
//! 2. shuffle and group the matched references by courier;
//! 3. run every courier's batch concurrently;
//! 4. concatenate the courier outputs, then the unidentified references;
//! 5. shape the response for single or batch input.
//!
//! Batch output does not follow input order. Correlate elements through
//! their `tracking_ref`.

use crate::config::TrackerConfig;
use crate::couriers::{Courier, TrulineCourier, UpsCourier, YodelCourier};
use crate::error::{TrackError, TrackResult};
use crate::http_client::HttpClient;
use crate::result::{TrackOptions, TrackOutcome, TrackingResult};
use rand::seq::SliceRandom;
use serde::Serialize;

/// A tracking request: one reference or a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackInput {
    Single(String),
    Batch(Vec<String>),
}

impl TrackInput {
    fn references(&self) -> Vec<String> {
        match self {
            TrackInput::Single(reference) => vec![reference.clone()],
            TrackInput::Batch(references) => references.clone(),
        }
    }
}

impl From<&str> for TrackInput {
    fn from(reference: &str) -> Self {
        TrackInput::Single(reference.to_string())
    }
}

impl From<Vec<String>> for TrackInput {
    fn from(references: Vec<String>) -> Self {
        TrackInput::Batch(references)
    }
}

/// Response shaped after the input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrackResponse {
    Single(TrackingResult),
    Batch(Vec<TrackOutcome>),
}

/// Routes references to couriers and merges what they return.
#[derive(Debug)]
pub struct Tracker {
    couriers: Vec<Courier>,
}

impl Tracker {
    /// Build the standard courier set (UPS, Truline, Yodel, in that order).
    pub fn from_config(config: &TrackerConfig) -> TrackResult<Self> {
        config.validate()?;
        let http = HttpClient::new(config.http_timeout_ms);
        Ok(Self::with_couriers(vec![
            Courier::Ups(UpsCourier::new(&config.ups, http.clone())),
            Courier::Truline(TrulineCourier::new(&config.truline, http.clone())),
            Courier::Yodel(YodelCourier::new(&config.yodel, http)),
        ]))
    }

    /// Use an explicit courier set. Earlier couriers win when patterns overlap.
    pub fn with_couriers(couriers: Vec<Courier>) -> Self {
        Self { couriers }
    }

    /// Name of the courier that owns `reference`, without fetching anything.
    pub fn identify(&self, reference: &str) -> Option<&'static str> {
        self.classify(reference).map(|i| self.couriers[i].name())
    }

    fn classify(&self, reference: &str) -> Option<usize> {
        self.couriers.iter().position(|c| c.matches(reference))
    }

    /// Track one reference; any per-reference failure is returned as the error.
    pub async fn track_one(
        &self,
        reference: &str,
        options: TrackOptions,
    ) -> TrackResult<TrackingResult> {
        match self.track(TrackInput::from(reference), options).await? {
            TrackResponse::Single(result) => Ok(result),
            TrackResponse::Batch(_) => Err(TrackError::NoResults),
        }
    }

    /// Track a batch; per-reference failures are entries in the output.
    pub async fn track_many(
        &self,
        references: &[String],
        options: TrackOptions,
    ) -> TrackResult<Vec<TrackOutcome>> {
        match self.track(TrackInput::Batch(references.to_vec()), options).await? {
            TrackResponse::Batch(outcomes) => Ok(outcomes),
            TrackResponse::Single(result) => Ok(vec![TrackOutcome::Found(result)]),
        }
    }

    /// Track a single reference or a batch.
    pub async fn track(&self, input: TrackInput, options: TrackOptions) -> TrackResult<TrackResponse> {
        let mut refs: Vec<(String, Option<usize>)> = input
            .references()
            .into_iter()
            .map(|reference| {
                let courier = self.classify(&reference);
                (reference, courier)
            })
            .collect();

        refs.shuffle(&mut rand::thread_rng());

        let mut groups: Vec<Vec<String>> = vec![Vec::new(); self.couriers.len()];
        let mut unidentified = Vec::new();
        for (reference, courier) in refs {
            match courier {
                Some(i) => groups[i].push(reference),
                None => {
                    let error = TrackError::Unidentified(reference.clone());
                    unidentified.push(TrackOutcome::failed(reference, error));
                }
            }
        }

        let batches = self
            .couriers
            .iter()
            .zip(&groups)
            .filter(|(_, group)| !group.is_empty())
            .map(|(courier, group)| courier.track(group, options));
        let mut results: Vec<TrackOutcome> = futures::future::join_all(batches)
            .await
            .into_iter()
            .flatten()
            .collect();
        results.extend(unidentified);

        let failed = results.iter().filter(|o| o.is_err()).count();
        tracing::info!(
            total = results.len(),
            failed,
            history = options.history,
            "tracking request complete"
        );

        match input {
            TrackInput::Batch(_) => {
                if results.is_empty() {
                    return Err(TrackError::NoResults);
                }
                Ok(TrackResponse::Batch(results))
            }
            TrackInput::Single(_) => {
                let outcome = results.into_iter().next().ok_or(TrackError::NoResults)?;
                Ok(TrackResponse::Single(outcome.into_result()?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> Tracker {
        Tracker::from_config(&TrackerConfig::default()).unwrap()
    }

    #[test]
    fn test_identify() {
        let tracker = tracker();
        assert_eq!(tracker.identify("1Z999AA10123456784"), Some("ups"));
        assert_eq!(tracker.identify("JD0000900581234567"), Some("yodel"));
        assert_eq!(tracker.identify("hello"), None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = TrackerConfig::default();
        config.ups.concurrency = 0;
        assert!(Tracker::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_single_unidentified_fails() {
        let err = tracker()
            .track_one("NOT-A-PARCEL", TrackOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, TrackError::Unidentified("NOT-A-PARCEL".into()));
    }

    #[tokio::test]
    async fn test_empty_batch_fails() {
        let err = tracker()
            .track_many(&[], TrackOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, TrackError::NoResults);
    }

    #[tokio::test]
    async fn test_batch_of_unidentified_is_not_an_error() {
        let refs = vec!["a".to_string(), "b".to_string()];
        let outcomes = tracker()
            .track_many(&refs, TrackOptions::default())
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.is_err()));
        let mut seen: Vec<&str> = outcomes.iter().filter_map(|o| o.tracking_ref()).collect();
        seen.sort();
        assert_eq!(seen, vec!["a", "b"]);
    }
}
