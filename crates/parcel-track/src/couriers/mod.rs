//! Courier adapters.
//!
//! The set of couriers is closed: [`Courier`] enumerates every adapter and
//! dispatches to it with an exhaustive match. Each adapter implements
//! [`CourierAdapter`], which supplies the per-reference lookup; batching,
//! rate limiting through the adapter's [`Executor`] and per-reference error
//! capture are shared here.

pub mod truline;
pub mod ups;
pub mod yodel;

pub use truline::TrulineCourier;
pub use ups::UpsCourier;
pub use yodel::YodelCourier;

use crate::error::TrackResult;
use crate::executor::Executor;
use crate::result::{TrackOptions, TrackOutcome, TrackingResult};
use async_trait::async_trait;
use regex::Regex;

/// Capability every courier adapter provides.
#[async_trait]
pub trait CourierAdapter: Send + Sync {
    /// Courier name as it appears in `TrackingResult::courier`.
    fn name(&self) -> &'static str;

    /// Pattern recognising the references this courier owns.
    fn pattern(&self) -> &Regex;

    /// Executor bounding this courier's outbound requests.
    fn executor(&self) -> &Executor;

    /// Look up one reference.
    async fn track_one(&self, reference: &str, options: TrackOptions)
        -> TrackResult<TrackingResult>;

    fn matches(&self, reference: &str) -> bool {
        self.pattern().is_match(reference)
    }

    /// Look up a batch. Every reference yields exactly one outcome; a failed
    /// reference becomes a [`TrackOutcome::Failed`] entry and never aborts
    /// its siblings. Outcomes follow the order of `references`.
    async fn track(&self, references: &[String], options: TrackOptions) -> Vec<TrackOutcome> {
        let lookups = references.iter().map(|reference| async move {
            match self.executor().run(self.track_one(reference, options)).await {
                Ok(result) => TrackOutcome::Found(result),
                Err(e) => {
                    tracing::warn!(courier = self.name(), reference = %reference, error = %e, "lookup failed");
                    TrackOutcome::failed(reference.clone(), e)
                }
            }
        });
        futures::future::join_all(lookups).await
    }
}

/// Every supported courier.
pub enum Courier {
    Ups(UpsCourier),
    Truline(TrulineCourier),
    Yodel(YodelCourier),
}

impl Courier {
    pub fn name(&self) -> &'static str {
        match self {
            Courier::Ups(c) => c.name(),
            Courier::Truline(c) => c.name(),
            Courier::Yodel(c) => c.name(),
        }
    }

    pub fn matches(&self, reference: &str) -> bool {
        match self {
            Courier::Ups(c) => c.matches(reference),
            Courier::Truline(c) => c.matches(reference),
            Courier::Yodel(c) => c.matches(reference),
        }
    }

    pub fn executor(&self) -> &Executor {
        match self {
            Courier::Ups(c) => c.executor(),
            Courier::Truline(c) => c.executor(),
            Courier::Yodel(c) => c.executor(),
        }
    }

    pub async fn track(&self, references: &[String], options: TrackOptions) -> Vec<TrackOutcome> {
        match self {
            Courier::Ups(c) => c.track(references, options).await,
            Courier::Truline(c) => c.track(references, options).await,
            Courier::Yodel(c) => c.track(references, options).await,
        }
    }
}

impl std::fmt::Debug for Courier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Courier")
            .field("name", &self.name())
            .field("concurrency", &self.executor().concurrency())
            .finish()
    }
}

/// Compile one of the fixed courier patterns.
fn reference_pattern(pattern: &str) -> Regex {
    Regex::new(pattern).expect("courier pattern is valid")
}
