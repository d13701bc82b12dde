//! TrackingResultBuilder for accumulating a parcel's history and producing
//! the canonical record.

use crate::error::{TrackError, TrackResult};
use crate::result::types::{HistoryEvent, TrackingIdentity, TrackingResult};

/// Options controlling [`TrackingResultBuilder::build`].
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Attach every event except the latest as `history`.
    pub include_history: bool,
    /// Order events by date before picking the latest. Adapters whose
    /// source is already chronological may turn this off.
    pub sort: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            include_history: false,
            sort: true,
        }
    }
}

impl BuildOptions {
    pub fn with_history(include_history: bool) -> Self {
        Self {
            include_history,
            ..Default::default()
        }
    }
}

/// Builder for one physical parcel's canonical record.
#[derive(Debug, Clone, Default)]
pub struct TrackingResultBuilder {
    identity: TrackingIdentity,
    events: Vec<HistoryEvent>,
}

impl TrackingResultBuilder {
    /// Create a builder with the given identity and no events.
    pub fn new(identity: TrackingIdentity) -> Self {
        Self {
            identity,
            events: Vec::new(),
        }
    }

    /// Identity fields, for correcting references discovered mid-fetch.
    pub fn identity_mut(&mut self) -> &mut TrackingIdentity {
        &mut self.identity
    }

    /// Append an event. Ordering is only applied at build time.
    pub fn add_event(&mut self, event: HistoryEvent) {
        self.events.push(event);
    }

    /// Produce the canonical record. Consumes the builder.
    ///
    /// Fails with [`TrackError::EmptyHistory`] (carrying the identity) when
    /// no events were added.
    pub fn build(self, options: BuildOptions) -> TrackResult<TrackingResult> {
        let Self { identity, mut events } = self;

        if options.sort {
            sort_by_date(&mut events);
        }

        let latest = match events.pop() {
            Some(event) => event,
            None => return Err(TrackError::EmptyHistory(Box::new(identity))),
        };

        Ok(TrackingResult {
            identity,
            latest,
            history: options.include_history.then_some(events),
        })
    }
}

/// Stable ascending sort on `date`.
///
/// Undated events never move: they compare equal to everything, so they keep
/// their slot and the dated events are ordered among the remaining slots.
fn sort_by_date(events: &mut [HistoryEvent]) {
    let slots: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.date.is_some())
        .map(|(i, _)| i)
        .collect();

    let mut dated: Vec<HistoryEvent> = slots.iter().map(|&i| events[i].clone()).collect();
    dated.sort_by_key(|e| e.date);

    for (slot, event) in slots.into_iter().zip(dated) {
        events[slot] = event;
    }
}
