//! Subcommand handlers. Each returns the JSON document to print.

use parcel_track::{TrackInput, TrackOptions, Tracker};
use serde_json::{json, Value};

/// Look up `refs`. One reference without `batch` is a single lookup whose
/// failure is returned as the error.
pub async fn track(
    tracker: &Tracker,
    mut refs: Vec<String>,
    history: bool,
    batch: bool,
) -> anyhow::Result<Value> {
    let input = if refs.len() == 1 && !batch {
        TrackInput::Single(refs.remove(0))
    } else {
        TrackInput::Batch(refs)
    };
    let response = tracker.track(input, TrackOptions { history }).await?;
    Ok(serde_json::to_value(&response)?)
}

/// Report which courier owns each reference.
pub fn identify(tracker: &Tracker, refs: &[String]) -> Value {
    Value::Array(
        refs.iter()
            .map(|r| json!({ "tracking_ref": r, "courier": tracker.identify(r) }))
            .collect(),
    )
}

/// Render `value` for stdout.
pub fn render(value: &Value, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    rendered.unwrap_or_else(|_| value.to_string())
}

/// JSON document printed when a command fails.
pub fn error_document(err: &anyhow::Error) -> Value {
    let mut doc = json!({
        "error": true,
        "message": format!("{err:#}"),
    });
    if let Some(track_err) = err.downcast_ref::<parcel_track::TrackError>() {
        doc["kind"] = json!(track_err.kind());
    }
    doc
}
