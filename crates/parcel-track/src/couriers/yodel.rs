//! Yodel adapter (XML parcel history).

use super::{reference_pattern, CourierAdapter};
use crate::config::YodelConfig;
use crate::dates::parse_timestamp;
use crate::error::{TrackError, TrackResult};
use crate::executor::Executor;
use crate::http_client::HttpClient;
use crate::result::{
    BuildOptions, HistoryEvent, TrackOptions, TrackingIdentity, TrackingResult,
    TrackingResultBuilder, UNKNOWN,
};
use crate::status::StatusCode;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashMap;

const NAME: &str = "yodel";
const PATTERN: &str = r"^JD\d{16}$";
const DATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

/// Map a Yodel scan code onto the canonical taxonomy. Unknown codes are
/// refused rather than guessed.
fn translate_status(code: &str, description: &str) -> TrackResult<StatusCode> {
    use StatusCode::*;
    let status = match code {
        "1" => Manifested,
        "A" | "AH" | "AM" | "BJ" | "BH" | "CA" | "CC" | "CY" | "CZ" | "EC" | "ED" | "ET" | "G"
        | "HO" | "HR" | "HU" | "SB" | "SP" | "W" => InTransit,
        "AC" | "E" | "GX" | "I" | "T" | "UG" | "V" => Exception,
        "ZC" | "ZN" | "Z" => Delivered,
        other => {
            return Err(TrackError::UnrecognizedStatus {
                code: other.to_string(),
                description: description.to_string(),
            })
        }
    };
    Ok(status)
}

/// The parts of a parcel history document the adapter uses.
#[derive(Debug, Default)]
struct ParcelHistory {
    query_status: Option<String>,
    response_description: Option<String>,
    /// One field map per `parcel_status` element, in document order.
    scans: Vec<HashMap<String, String>>,
}

pub struct YodelCourier {
    pattern: Regex,
    executor: Executor,
    http: HttpClient,
    base_url: String,
}

impl YodelCourier {
    pub fn new(config: &YodelConfig, http: HttpClient) -> Self {
        Self {
            pattern: reference_pattern(PATTERN),
            executor: Executor::new(config.concurrency),
            http,
            base_url: config.base_url.clone(),
        }
    }
}

#[async_trait]
impl CourierAdapter for YodelCourier {
    fn name(&self) -> &'static str {
        NAME
    }

    fn pattern(&self) -> &Regex {
        &self.pattern
    }

    fn executor(&self) -> &Executor {
        &self.executor
    }

    async fn track_one(
        &self,
        reference: &str,
        options: TrackOptions,
    ) -> TrackResult<TrackingResult> {
        let resp = self
            .http
            .get(&self.base_url, &[("pcl_no", reference)])
            .await?;
        if !resp.is_ok() {
            return Err(TrackError::HttpStatus {
                status: resp.status,
                url: resp.url,
            });
        }

        let history = parse_history(&resp.body)?;
        match history.query_status.as_deref() {
            Some("0") => {}
            Some(_) => {
                return Err(TrackError::Fetch(format!(
                    "XML response error: {}",
                    history.response_description.unwrap_or_default()
                )))
            }
            None => {
                return Err(TrackError::Fetch(
                    "malformed XML response: no response block".to_string(),
                ))
            }
        }

        build_result(reference, history.scans, options.history)
    }
}

fn build_result(
    reference: &str,
    scans: Vec<HashMap<String, String>>,
    history: bool,
) -> TrackResult<TrackingResult> {
    let mut builder = TrackingResultBuilder::new(TrackingIdentity::new(NAME, reference));

    for scan in scans {
        let field = |name: &str| scan.get(name).cloned().filter(|v| !v.is_empty());
        let description = field("status_description").unwrap_or_else(|| UNKNOWN.to_string());
        let status = translate_status(&field("status_code").unwrap_or_default(), &description)?;
        let stamp = format!(
            "{} {}",
            field("scan_date").unwrap_or_default(),
            field("scan_time").unwrap_or_default()
        );

        builder.add_event(
            HistoryEvent::new(status, description)
                .at(parse_timestamp(&stamp, DATE_FORMAT))
                .located(field("location").unwrap_or_default())
                .signed_by(field("signatory")),
        );
    }

    builder.build(BuildOptions::with_history(history))
}

/// Pull the response status and the `parcel_status` entries out of the
/// `parcel_tracking` document.
fn parse_history(xml: &str) -> TrackResult<ParcelHistory> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut history = ParcelHistory::default();
    let mut path: Vec<String> = Vec::new();
    let mut scan: Option<HashMap<String, String>> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "parcel_status" {
                    scan = Some(HashMap::new());
                }
                path.push(name);
            }
            Event::End(_) => {
                if path.pop().as_deref() == Some("parcel_status") {
                    if let Some(done) = scan.take() {
                        history.scans.push(done);
                    }
                }
            }
            Event::Text(t) => {
                let value = t.unescape()?.into_owned();
                record(&path, value, &mut history, scan.as_mut());
            }
            Event::CData(c) => {
                let value = String::from_utf8_lossy(&c.into_inner()).into_owned();
                record(&path, value, &mut history, scan.as_mut());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(history)
}

fn record(
    path: &[String],
    value: String,
    history: &mut ParcelHistory,
    scan: Option<&mut HashMap<String, String>>,
) {
    let [.., parent, field] = path else {
        return;
    };
    match (parent.as_str(), scan) {
        ("parcel_status", Some(scan)) => scan.entry(field.clone()).or_default().push_str(&value),
        ("response", _) if field == "query_status" => history.query_status = Some(value),
        ("response", _) if field == "response_description" => {
            history.response_description = Some(value)
        }
        _ => {}
    }
}
