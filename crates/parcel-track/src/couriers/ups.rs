//! UPS adapter (JSON Track API).
//!
//! Lookups are two-step. An inquiry number is first resolved to the shipment
//! document that contains it, through a private [`SingleFlightCache`]. The
//! package matching the reference is then normalized. A shipment lists all
//! of its packages, so once one package resolves its siblings are seeded
//! into the cache and need no request of their own.

use super::{reference_pattern, CourierAdapter};
use crate::config::UpsConfig;
use crate::dates::parse_timestamp;
use crate::error::{TrackError, TrackResult};
use crate::executor::Executor;
use crate::http_client::HttpClient;
use crate::result::{
    BuildOptions, HistoryEvent, TrackOptions, TrackingIdentity, TrackingResult,
    TrackingResultBuilder, UNKNOWN,
};
use crate::single_flight::SingleFlightCache;
use crate::status::StatusCode;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const NAME: &str = "ups";
const PATTERN: &str = r"^1Z[\dA-Z]{16}$";
const DATE_FORMAT: &str = "%Y%m%d%H%M%S";
/// Address type code UPS uses for the ship-to address.
const SHIP_TO: &str = "02";

/// Map a UPS activity status type onto the canonical taxonomy.
fn translate_status(code: &str, description: &str) -> TrackResult<StatusCode> {
    match code {
        "M" => Ok(StatusCode::Manifested),
        "I" => Ok(StatusCode::InTransit),
        "D" => Ok(StatusCode::Delivered),
        "X" => Ok(StatusCode::Exception),
        other => Err(TrackError::UnrecognizedStatus {
            code: other.to_string(),
            description: description.to_string(),
        }),
    }
}

/// Cache key: the same number asked with and without activity history are
/// different documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Inquiry {
    number: String,
    activity: bool,
}

#[derive(Clone)]
struct Credentials {
    user: String,
    pass: String,
    access: String,
}

pub struct UpsCourier {
    pattern: Regex,
    executor: Executor,
    http: HttpClient,
    endpoint: String,
    credentials: Option<Credentials>,
    shipments: SingleFlightCache<Inquiry, Arc<Value>>,
}

impl UpsCourier {
    pub fn new(config: &UpsConfig, http: HttpClient) -> Self {
        let credentials = match (&config.user, &config.pass, &config.access) {
            (Some(user), Some(pass), Some(access)) => Some(Credentials {
                user: user.clone(),
                pass: pass.clone(),
                access: access.clone(),
            }),
            _ => None,
        };

        Self {
            pattern: reference_pattern(PATTERN),
            executor: Executor::new(config.concurrency),
            http,
            endpoint: config.endpoint().to_string(),
            credentials,
            shipments: SingleFlightCache::new(config.cache_size)
                .with_ttl(Duration::from_secs(config.cache_ttl_secs)),
        }
    }

    /// Shipment documents currently held by the resolution cache.
    pub fn cached_shipments(&self) -> usize {
        self.shipments.len()
    }
}

#[async_trait]
impl CourierAdapter for UpsCourier {
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
        let credentials = self.credentials.clone().ok_or_else(|| {
            TrackError::Config("UPS requires credentials for tracking through API".to_string())
        })?;

        let inquiry = Inquiry {
            number: reference.to_string(),
            activity: options.history,
        };
        let shipment = self
            .shipments
            .resolve(&inquiry, || {
                fetch_shipment(
                    self.http.clone(),
                    self.endpoint.clone(),
                    credentials.clone(),
                    inquiry.clone(),
                )
            })
            .await?;

        for number in package_numbers(&shipment) {
            if number != reference {
                let sibling = Inquiry {
                    number,
                    activity: options.history,
                };
                self.shipments.insert_resolved(sibling, Arc::clone(&shipment));
            }
        }

        let package = packages(&shipment)
            .into_iter()
            .find(|p| text(p, "TrackingNumber").as_deref() == Some(reference))
            .ok_or_else(|| not_found(reference))?;

        build_result(&shipment, package, options.history)
    }
}

/// Request the shipment containing `inquiry` and validate the envelope.
async fn fetch_shipment(
    http: HttpClient,
    endpoint: String,
    credentials: Credentials,
    inquiry: Inquiry,
) -> TrackResult<Arc<Value>> {
    let request = json!({
        "UPSSecurity": {
            "UsernameToken": {
                "Username": credentials.user,
                "Password": credentials.pass,
            },
            "ServiceAccessToken": {
                "AccessLicenseNumber": credentials.access,
            },
        },
        "TrackRequest": {
            "Request": {
                "RequestOption": if inquiry.activity { "1" } else { "0" },
            },
            "InquiryNumber": inquiry.number,
        },
    });

    let resp = http.post_json(&endpoint, &request).await?;
    if !resp.is_ok() {
        return Err(TrackError::HttpStatus {
            status: resp.status,
            url: resp.url,
        });
    }

    let body: Value = serde_json::from_str(&resp.body)?;

    if let Some(fault) = body.get("Fault") {
        return Err(TrackError::Fetch(format!(
            "{} : {}",
            text(fault, "faultstring").unwrap_or_default(),
            text(fault, "detail.Errors.ErrorDetail.PrimaryErrorCode.Description")
                .unwrap_or_default()
        )));
    }

    let response = body.get("TrackResponse").unwrap_or(&Value::Null);
    if text(response, "Response.ResponseStatus.Code").as_deref() != Some("1") {
        return Err(TrackError::Fetch(format!(
            "Bad UPS response status: {}",
            text(response, "Response.ResponseStatus.Description").unwrap_or_default()
        )));
    }

    let shipment = response
        .get("Shipment")
        .cloned()
        .ok_or_else(|| TrackError::Fetch("UPS response has no shipment".to_string()))?;
    // A shipment without the inquired package must not be cached for it.
    if !package_numbers(&shipment).contains(&inquiry.number) {
        return Err(not_found(&inquiry.number));
    }
    tracing::debug!(inquiry = %inquiry.number, "resolved UPS shipment");
    Ok(Arc::new(shipment))
}

fn not_found(reference: &str) -> TrackError {
    TrackError::Fetch(format!("Tracking results not found for {reference}"))
}

/// Normalize one package of a shipment.
fn build_result(shipment: &Value, package: &Value, history: bool) -> TrackResult<TrackingResult> {
    let ship_to = list(shipment.get("ShipmentAddress"))
        .into_iter()
        .find(|a| text(a, "Type.Code").as_deref() == Some(SHIP_TO));

    let mut builder = TrackingResultBuilder::new(TrackingIdentity {
        courier: Some(NAME.to_string()),
        service: text(shipment, "Service.Description"),
        tracking_ref: text(package, "TrackingNumber"),
        dest_postal_code: ship_to.and_then(|a| text(a, "Address.PostalCode")),
        dest_country_code: ship_to.and_then(|a| text(a, "Address.CountryCode")),
        ..Default::default()
    });

    // UPS lists activity newest first.
    for activity in list(package.get("Activity")).into_iter().rev() {
        let description =
            text(activity, "Status.Description").unwrap_or_else(|| UNKNOWN.to_string());
        let code = text(activity, "Status.Type").unwrap_or_else(|| "X".to_string());
        let status = translate_status(&code, &description)?;

        let stamp = format!(
            "{}{}",
            text(activity, "Date").unwrap_or_default(),
            text(activity, "Time").unwrap_or_default()
        );

        let place = activity.get("ActivityLocation").unwrap_or(&Value::Null);
        let location = [
            "Address.City",
            "Address.PostalCode",
            "Address.CountryCode",
            "Description",
        ]
        .iter()
        .filter_map(|path| text(place, path))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

        builder.add_event(
            HistoryEvent::new(status, description)
                .at(parse_timestamp(&stamp, DATE_FORMAT))
                .located(location)
                .signed_by(text(place, "SignedForByName")),
        );
    }

    builder.build(BuildOptions {
        include_history: history,
        sort: false,
    })
}

fn packages(shipment: &Value) -> Vec<&Value> {
    list(shipment.get("Package"))
}

fn package_numbers(shipment: &Value) -> Vec<String> {
    packages(shipment)
        .into_iter()
        .filter_map(|p| text(p, "TrackingNumber"))
        .collect()
}

/// UPS collapses single-element arrays into a bare object.
fn list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

/// Dotted-path lookup returning strings and numbers as text.
fn text(value: &Value, path: &str) -> Option<String> {
    let found = path.split('.').try_fold(value, |v, key| v.get(key))?;
    match found {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
