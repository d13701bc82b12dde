//! Truline adapter (ePOD HTML tracking page).
//!
//! A Truline reference is a despatch number followed by the seven digits of
//! the purchase order. The tracking page is a plain HTML table parsed with
//! `scraper`.

use super::{reference_pattern, CourierAdapter};
use crate::config::TrulineConfig;
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
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

const NAME: &str = "truline";
const PATTERN: &str = r"^04\d{15}$";
const DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
/// Digits at the end of a reference that belong to the purchase order.
const PO_DIGITS: usize = 7;

/// Truline only reports free text, so the mapping works on descriptions:
/// two are recognised explicitly and every other scan counts as in transit.
fn translate_status(description: &str) -> StatusCode {
    match description.to_lowercase().as_str() {
        "delivered" => StatusCode::Delivered,
        "failed delivery" => StatusCode::Exception,
        _ => StatusCode::InTransit,
    }
}

/// The parts of a Truline reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrulineReference {
    pub despatch_number: String,
    pub purchase_order_number: String,
}

impl TrulineReference {
    /// Split a reference already known to match the Truline pattern.
    pub fn parse(reference: &str) -> Self {
        let split = reference.len().saturating_sub(PO_DIGITS);
        let (despatch, po) = reference.split_at(split);
        Self {
            despatch_number: despatch.to_string(),
            purchase_order_number: format!("Z{po}"),
        }
    }
}

/// One row of the tracking table.
#[derive(Debug, Clone)]
struct ScanRow {
    description: String,
    pod_url: Option<String>,
    date: Option<String>,
}

pub struct TrulineCourier {
    pattern: Regex,
    executor: Executor,
    http: HttpClient,
    base_url: String,
}

impl TrulineCourier {
    pub fn new(config: &TrulineConfig, http: HttpClient) -> Self {
        Self {
            pattern: reference_pattern(PATTERN),
            executor: Executor::new(config.concurrency),
            http,
            base_url: config.base_url.clone(),
        }
    }
}

#[async_trait]
impl CourierAdapter for TrulineCourier {
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
        let parts = TrulineReference::parse(reference);

        let resp = self
            .http
            .get(
                &self.base_url,
                &[
                    ("despatchNumber", parts.despatch_number.as_str()),
                    ("purchaseOrderNumber", parts.purchase_order_number.as_str()),
                ],
            )
            .await?;
        if !resp.is_ok() {
            return Err(TrackError::HttpStatus {
                status: resp.status,
                url: resp.url,
            });
        }

        // `Html` is !Send, so parsing stays synchronous and self-contained.
        let rows = parse_rows(&resp.body);
        build_result(reference, &parts, rows, options.history)
    }
}

fn build_result(
    reference: &str,
    parts: &TrulineReference,
    rows: Vec<ScanRow>,
    history: bool,
) -> TrackResult<TrackingResult> {
    let mut identity = TrackingIdentity::new(NAME, reference);
    identity.consignment_ref = Some(parts.despatch_number.clone());
    identity.po_number = Some(parts.purchase_order_number.clone());

    let mut builder = TrackingResultBuilder::new(identity);
    for row in rows {
        let status = translate_status(&row.description);
        let description = if row.description.is_empty() {
            UNKNOWN.to_string()
        } else {
            row.description
        };
        builder.add_event(
            HistoryEvent::new(status, description)
                .at(row.date.as_deref().and_then(|d| parse_timestamp(d, DATE_FORMAT)))
                .with_pod_image(row.pod_url),
        );
    }

    builder.build(BuildOptions::with_history(history))
}

fn parse_rows(html: &str) -> Vec<ScanRow> {
    let document = Html::parse_document(html);
    let row_sel = Selector::parse(".tracking-results tbody tr").expect("row selector is valid");
    let cell_sel = Selector::parse("td").expect("cell selector is valid");
    let link_sel = Selector::parse("a").expect("link selector is valid");

    document
        .select(&row_sel)
        .map(|row| {
            let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
            let cell_text = |i: usize| cells.get(i).map(|c| collapse(c.text().collect::<String>()));

            let pod_url = cells
                .get(2)
                .and_then(|c| c.select(&link_sel).next())
                .and_then(|a| a.value().attr("href"))
                .map(|href| href.trim().replace("manifestPage.aspx", "imgRetrieval.ashx"))
                .filter(|href| !href.is_empty());

            ScanRow {
                description: cell_text(0).unwrap_or_default(),
                pod_url,
                date: cell_text(3),
            }
        })
        .collect()
}

fn collapse(text: String) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
