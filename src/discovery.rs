//! Candidate targets from the Ticketmaster Discovery API
//!
//! Lists upcoming music events whose status suggests nothing is on sale right
//! now, so they can be fed to `watch` as targets.

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::DiscoveryError;

pub const DISCOVERY_ENDPOINT: &str = "https://app.ticketmaster.com/discovery/v2/events.json";

/// Statuses that can mean an event is sold out.
pub const UNAVAILABLE_STATUSES: &[&str] =
    &["offsale", "soldout", "canceled", "postponed", "rescheduled"];

#[derive(Clone, Debug)]
pub struct DiscoveryQuery {
    pub endpoint: String,
    pub api_key: String,
    pub country: String,
    pub page_size: u32,
    pub pages: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiscoveredEvent {
    #[serde(rename = "Event Name")]
    pub name: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Venue")]
    pub venue: String,
    #[serde(rename = "URL")]
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
struct EventsPage {
    #[serde(rename = "_embedded", default)]
    embedded: Option<EmbeddedEvents>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddedEvents {
    #[serde(default)]
    events: Vec<ApiEvent>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiEvent {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    dates: ApiDates,
    #[serde(default)]
    sales: ApiSales,
    #[serde(rename = "_embedded", default)]
    embedded: Option<ApiEventEmbedded>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiDates {
    #[serde(default)]
    status: Option<ApiStatus>,
    #[serde(default)]
    start: Option<ApiStart>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiStart {
    #[serde(rename = "localDate", default)]
    local_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiSales {
    #[serde(default)]
    public: Option<ApiPublicSale>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiPublicSale {
    #[serde(rename = "startDateTime", default)]
    start_date_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiEventEmbedded {
    #[serde(default)]
    venues: Vec<ApiVenue>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiVenue {
    #[serde(default)]
    name: Option<String>,
}

/// Keeps events that look unavailable, are sold on Ticketmaster and whose
/// public sale has already opened.
pub(crate) fn candidate(event: &ApiEvent, now: DateTime<Utc>) -> Option<DiscoveredEvent> {
    let status = event
        .dates
        .status
        .as_ref()
        .and_then(|status| status.code.as_deref())?
        .to_ascii_lowercase();
    if !UNAVAILABLE_STATUSES.contains(&status.as_str()) {
        return None;
    }

    let url = event.url.as_deref().filter(|url| url.contains("ticketmaster"))?;

    let sale_start = event
        .sales
        .public
        .as_ref()
        .and_then(|sale| sale.start_date_time.as_deref())
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok());
    if let Some(start) = sale_start {
        if start.with_timezone(&Utc) > now {
            return None;
        }
    }

    let venue = event
        .embedded
        .as_ref()
        .and_then(|embedded| embedded.venues.first())
        .and_then(|venue| venue.name.clone())
        .unwrap_or_else(|| "Unknown Venue".to_string());
    let date = event
        .dates
        .start
        .as_ref()
        .and_then(|start| start.local_date.clone())
        .unwrap_or_else(|| "Unknown Date".to_string());

    Some(DiscoveredEvent {
        name: event.name.clone().unwrap_or_default(),
        date,
        venue,
        url: url.to_string(),
    })
}

/// Walks up to `query.pages` result pages. A non-success response ends the
/// walk early and keeps what was collected so far.
pub async fn discover(
    client: &Client,
    query: &DiscoveryQuery,
    now: DateTime<Utc>,
) -> Result<Vec<DiscoveredEvent>, DiscoveryError> {
    if query.api_key.trim().is_empty() {
        return Err(DiscoveryError::MissingApiKey);
    }

    let start = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut found = Vec::new();
    for page in 0..query.pages {
        info!(page, "fetching discovery page");
        let response = client
            .get(&query.endpoint)
            .query(&[
                ("apikey", query.api_key.as_str()),
                ("countryCode", query.country.as_str()),
                ("classificationName", "music"),
                ("startDateTime", start.as_str()),
            ])
            .query(&[("size", query.page_size), ("page", page)])
            .send()
            .await
            .map_err(|err| DiscoveryError::Http(err.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %body, "discovery request rejected; stopping");
            break;
        }

        let body: EventsPage = response.json().await?;
        let events = body.embedded.map(|embedded| embedded.events).unwrap_or_default();
        if events.is_empty() {
            break;
        }
        found.extend(events.iter().filter_map(|event| candidate(event, now)));
    }
    Ok(found)
}

/// Writes `Event Name, Date, Venue, URL` rows with a header line.
pub fn write_csv<W: Write>(writer: W, events: &[DiscoveredEvent]) -> Result<(), DiscoveryError> {
    let mut csv = csv::Writer::from_writer(writer);
    if events.is_empty() {
        csv.write_record(["Event Name", "Date", "Venue", "URL"])?;
    }
    for event in events {
        csv.serialize(event)?;
    }
    csv.flush()?;
    Ok(())
}
