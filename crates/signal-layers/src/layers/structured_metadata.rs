use dropwatch_core_types::{LayerId, LayerRole, OfferDetail, VerdictDetails};
use serde_json::Value;

use crate::errors::{LayerError, Result};
use crate::jsonld::{self, scalar};
use crate::model::{Finding, ParsedPage, StructuredMetadataSettings};
use crate::registry::SignalExtractor;

/// Reads `offers` off the page's JSON-LD event entries and reports in-stock ones.
pub struct StructuredMetadataLayer {
    id: LayerId,
    role: LayerRole,
    settings: StructuredMetadataSettings,
}

impl StructuredMetadataLayer {
    pub const ID: &'static str = "structured-metadata";

    pub fn new(settings: StructuredMetadataSettings) -> Self {
        Self {
            id: LayerId::from(Self::ID),
            role: LayerRole::Corroborating,
            settings,
        }
    }

    pub fn with_role_override(mut self, role: Option<LayerRole>) -> Self {
        if let Some(role) = role {
            self.role = role;
        }
        self
    }

    fn in_stock(&self, offer: &Value) -> bool {
        let available = offer
            .get("availability")
            .and_then(Value::as_str)
            .map(|value| value.trim().ends_with("InStock"))
            .unwrap_or(false);
        if !available {
            return false;
        }
        match &self.settings.offer_domain {
            Some(domain) => offer
                .get("url")
                .and_then(Value::as_str)
                .map(|url| url.contains(domain.as_str()))
                .unwrap_or(false),
            None => true,
        }
    }
}

impl Default for StructuredMetadataLayer {
    fn default() -> Self {
        Self::new(StructuredMetadataSettings::default())
    }
}

fn offer_detail(offer: &Value) -> OfferDetail {
    let location = ["name", "category", "description"]
        .iter()
        .find_map(|key| offer.get(*key).and_then(scalar));
    OfferDetail {
        price: offer.get("price").and_then(scalar),
        currency: offer.get("priceCurrency").and_then(scalar),
        location,
        url: offer.get("url").and_then(scalar),
        availability: offer.get("availability").and_then(scalar),
    }
}

impl SignalExtractor for StructuredMetadataLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn role(&self) -> LayerRole {
        self.role
    }

    fn risk(&self) -> &'static str {
        "metadata is often cached or generated from the catalogue, so InStock can \
         lag a sell-out (false positive) or miss resale inventory (false negative)"
    }

    fn inspect(&self, page: &ParsedPage<'_>) -> Result<Finding> {
        let scan = jsonld::scan(page.document())?;
        if scan.all_blocks_broken() {
            return Err(LayerError::Payload(scan.errors.join("; ")));
        }

        let events: Vec<&Value> = scan.events(&self.settings.event_types).collect();
        if events.is_empty() {
            return Ok(Finding::unknown(format!(
                "no {} entries in structured data",
                self.settings.event_types.join("/")
            )));
        }

        let mut details = VerdictDetails::default();
        for event in &events {
            let offers: Vec<OfferDetail> = jsonld::offers(event)
                .into_iter()
                .filter(|offer| self.in_stock(offer))
                .map(offer_detail)
                .collect();
            if offers.is_empty() {
                continue;
            }
            details.merge(&VerdictDetails {
                event: Some(jsonld::event_metadata(event)),
                offers,
            });
        }

        if details.offers.is_empty() {
            return Ok(Finding::negative(format!(
                "{} event entr{} without in-stock offers",
                events.len(),
                if events.len() == 1 { "y" } else { "ies" }
            )));
        }

        let labels: Vec<String> = details
            .offers
            .iter()
            .map(|offer| offer.price_label().unwrap_or_else(|| "no price".into()))
            .collect();
        let evidence = format!(
            "{} in-stock offer(s): {}",
            details.offers.len(),
            labels.join(", ")
        );
        Ok(Finding::positive(evidence).with_details(details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropwatch_core_types::{Classification, PageSnapshot};

    fn page(json: &str) -> PageSnapshot {
        PageSnapshot::captured_now(
            format!(r#"<html><head><script type="application/ld+json">{json}</script></head></html>"#),
            "test",
        )
    }

    const IN_STOCK: &str = r#"{
        "@type": "MusicEvent",
        "name": "The Band",
        "startDate": "2026-11-02T19:30:00",
        "location": {"name": "Arena", "address": {"streetAddress": "1 Road", "addressLocality": "London"}},
        "offers": [
            {"availability": "https://schema.org/InStock", "price": "45.00", "priceCurrency": "GBP",
             "name": "Standing", "url": "https://www.ticketmaster.co.uk/event/1"},
            {"availability": "https://schema.org/SoldOut", "price": "80.00", "priceCurrency": "GBP"}
        ]
    }"#;

    #[test]
    fn in_stock_offers_are_positive_with_details() {
        let verdict = StructuredMetadataLayer::default().evaluate(&page(IN_STOCK));
        assert_eq!(verdict.classification, Classification::Positive);
        let details = verdict.details.unwrap();
        assert_eq!(details.offers.len(), 1);
        assert_eq!(details.offers[0].price_label().as_deref(), Some("45.00 GBP"));
        assert_eq!(details.offers[0].location.as_deref(), Some("Standing"));
        assert_eq!(details.event.unwrap().venue.as_deref(), Some("Arena"));
    }

    #[test]
    fn domain_filter_rejects_foreign_offers() {
        let layer = StructuredMetadataLayer::new(StructuredMetadataSettings {
            offer_domain: Some("ticketmaster.com".into()),
            ..StructuredMetadataSettings::default()
        });
        let verdict = layer.evaluate(&page(IN_STOCK));
        assert_eq!(verdict.classification, Classification::Negative);
    }

    #[test]
    fn no_event_entries_is_unknown() {
        let verdict =
            StructuredMetadataLayer::default().evaluate(&page(r#"{"@type": "WebPage"}"#));
        assert_eq!(verdict.classification, Classification::Unknown);
    }

    #[test]
    fn broken_payload_is_error() {
        let verdict = StructuredMetadataLayer::default().evaluate(&page("{not json"));
        assert_eq!(verdict.classification, Classification::Error);
        assert!(verdict.evidence.starts_with("malformed structured data"));
    }
}
