use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::LayerId;

/// A layer's reading of one snapshot.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Positive,
    Negative,
    Unknown,
    Error,
}

impl Classification {
    /// Positive and Negative are decisions; Unknown and Error are not.
    pub fn is_usable(self) -> bool {
        matches!(self, Self::Positive | Self::Negative)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Unknown => "unknown",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a layer declares for itself. Fusion rules may select layers by role,
/// never by name.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerRole {
    Authoritative,
    #[default]
    Corroborating,
    Advisory,
}

impl LayerRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authoritative => "authoritative",
            Self::Corroborating => "corroborating",
            Self::Advisory => "advisory",
        }
    }
}

impl fmt::Display for LayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
}

impl EventMetadata {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.start_date.is_none()
            && self.venue.is_none()
            && self.street_address.is_none()
            && self.locality.is_none()
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_na = |value: &Option<String>| value.clone().unwrap_or_else(|| "N/A".to_string());
        write!(
            f,
            "Event: {} | Date: {} | Venue: {}, {}, {}",
            or_na(&self.name),
            or_na(&self.start_date),
            or_na(&self.venue),
            self.street_address.as_deref().unwrap_or(""),
            self.locality.as_deref().unwrap_or(""),
        )
    }
}

/// One purchasable offer (or seat block) extracted from the page.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct OfferDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
}

impl OfferDetail {
    /// `"45.00 GBP"`, `"45.00"` or `None` when no price was seen.
    pub fn price_label(&self) -> Option<String> {
        let price = self.price.as_deref()?;
        Some(match self.currency.as_deref() {
            Some(currency) if !currency.is_empty() => format!("{price} {currency}"),
            _ => price.to_string(),
        })
    }
}

impl fmt::Display for OfferDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Price: {} | Location: {}",
            self.price_label().unwrap_or_else(|| "N/A".to_string()),
            self.location.as_deref().unwrap_or("N/A"),
        )?;
        if let Some(availability) = &self.availability {
            write!(f, " | Availability: {availability}")?;
        }
        if let Some(url) = &self.url {
            write!(f, " | URL: {url}")?;
        }
        Ok(())
    }
}

/// Structured evidence attached to a verdict or aggregated into a decision.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct VerdictDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offers: Vec<OfferDetail>,
}

impl VerdictDetails {
    pub fn is_empty(&self) -> bool {
        self.event.as_ref().map_or(true, EventMetadata::is_empty) && self.offers.is_empty()
    }

    /// Folds `other` in: the first known event wins, offers are appended
    /// without duplicates and in order.
    pub fn merge(&mut self, other: &VerdictDetails) {
        if self.event.as_ref().map_or(true, EventMetadata::is_empty) {
            if let Some(event) = &other.event {
                if !event.is_empty() {
                    self.event = Some(event.clone());
                }
            }
        }
        for offer in &other.offers {
            if !self.offers.contains(offer) {
                self.offers.push(offer.clone());
            }
        }
    }

    pub fn prices(&self) -> impl Iterator<Item = &str> {
        self.offers.iter().filter_map(|offer| offer.price.as_deref())
    }

    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.offers
            .iter()
            .filter_map(|offer| offer.currency.as_deref())
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.offers.iter().filter_map(|offer| offer.url.as_deref())
    }
}

/// Output of exactly one layer over exactly one snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerVerdict {
    pub layer: LayerId,
    pub role: LayerRole,
    pub classification: Classification,
    pub evidence: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<VerdictDetails>,
    /// Copied from the snapshot, so re-evaluation yields an equal verdict.
    pub observed_at: DateTime<Utc>,
}

impl LayerVerdict {
    pub fn new(
        layer: LayerId,
        role: LayerRole,
        classification: Classification,
        evidence: impl Into<String>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            layer,
            role,
            classification,
            evidence: evidence.into(),
            details: None,
            observed_at,
        }
    }

    pub fn with_details(mut self, details: VerdictDetails) -> Self {
        if !details.is_empty() {
            self.details = Some(details);
        }
        self
    }

    pub fn is_positive(&self) -> bool {
        self.classification == Classification::Positive
    }
}

impl fmt::Display for LayerVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} ({})] {}: {}",
            self.layer, self.role, self.classification, self.evidence
        )
    }
}

/// Fused decision over one ordered verdict list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionResult {
    pub found: bool,
    /// The rule could not reach a decision from usable verdicts.
    pub ambiguous: bool,
    /// Human label of the rule that produced this result.
    pub rule: String,
    pub contributing: Vec<LayerId>,
    pub details: VerdictDetails,
    pub evaluated_at: DateTime<Utc>,
    /// Every verdict, governing or not, in evaluation order.
    pub verdicts: Vec<LayerVerdict>,
}

impl FusionResult {
    pub fn verdict(&self, layer: &LayerId) -> Option<&LayerVerdict> {
        self.verdicts.iter().find(|verdict| &verdict.layer == layer)
    }

    pub fn summary(&self) -> String {
        let decision = if self.found {
            "FOUND"
        } else if self.ambiguous {
            "NONE (ambiguous)"
        } else {
            "NONE"
        };
        let layers = self
            .contributing
            .iter()
            .map(LayerId::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if layers.is_empty() {
            format!("{decision} via {}", self.rule)
        } else {
            format!("{decision} via {} [{layers}]", self.rule)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(price: &str, currency: &str) -> OfferDetail {
        OfferDetail {
            price: Some(price.into()),
            currency: Some(currency.into()),
            ..OfferDetail::default()
        }
    }

    #[test]
    fn price_label_joins_currency() {
        assert_eq!(offer("45.00", "GBP").price_label().as_deref(), Some("45.00 GBP"));
        let bare = OfferDetail {
            price: Some("12".into()),
            ..OfferDetail::default()
        };
        assert_eq!(bare.price_label().as_deref(), Some("12"));
        assert_eq!(OfferDetail::default().price_label(), None);
    }

    #[test]
    fn merge_keeps_first_event_and_dedups_offers() {
        let mut base = VerdictDetails {
            event: Some(EventMetadata {
                name: Some("First".into()),
                ..EventMetadata::default()
            }),
            offers: vec![offer("10.00", "GBP")],
        };
        let other = VerdictDetails {
            event: Some(EventMetadata {
                name: Some("Second".into()),
                ..EventMetadata::default()
            }),
            offers: vec![offer("10.00", "GBP"), offer("20.00", "GBP")],
        };
        base.merge(&other);
        assert_eq!(base.event.unwrap().name.as_deref(), Some("First"));
        assert_eq!(base.offers.len(), 2);
    }

    #[test]
    fn empty_details_are_not_attached() {
        let verdict = LayerVerdict::new(
            LayerId::from("x"),
            LayerRole::Advisory,
            Classification::Negative,
            "nothing",
            Utc::now(),
        )
        .with_details(VerdictDetails::default());
        assert!(verdict.details.is_none());
    }

    #[test]
    fn unusable_classifications() {
        assert!(Classification::Positive.is_usable());
        assert!(Classification::Negative.is_usable());
        assert!(!Classification::Unknown.is_usable());
        assert!(!Classification::Error.is_usable());
    }
}
