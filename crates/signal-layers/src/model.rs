use dropwatch_core_types::{Classification, PageSnapshot, VerdictDetails};
use scraper::Html;
use serde::{Deserialize, Serialize};

/// A snapshot with its markup parsed once and shared by every layer.
pub struct ParsedPage<'a> {
    snapshot: &'a PageSnapshot,
    document: Html,
}

impl<'a> ParsedPage<'a> {
    pub fn parse(snapshot: &'a PageSnapshot) -> Self {
        Self {
            snapshot,
            document: Html::parse_document(snapshot.markup()),
        }
    }

    pub fn snapshot(&self) -> &PageSnapshot {
        self.snapshot
    }

    pub fn document(&self) -> &Html {
        &self.document
    }
}

/// What a layer concluded, before it is stamped into a `LayerVerdict`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Finding {
    pub classification: Classification,
    pub evidence: String,
    pub details: Option<VerdictDetails>,
}

impl Finding {
    pub fn new(classification: Classification, evidence: impl Into<String>) -> Self {
        Self {
            classification,
            evidence: evidence.into(),
            details: None,
        }
    }

    pub fn positive(evidence: impl Into<String>) -> Self {
        Self::new(Classification::Positive, evidence)
    }

    pub fn negative(evidence: impl Into<String>) -> Self {
        Self::new(Classification::Negative, evidence)
    }

    pub fn unknown(evidence: impl Into<String>) -> Self {
        Self::new(Classification::Unknown, evidence)
    }

    pub fn with_details(mut self, details: VerdictDetails) -> Self {
        if !details.is_empty() {
            self.details = Some(details);
        }
        self
    }
}

/// Per-layer selectors and phrases. Target markup drifts, so none of this is
/// hardcoded in the layers themselves.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSettings {
    pub status_text: StatusTextSettings,
    pub result_count: ResultCountSettings,
    pub sold_out_banner: BannerSettings,
    pub structured_metadata: StructuredMetadataSettings,
    pub listing_block: ListingBlockSettings,
    pub seat_listing: SeatListingSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusTextSettings {
    pub selector: String,
    pub class_marker: String,
    pub negative_prefixes: Vec<String>,
}

impl Default for StatusTextSettings {
    fn default() -> Self {
        Self {
            selector: "span[role=\"status\"]".into(),
            class_marker: "VisuallyHidden".into(),
            negative_prefixes: vec!["0 no results".into()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultCountSettings {
    pub selector: String,
    pub class_marker: String,
    pub negative_prefixes: Vec<String>,
}

impl Default for ResultCountSettings {
    fn default() -> Self {
        Self {
            selector: "span".into(),
            class_marker: "resultCount".into(),
            negative_prefixes: vec!["0 no results".into()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BannerSettings {
    pub selector: String,
    pub sold_out_phrases: Vec<String>,
}

impl Default for BannerSettings {
    fn default() -> Self {
        Self {
            selector: "span[data-testid=\"message-bar-text\"]".into(),
            sold_out_phrases: vec!["no tickets currently available".into()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredMetadataSettings {
    pub event_types: Vec<String>,
    /// When set, an in-stock offer only counts if its URL mentions this domain.
    pub offer_domain: Option<String>,
}

impl Default for StructuredMetadataSettings {
    fn default() -> Self {
        Self {
            event_types: vec!["MusicEvent".into()],
            offer_domain: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingBlockSettings {
    pub selector: String,
}

impl Default for ListingBlockSettings {
    fn default() -> Self {
        Self {
            selector: "[data-testid=\"ticket-list\"]".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeatListingSettings {
    pub selector: String,
    pub keywords: Vec<String>,
    pub event_types: Vec<String>,
}

impl Default for SeatListingSettings {
    fn default() -> Self {
        Self {
            selector: "div[aria-label]".into(),
            keywords: ["section", "row", "standing", "circle", "pitch", "general admission"]
                .into_iter()
                .map(String::from)
                .collect(),
            event_types: vec!["MusicEvent".into()],
        }
    }
}
