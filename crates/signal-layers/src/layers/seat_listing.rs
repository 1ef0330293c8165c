use dropwatch_core_types::{LayerId, LayerRole, OfferDetail, VerdictDetails};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::Result;
use crate::html::{contains_any, select_all};
use crate::jsonld;
use crate::model::{Finding, ParsedPage, SeatListingSettings};
use crate::registry::SignalExtractor;

static PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([£$€])([\d,.]+)").unwrap());
static LEADING_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[£$€][\d,.]+,?\s*").unwrap());
static SELECT_TICKETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)select (resale )?tickets").unwrap());

fn currency_for(symbol: &str) -> Option<&'static str> {
    match symbol {
        "£" => Some("GBP"),
        "$" => Some("USD"),
        "€" => Some("EUR"),
        _ => None,
    }
}

/// Seat blocks exposed through `aria-label`s such as
/// "£45.00, Section A1, Row 3, Select Tickets".
pub struct SeatListingLayer {
    id: LayerId,
    role: LayerRole,
    settings: SeatListingSettings,
}

impl SeatListingLayer {
    pub const ID: &'static str = "seat-listing";

    pub fn new(settings: SeatListingSettings) -> Self {
        Self {
            id: LayerId::from(Self::ID),
            role: LayerRole::Advisory,
            settings,
        }
    }

    pub fn with_role_override(mut self, role: Option<LayerRole>) -> Self {
        if let Some(role) = role {
            self.role = role;
        }
        self
    }

    fn offer_from_label(&self, label: &str) -> OfferDetail {
        let (price, currency) = match PRICE.captures(label) {
            Some(caps) => (
                caps.get(2)
                    .map(|m| m.as_str().trim_end_matches([',', '.']).to_string()),
                caps.get(1)
                    .and_then(|m| currency_for(m.as_str()))
                    .map(String::from),
            ),
            None => (None, None),
        };
        let seat = SELECT_TICKETS.replace_all(label, "");
        let seat = LEADING_PRICE.replace(seat.trim(), "");
        let seat = seat.trim().trim_end_matches(',').trim().to_string();
        OfferDetail {
            price,
            currency,
            location: (!seat.is_empty()).then_some(seat),
            url: None,
            availability: None,
        }
    }
}

impl Default for SeatListingLayer {
    fn default() -> Self {
        Self::new(SeatListingSettings::default())
    }
}

impl SignalExtractor for SeatListingLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn role(&self) -> LayerRole {
        self.role
    }

    fn risk(&self) -> &'static str {
        "seat map labels exist for greyed-out blocks too; keyword matching can \
         report seats that cannot actually be bought"
    }

    fn inspect(&self, page: &ParsedPage<'_>) -> Result<Finding> {
        let mut offers = Vec::new();
        for element in select_all(page.document(), &self.settings.selector)? {
            let Some(label) = element.value().attr("aria-label") else {
                continue;
            };
            let label = label.trim();
            if label.is_empty() || !contains_any(label, &self.settings.keywords) {
                continue;
            }
            let offer = self.offer_from_label(label);
            if !offers.contains(&offer) {
                offers.push(offer);
            }
        }

        if offers.is_empty() {
            return Ok(Finding::negative("no seat listings found"));
        }

        let event = jsonld::scan(page.document())?
            .events(&self.settings.event_types)
            .next()
            .map(jsonld::event_metadata);
        let evidence = format!("{} seat listing(s) found", offers.len());
        Ok(Finding::positive(evidence).with_details(VerdictDetails { event, offers }))
    }
}
