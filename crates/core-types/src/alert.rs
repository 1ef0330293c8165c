use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::TargetId;
use crate::verdict::VerdictDetails;

pub const ALERT_SUBJECT: &str = "Tickets Available!";

/// What happened when the loop handed an alert to the notifier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    #[default]
    Pending,
    Delivered {
        attempts: u32,
    },
    Failed {
        attempts: u32,
        last_error: String,
    },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// A found transition, ready for delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// The loop suppresses repeat alerts per key.
    pub dedup_key: TargetId,
    pub target_url: String,
    pub details: VerdictDetails,
    pub sent_at: DateTime<Utc>,
    pub delivery: DeliveryOutcome,
}

impl AlertRecord {
    pub fn new(
        dedup_key: TargetId,
        target_url: impl Into<String>,
        details: VerdictDetails,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            dedup_key,
            target_url: target_url.into(),
            details,
            sent_at,
            delivery: DeliveryOutcome::Pending,
        }
    }

    pub fn subject(&self) -> &'static str {
        ALERT_SUBJECT
    }

    /// One line per extracted offer, prefixed by the event line when known.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(event) = &self.details.event {
            if !event.is_empty() {
                lines.push(event.to_string());
            }
        }
        lines.extend(self.details.offers.iter().map(|offer| offer.to_string()));
        lines
    }

    /// Plain-text notification body.
    pub fn body(&self) -> String {
        let mut body = format!("Tickets have been found!\n{}\n\nDetails:\n", self.target_url);
        let lines = self.summary_lines();
        if lines.is_empty() {
            body.push_str("(No extra details found)");
        } else {
            body.push_str(&lines.join("\n"));
        }
        body
    }

    /// Price labels such as `"45.00 GBP"` across all offers.
    pub fn price_labels(&self) -> Vec<String> {
        self.details
            .offers
            .iter()
            .filter_map(|offer| offer.price_label())
            .collect()
    }
}
