use dropwatch_core_types::{LayerId, LayerRole};

use crate::errors::Result;
use crate::html::{contains_any, select_all, text_of};
use crate::model::{BannerSettings, Finding, ParsedPage};
use crate::registry::SignalExtractor;

/// The message bar that reads "no tickets currently available" while sold out.
pub struct SoldOutBannerLayer {
    id: LayerId,
    role: LayerRole,
    settings: BannerSettings,
}

impl SoldOutBannerLayer {
    pub const ID: &'static str = "sold-out-banner";

    pub fn new(settings: BannerSettings) -> Self {
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
}

impl Default for SoldOutBannerLayer {
    fn default() -> Self {
        Self::new(BannerSettings::default())
    }
}

impl SignalExtractor for SoldOutBannerLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn role(&self) -> LayerRole {
        self.role
    }

    fn risk(&self) -> &'static str {
        "high false-positive rate: the same message bar carries unrelated notices \
         (fees, queue info) which read as available"
    }

    fn inspect(&self, page: &ParsedPage<'_>) -> Result<Finding> {
        let Some(banner) = select_all(page.document(), &self.settings.selector)?
            .into_iter()
            .next()
        else {
            return Ok(Finding::unknown("no sold-out banner found"));
        };

        let text = text_of(&banner).to_lowercase();
        Ok(if contains_any(&text, &self.settings.sold_out_phrases) {
            Finding::negative(format!("NO TICKETS (text: '{text}')"))
        } else {
            Finding::positive(format!("TICKETS POSSIBLY AVAILABLE (text: '{text}')"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropwatch_core_types::{Classification, PageSnapshot};

    fn evaluate(markup: &str) -> Classification {
        let snapshot = PageSnapshot::captured_now(markup, "test");
        SoldOutBannerLayer::default().evaluate(&snapshot).classification
    }

    #[test]
    fn banner_classifies() {
        assert_eq!(
            evaluate(r#"<span data-testid="message-bar-text">No tickets currently available.</span>"#),
            Classification::Negative
        );
        assert_eq!(
            evaluate(r#"<span data-testid="message-bar-text">Prices include fees</span>"#),
            Classification::Positive
        );
        assert_eq!(evaluate("<p>nothing</p>"), Classification::Unknown);
    }
}
