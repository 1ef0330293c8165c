use dropwatch_core_types::{LayerId, LayerRole};

use crate::errors::Result;
use crate::html::{has_class_containing, select_all, starts_with_any, text_of};
use crate::model::{Finding, ParsedPage, ResultCountSettings};
use crate::registry::SignalExtractor;

/// The visible "N results" counter above the listing.
pub struct ResultCountLayer {
    id: LayerId,
    role: LayerRole,
    settings: ResultCountSettings,
}

impl ResultCountLayer {
    pub const ID: &'static str = "result-count";

    pub fn new(settings: ResultCountSettings) -> Self {
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

impl Default for ResultCountLayer {
    fn default() -> Self {
        Self::new(ResultCountSettings::default())
    }
}

impl SignalExtractor for ResultCountLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn role(&self) -> LayerRole {
        self.role
    }

    fn risk(&self) -> &'static str {
        "counter often renders before the listing settles, so a stale count can \
         read either way; wording outside 'N results' stays Unknown"
    }

    fn inspect(&self, page: &ParsedPage<'_>) -> Result<Finding> {
        let counter = select_all(page.document(), &self.settings.selector)?
            .into_iter()
            .find(|span| has_class_containing(span, &self.settings.class_marker));

        let Some(counter) = counter else {
            return Ok(Finding::unknown(format!(
                "no {} span found",
                self.settings.class_marker
            )));
        };

        let text = text_of(&counter).to_lowercase();
        if starts_with_any(&text, &self.settings.negative_prefixes) {
            return Ok(Finding::negative(format!("NO TICKETS (text: '{text}')")));
        }
        let says_no = text.split_whitespace().any(|word| word == "no");
        if text.contains("result") && !says_no {
            Ok(Finding::positive(format!(
                "TICKETS POSSIBLY AVAILABLE (text: '{text}')"
            )))
        } else {
            Ok(Finding::unknown(format!("UNRECOGNIZED RESULT (text: '{text}')")))
        }
    }
}
