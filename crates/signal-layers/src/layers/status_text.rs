use dropwatch_core_types::{LayerId, LayerRole};

use crate::errors::Result;
use crate::html::{has_class_containing, select_all, starts_with_any, text_of};
use crate::model::{Finding, ParsedPage, StatusTextSettings};
use crate::registry::SignalExtractor;

/// Screen-reader status spans (`role=status`, visually hidden) that announce
/// the listing's result count.
///
/// This has been the most reliable signal historically, hence its default
/// authoritative role.
pub struct StatusTextLayer {
    id: LayerId,
    role: LayerRole,
    settings: StatusTextSettings,
}

impl StatusTextLayer {
    pub const ID: &'static str = "status-text";

    pub fn new(settings: StatusTextSettings) -> Self {
        Self {
            id: LayerId::from(Self::ID),
            role: LayerRole::Authoritative,
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

impl Default for StatusTextLayer {
    fn default() -> Self {
        Self::new(StatusTextSettings::default())
    }
}

impl SignalExtractor for StatusTextLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn role(&self) -> LayerRole {
        self.role
    }

    fn risk(&self) -> &'static str {
        "false positive when a status span announces something other than results \
         (loading text, filters); false negative if the site drops the hidden span"
    }

    fn inspect(&self, page: &ParsedPage<'_>) -> Result<Finding> {
        let spans: Vec<_> = select_all(page.document(), &self.settings.selector)?
            .into_iter()
            .filter(|span| has_class_containing(span, &self.settings.class_marker))
            .collect();

        if spans.is_empty() {
            return Ok(Finding::unknown(format!(
                "no {} status span found",
                self.settings.class_marker
            )));
        }

        let mut notes = Vec::with_capacity(spans.len());
        let mut available = false;
        for (idx, span) in spans.iter().enumerate() {
            let text = text_of(span);
            if starts_with_any(&text, &self.settings.negative_prefixes) {
                notes.push(format!("NO TICKETS (span #{}, text: '{}')", idx + 1, text));
            } else {
                available = true;
                notes.push(format!(
                    "TICKETS POSSIBLY AVAILABLE (span #{}, text: '{}')",
                    idx + 1,
                    text
                ));
            }
        }

        let evidence = notes.join("; ");
        Ok(if available {
            Finding::positive(evidence)
        } else {
            Finding::negative(evidence)
        })
    }
}
