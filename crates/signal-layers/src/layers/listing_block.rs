use dropwatch_core_types::{LayerId, LayerRole};

use crate::errors::Result;
use crate::html::select_all;
use crate::model::{Finding, ListingBlockSettings, ParsedPage};
use crate::registry::SignalExtractor;

/// Presence of the ticket listing container.
pub struct ListingBlockLayer {
    id: LayerId,
    role: LayerRole,
    settings: ListingBlockSettings,
}

impl ListingBlockLayer {
    pub const ID: &'static str = "listing-block";

    pub fn new(settings: ListingBlockSettings) -> Self {
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
}

impl Default for ListingBlockLayer {
    fn default() -> Self {
        Self::new(ListingBlockSettings::default())
    }
}

impl SignalExtractor for ListingBlockLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn role(&self) -> LayerRole {
        self.role
    }

    fn risk(&self) -> &'static str {
        "the container is rendered empty on many sold-out pages, so presence alone \
         is a weak positive"
    }

    fn inspect(&self, page: &ParsedPage<'_>) -> Result<Finding> {
        let found = select_all(page.document(), &self.settings.selector)?;
        Ok(if found.is_empty() {
            Finding::negative("ticket list element not found")
        } else {
            Finding::positive(format!("ticket list element present ({} match(es))", found.len()))
        })
    }
}
