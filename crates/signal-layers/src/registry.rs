use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dropwatch_core_types::{Classification, LayerId, LayerRole, LayerVerdict, PageSnapshot};
use tracing::{debug, warn};

use crate::errors::{LayerError, Result};
use crate::layers::{
    ListingBlockLayer, ResultCountLayer, SeatListingLayer, SoldOutBannerLayer, StatusTextLayer,
    StructuredMetadataLayer,
};
use crate::model::{Finding, LayerSettings, ParsedPage};

/// One independent detection heuristic.
///
/// Implementations must be pure: the same snapshot always yields the same
/// finding, and nothing outside the layer is touched.
pub trait SignalExtractor: Send + Sync {
    fn id(&self) -> &LayerId;

    fn role(&self) -> LayerRole;

    /// Known false-positive / false-negative exposure, for operators.
    fn risk(&self) -> &'static str;

    fn inspect(&self, page: &ParsedPage<'_>) -> Result<Finding>;

    /// Parse and inspect a snapshot on its own. Errors become an `Error` verdict.
    fn evaluate(&self, snapshot: &PageSnapshot) -> LayerVerdict {
        let page = ParsedPage::parse(snapshot);
        stamp(self.id(), self.role(), snapshot, self.inspect(&page))
    }
}

fn stamp(
    layer: &LayerId,
    role: LayerRole,
    snapshot: &PageSnapshot,
    outcome: Result<Finding>,
) -> LayerVerdict {
    match outcome {
        Ok(finding) => {
            let verdict = LayerVerdict::new(
                layer.clone(),
                role,
                finding.classification,
                finding.evidence,
                snapshot.fetched_at(),
            );
            match finding.details {
                Some(details) => verdict.with_details(details),
                None => verdict,
            }
        }
        Err(err) => LayerVerdict::new(
            layer.clone(),
            role,
            Classification::Error,
            err.to_string(),
            snapshot.fetched_at(),
        ),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Ordered set of layers. Order is fixed at construction so audit logs diff cleanly.
#[derive(Clone, Default)]
pub struct LayerRegistry {
    layers: Vec<Arc<dyn SignalExtractor>>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All known layers with default settings and roles, in default order.
    pub fn standard() -> Self {
        let ids: Vec<LayerId> = KNOWN_LAYERS.iter().map(|id| LayerId::from(*id)).collect();
        // Known ids with default settings cannot fail to build.
        Self::from_settings(&LayerSettings::default(), &ids, &HashMap::new()).unwrap_or_default()
    }

    /// Builds the enabled layers, in the given order, applying role overrides.
    pub fn from_settings(
        settings: &LayerSettings,
        enabled: &[LayerId],
        roles: &HashMap<LayerId, LayerRole>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for id in enabled {
            let role = roles.get(id).copied();
            let layer: Arc<dyn SignalExtractor> = match id.as_str() {
                StatusTextLayer::ID => Arc::new(
                    StatusTextLayer::new(settings.status_text.clone()).with_role_override(role),
                ),
                ResultCountLayer::ID => Arc::new(
                    ResultCountLayer::new(settings.result_count.clone()).with_role_override(role),
                ),
                SoldOutBannerLayer::ID => Arc::new(
                    SoldOutBannerLayer::new(settings.sold_out_banner.clone())
                        .with_role_override(role),
                ),
                StructuredMetadataLayer::ID => Arc::new(
                    StructuredMetadataLayer::new(settings.structured_metadata.clone())
                        .with_role_override(role),
                ),
                ListingBlockLayer::ID => Arc::new(
                    ListingBlockLayer::new(settings.listing_block.clone())
                        .with_role_override(role),
                ),
                SeatListingLayer::ID => Arc::new(
                    SeatListingLayer::new(settings.seat_listing.clone()).with_role_override(role),
                ),
                other => return Err(LayerError::UnknownLayer(other.to_string())),
            };
            registry.register(layer)?;
        }
        Ok(registry)
    }

    /// Appends a layer; ids must be unique.
    pub fn register(&mut self, layer: Arc<dyn SignalExtractor>) -> Result<()> {
        if self.layers.iter().any(|existing| existing.id() == layer.id()) {
            return Err(LayerError::DuplicateLayer(layer.id().to_string()));
        }
        debug!(target: "signal-layers", layer = %layer.id(), role = %layer.role(), "layer registered");
        self.layers.push(layer);
        Ok(())
    }

    pub fn ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(|layer| layer.id().clone()).collect()
    }

    pub fn layers(&self) -> impl Iterator<Item = &Arc<dyn SignalExtractor>> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Runs every layer over one parse of the snapshot. A layer that errors
    /// or panics yields an `Error` verdict; the others are unaffected.
    pub fn evaluate_all(&self, snapshot: &PageSnapshot) -> Vec<LayerVerdict> {
        let page = ParsedPage::parse(snapshot);
        self.layers
            .iter()
            .map(|layer| {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| layer.inspect(&page)))
                    .unwrap_or_else(|payload| Err(LayerError::Panicked(panic_message(payload))));
                if let Err(err) = &outcome {
                    warn!(target: "signal-layers", layer = %layer.id(), error = %err, "layer evaluation failed");
                }
                stamp(layer.id(), layer.role(), snapshot, outcome)
            })
            .collect()
    }
}

/// Every layer id `from_settings` understands, in default evaluation order.
pub const KNOWN_LAYERS: &[&str] = &[
    StatusTextLayer::ID,
    ResultCountLayer::ID,
    SoldOutBannerLayer::ID,
    StructuredMetadataLayer::ID,
    ListingBlockLayer::ID,
    SeatListingLayer::ID,
];

#[cfg(test)]
mod tests {
    use super::*;

    struct Panicky(LayerId);

    impl SignalExtractor for Panicky {
        fn id(&self) -> &LayerId {
            &self.0
        }

        fn role(&self) -> LayerRole {
            LayerRole::Advisory
        }

        fn risk(&self) -> &'static str {
            "always panics"
        }

        fn inspect(&self, _page: &ParsedPage<'_>) -> Result<Finding> {
            panic!("boom")
        }
    }

    struct Fixed(LayerId, Classification);

    impl SignalExtractor for Fixed {
        fn id(&self) -> &LayerId {
            &self.0
        }

        fn role(&self) -> LayerRole {
            LayerRole::Corroborating
        }

        fn risk(&self) -> &'static str {
            "fixed"
        }

        fn inspect(&self, _page: &ParsedPage<'_>) -> Result<Finding> {
            Ok(Finding::new(self.1, "fixed"))
        }
    }

    #[test]
    fn panicking_layer_is_isolated() {
        let mut registry = LayerRegistry::new();
        registry
            .register(Arc::new(Panicky(LayerId::from("panicky"))))
            .unwrap();
        registry
            .register(Arc::new(Fixed(LayerId::from("fixed"), Classification::Positive)))
            .unwrap();

        let snapshot = PageSnapshot::captured_now("<html></html>", "test");
        let verdicts = registry.evaluate_all(&snapshot);
        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].classification, Classification::Error);
        assert!(verdicts[0].evidence.contains("boom"));
        assert_eq!(verdicts[1].classification, Classification::Positive);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = LayerRegistry::new();
        registry
            .register(Arc::new(Fixed(LayerId::from("a"), Classification::Negative)))
            .unwrap();
        let err = registry
            .register(Arc::new(Fixed(LayerId::from("a"), Classification::Positive)))
            .unwrap_err();
        assert_eq!(err, LayerError::DuplicateLayer("a".into()));
    }

    #[test]
    fn unknown_layer_names_fail() {
        let err = LayerRegistry::from_settings(
            &LayerSettings::default(),
            &[LayerId::from("crystal-ball")],
            &HashMap::new(),
        )
        .err()
        .unwrap();
        assert_eq!(err, LayerError::UnknownLayer("crystal-ball".into()));
    }

    #[test]
    fn standard_registry_keeps_default_order() {
        let registry = LayerRegistry::standard();
        let ids: Vec<String> = registry.ids().into_iter().map(|id| id.0).collect();
        assert_eq!(ids, KNOWN_LAYERS.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }

    #[test]
    fn role_overrides_apply() {
        let mut roles = HashMap::new();
        roles.insert(LayerId::from("listing-block"), LayerRole::Authoritative);
        let registry = LayerRegistry::from_settings(
            &LayerSettings::default(),
            &[LayerId::from("listing-block")],
            &roles,
        )
        .unwrap();
        let layer = registry.layers().next().unwrap();
        assert_eq!(layer.role(), LayerRole::Authoritative);
    }
}
