use chrono::{TimeZone, Utc};
use dropwatch_core_types::{Classification, LayerId, LayerVerdict, PageSnapshot};
use dropwatch_signal_layers::LayerRegistry;

fn snapshot(name: &str) -> PageSnapshot {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    let markup = std::fs::read_to_string(&path).unwrap();
    let fetched_at = Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap();
    PageSnapshot::new(markup, fetched_at, path)
}

fn classification(verdicts: &[LayerVerdict], layer: &str) -> Classification {
    verdicts
        .iter()
        .find(|verdict| verdict.layer == LayerId::from(layer))
        .map(|verdict| verdict.classification)
        .unwrap()
}

#[test]
fn sold_out_page_has_no_positive_layer() {
    let verdicts = LayerRegistry::standard().evaluate_all(&snapshot("sold_out.html"));
    assert!(verdicts.iter().all(|verdict| !verdict.is_positive()));
    assert_eq!(classification(&verdicts, "status-text"), Classification::Negative);
    assert_eq!(classification(&verdicts, "result-count"), Classification::Negative);
    assert_eq!(classification(&verdicts, "sold-out-banner"), Classification::Negative);
    assert_eq!(
        classification(&verdicts, "structured-metadata"),
        Classification::Negative
    );
}

#[test]
fn metadata_disagrees_with_status_text() {
    let verdicts = LayerRegistry::standard().evaluate_all(&snapshot("metadata_only.html"));
    assert_eq!(classification(&verdicts, "status-text"), Classification::Negative);

    let metadata = verdicts
        .iter()
        .find(|verdict| verdict.layer.as_str() == "structured-metadata")
        .unwrap();
    assert_eq!(metadata.classification, Classification::Positive);
    let details = metadata.details.as_ref().unwrap();
    assert_eq!(details.offers[0].price_label().as_deref(), Some("45.00 GBP"));
    assert_eq!(details.event.as_ref().unwrap().locality.as_deref(), Some("London"));
}

#[test]
fn available_page_lights_up_every_layer() {
    let verdicts = LayerRegistry::standard().evaluate_all(&snapshot("available.html"));
    for verdict in &verdicts {
        assert_eq!(
            verdict.classification,
            Classification::Positive,
            "{} was {}",
            verdict.layer,
            verdict.evidence
        );
    }

    let seats = verdicts
        .iter()
        .find(|verdict| verdict.layer.as_str() == "seat-listing")
        .and_then(|verdict| verdict.details.clone())
        .unwrap();
    assert_eq!(seats.offers.len(), 2);
    assert_eq!(seats.offers[0].price_label().as_deref(), Some("72.50 GBP"));
    assert_eq!(seats.offers[1].location.as_deref(), Some("Standing"));
    assert_eq!(seats.event.unwrap().name.as_deref(), Some("The Band"));
}

#[test]
fn evaluation_is_repeatable() {
    let registry = LayerRegistry::standard();
    let page = snapshot("available.html");
    assert_eq!(registry.evaluate_all(&page), registry.evaluate_all(&page));
}

#[test]
fn verdicts_follow_registry_order() {
    let registry = LayerRegistry::standard();
    let verdicts = registry.evaluate_all(&snapshot("sold_out.html"));
    let layers: Vec<LayerId> = verdicts.into_iter().map(|verdict| verdict.layer).collect();
    assert_eq!(layers, registry.ids());
}
