use std::time::Duration;

use chrono::{TimeZone, Utc};
use dropwatch_core_types::{
    AlertRecord, DeliveryOutcome, EventMetadata, OfferDetail, TargetId, VerdictDetails,
};
use dropwatch_notifier::{deliver, Notifier, NotifyError, RetryPolicy, WebhookConfig, WebhookNotifier};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record() -> AlertRecord {
    AlertRecord::new(
        TargetId::new("arena-nov-02"),
        "https://www.ticketmaster.co.uk/event/1F00",
        VerdictDetails {
            event: Some(EventMetadata {
                name: Some("The Band".into()),
                venue: Some("Arena".into()),
                ..EventMetadata::default()
            }),
            offers: vec![OfferDetail {
                price: Some("45.00".into()),
                currency: Some("GBP".into()),
                location: Some("Standing".into()),
                ..OfferDetail::default()
            }],
        },
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap(),
    )
}

fn notifier(server: &MockServer, token: Option<&str>) -> WebhookNotifier {
    WebhookNotifier::new(WebhookConfig {
        url: format!("{}/hooks/dropwatch", server.uri()),
        token: token.map(String::from),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
        multiplier: 2,
        max_backoff: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn posts_subject_body_and_details() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/dropwatch"))
        .and(header("authorization", "Bearer hook-token"))
        .and(body_partial_json(serde_json::json!({
            "subject": "Tickets Available!",
            "target": "arena-nov-02",
            "details": {"offers": [{"price": "45.00", "currency": "GBP"}]}
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server, Some("hook-token"))
        .send(&record())
        .await
        .unwrap();
}

#[tokio::test]
async fn rejected_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = notifier(&server, None).send(&record()).await.unwrap_err();
    assert_eq!(err, NotifyError::Rejected { status: 403 });
}

#[tokio::test]
async fn server_errors_are_retried_then_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let outcome = deliver(
        &notifier(&server, None),
        &record(),
        &fast_retry(),
        &CancellationToken::new(),
    )
    .await;
    assert_eq!(outcome, DeliveryOutcome::Delivered { attempts: 3 });
}

#[tokio::test]
async fn persistent_failure_yields_failed_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let outcome = deliver(
        &notifier(&server, None),
        &record(),
        &fast_retry(),
        &CancellationToken::new(),
    )
    .await;
    match outcome {
        DeliveryOutcome::Failed { attempts, last_error } => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("500"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}
