use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use dropwatch_core_types::{AlertRecord, VerdictDetails};
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::debug;

use crate::errors::NotifyError;
use crate::notifier::Notifier;

#[derive(Clone)]
pub struct WebhookConfig {
    pub url: String,
    /// Sent as a bearer token when present. Never logged.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: String,
    target: &'a str,
    url: &'a str,
    details: &'a VerdictDetails,
    found_at: String,
}

/// POSTs alerts as JSON to an HTTP endpoint (chat hook, mail relay, ...).
pub struct WebhookNotifier {
    client: Client,
    url: Url,
    token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Result<Self, NotifyError> {
        let url = Url::parse(config.url.trim())
            .map_err(|err| NotifyError::Config(format!("invalid webhook url: {err}")))?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| NotifyError::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            url,
            token: config.token.filter(|token| !token.trim().is_empty()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, record: &AlertRecord) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            subject: record.subject(),
            body: record.body(),
            target: record.dedup_key.as_str(),
            url: &record.target_url,
            details: &record.details,
            found_at: record.sent_at.to_rfc3339(),
        };

        let mut request = self.client.post(self.url.clone()).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| NotifyError::Transport(err.without_url().to_string()))?;
        let status = response.status();
        if status.is_success() {
            debug!(target: "notifier", status = status.as_u16(), "webhook accepted alert");
            Ok(())
        } else {
            Err(NotifyError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_url_is_a_config_error() {
        let err = WebhookNotifier::new(WebhookConfig {
            url: "not a url".into(),
            token: None,
            timeout: Duration::from_secs(1),
        })
        .err()
        .unwrap();
        assert!(matches!(err, NotifyError::Config(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn debug_redacts_token() {
        let config = WebhookConfig {
            url: "https://hooks.example.com/x".into(),
            token: Some("s3cret".into()),
            timeout: Duration::from_secs(1),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }
}
