use async_trait::async_trait;
use dropwatch_core_types::AlertRecord;
use tracing::warn;

use crate::errors::NotifyError;
use crate::notifier::Notifier;

/// Writes alerts to the log only. Used for dry runs and when no transport
/// is configured.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, record: &AlertRecord) -> Result<(), NotifyError> {
        warn!(
            target: "notifier",
            subject = record.subject(),
            url = %record.target_url,
            prices = ?record.price_labels(),
            "{}",
            record.body()
        );
        Ok(())
    }
}
