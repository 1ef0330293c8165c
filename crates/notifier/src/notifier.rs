use async_trait::async_trait;
use dropwatch_core_types::AlertRecord;

use crate::errors::NotifyError;

/// Hands one alert to a delivery channel. Not required to be idempotent:
/// the poll loop deduplicates on the record's key.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, record: &AlertRecord) -> Result<(), NotifyError>;
}
