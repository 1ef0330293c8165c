//! Alert delivery.
//!
//! A [`Notifier`] sends one [`AlertRecord`](dropwatch_core_types::AlertRecord);
//! [`deliver`] wraps it in bounded retry and reports a
//! [`DeliveryOutcome`](dropwatch_core_types::DeliveryOutcome) instead of failing.

pub mod errors;
pub mod log;
pub mod notifier;
pub mod retry;
pub mod webhook;

pub use errors::NotifyError;
pub use log::LogNotifier;
pub use notifier::Notifier;
pub use retry::{deliver, RetryPolicy};
pub use webhook::{WebhookConfig, WebhookNotifier};
