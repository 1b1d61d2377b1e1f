//! Outbound notifications.
//!
//! Delivery itself is an external concern; the service only needs a
//! [`Notifier`] it can call from a tracked background task.

use async_trait::async_trait;
use thiserror::Error;

/// Template sent to newly registered users.
pub const WELCOME_TEMPLATE: &str = "user_welcome";

const KNOWN_TEMPLATES: &[&str] = &[WELCOME_TEMPLATE];

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },
}

/// Capability to send a templated message to a recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        template: &str,
        data: serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// Notifier that records deliveries in the log instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        recipient: &str,
        template: &str,
        data: serde_json::Value,
    ) -> Result<(), NotifyError> {
        if !KNOWN_TEMPLATES.contains(&template) {
            return Err(NotifyError::UnknownTemplate(template.to_string()));
        }
        tracing::info!(recipient, template, %data, "Notification delivered");
        Ok(())
    }
}
