//! Outbound delivery seams + the notification dispatcher.
//!
//! Message and email delivery are external collaborators. Neither
//! guarantees idempotency, so the engine never re-sends on an ambiguous
//! failure — a failed delivery is logged and the state machine moves on.

pub mod dispatcher;

use async_trait::async_trait;

pub use dispatcher::NotificationDispatcher;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Send a text message to a phone number.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, phone: &str, text: &str) -> Result<(), DeliveryError>;
}

/// Send an HTML email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, address: &str, subject: &str, html_body: &str)
        -> Result<(), DeliveryError>;
}

/// Log-only sender used by the default binary when no gateway is wired.
pub struct LoggingMessageSender;

#[async_trait]
impl MessageSender for LoggingMessageSender {
    async fn send(&self, phone: &str, text: &str) -> Result<(), DeliveryError> {
        tracing::info!(phone, chars = text.len(), "Outbound message (log-only sender)");
        tracing::debug!(text, "Outbound message body");
        Ok(())
    }
}

/// Log-only email sender used by the default binary.
pub struct LoggingEmailSender;

#[async_trait]
impl EmailSender for LoggingEmailSender {
    async fn send(
        &self,
        address: &str,
        subject: &str,
        _html_body: &str,
    ) -> Result<(), DeliveryError> {
        tracing::info!(address, subject, "Outbound email (log-only sender)");
        Ok(())
    }
}
