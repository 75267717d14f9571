//! Outbound email notifications, consumed by the mailer service.

use async_nats::Client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::debug;

pub const DEFAULT_SUBJECT: &str = "verification-email";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Template {
    #[serde(rename = "Verification")]
    #[strum(serialize = "Verification")]
    Verification,
    #[serde(rename = "Forgot Password")]
    #[strum(serialize = "Forgot Password")]
    ForgotPassword,
}

/// Payload published for the mailer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailNotification {
    pub id: String,
    pub name: String,
    pub email: String,
    pub token: String,
    pub template: Template,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to publish notification: {0}")]
    Publish(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &EmailNotification) -> Result<(), NotifyError>;
}

/// Publishes JSON notifications on a NATS subject.
pub struct NatsNotifier {
    client: Client,
    subject: String,
}

impl NatsNotifier {
    pub fn new(client: Client, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }
}

#[async_trait]
impl Notifier for NatsNotifier {
    async fn notify(&self, notification: &EmailNotification) -> Result<(), NotifyError> {
        let payload = serde_json::to_vec(notification)?;
        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .map_err(|e| NotifyError::Publish(e.to_string()))?;
        self.client
            .flush()
            .await
            .map_err(|e| NotifyError::Publish(e.to_string()))?;

        debug!(
            subject = %self.subject,
            template = %notification.template,
            email = %notification.email,
            "Published notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let notification = EmailNotification {
            id: "42".into(),
            name: "User".into(),
            email: "a@b.com".into(),
            token: "tok".into(),
            template: Template::ForgotPassword,
        };
        assert_eq!(
            serde_json::to_value(&notification).unwrap(),
            json!({
                "id": "42",
                "name": "User",
                "email": "a@b.com",
                "token": "tok",
                "template": "Forgot Password"
            })
        );
        assert_eq!(Template::Verification.to_string(), "Verification");
    }
}
