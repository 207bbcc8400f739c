//! Outbound email.
//!
//! Delivery is best effort. The engine commits state first and only then
//! hands emails to a [`Notifier`]; failures come back as a
//! [`NotificationReport`] next to the successful result, never as an error
//! that would undo the change.

pub mod emails;
pub mod outbox;
pub mod relay;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

pub use outbox::MemoryOutbox;
pub use relay::RelayMailer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// No mail transport is configured.
    Disabled,
    Transport(String),
    Rejected { status: u16, body: String },
    Template(String),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::Disabled => f.write_str("notifications disabled"),
            NotifyError::Transport(e) => write!(f, "mail transport error: {e}"),
            NotifyError::Rejected { status, body } => write!(f, "mail relay rejected message ({status}): {body}"),
            NotifyError::Template(e) => write!(f, "email template error: {e}"),
        }
    }
}

impl std::error::Error for NotifyError {}

impl From<askama::Error> for NotifyError {
    fn from(e: askama::Error) -> Self {
        NotifyError::Template(e.to_string())
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), NotifyError>;
}

/// Used when no relay is configured. Every send reports `Disabled`.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, _email: &Email) -> Result<(), NotifyError> {
        Err(NotifyError::Disabled)
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub to: String,
    pub error: NotifyError,
}

/// What happened to the emails of one operation.
#[derive(Debug, Clone, Default)]
pub struct NotificationReport {
    pub sent: usize,
    pub failures: Vec<DeliveryFailure>,
}

impl NotificationReport {
    pub fn attempted(&self) -> usize {
        self.sent + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: NotificationReport) {
        self.sent += other.sent;
        self.failures.extend(other.failures);
    }

    /// Warning text for the caller, or `None` when everything was delivered.
    pub fn summary(&self) -> Option<String> {
        let first = self.failures.first()?;
        Some(format!(
            "Saved, but {} of {} notification(s) failed: {}",
            self.failures.len(),
            self.attempted(),
            first.error
        ))
    }
}

/// Send each email in turn, collecting failures instead of stopping.
pub async fn dispatch(notifier: &dyn Notifier, emails: Vec<Email>) -> NotificationReport {
    let mut report = NotificationReport::default();
    for email in emails {
        match notifier.send(&email).await {
            Ok(()) => report.sent += 1,
            Err(error) => {
                log::warn!("Email '{}' to {} not sent: {error}", email.subject, email.to);
                report.failures.push(DeliveryFailure { to: email.to, error });
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(to: &str) -> Email {
        Email {
            to: to.to_string(),
            subject: "Subject".to_string(),
            html: "<p>Body</p>".to_string(),
            text: "Body".to_string(),
        }
    }

    #[tokio::test]
    async fn disabled_notifier_reports_every_email() {
        let report = dispatch(&DisabledNotifier, vec![email("a@example.com"), email("b@example.com")]).await;
        assert_eq!(report.sent, 0);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].error.to_string(), "notifications disabled");
        assert_eq!(
            report.summary().as_deref(),
            Some("Saved, but 2 of 2 notification(s) failed: notifications disabled")
        );
    }

    #[tokio::test]
    async fn nothing_to_send_is_clean() {
        let report = dispatch(&DisabledNotifier, vec![]).await;
        assert!(report.is_clean());
        assert!(report.summary().is_none());
    }
}
