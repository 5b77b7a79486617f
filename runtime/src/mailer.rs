//! Outgoing mail.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tracing::info;

/// Sender address used for conference confirmations.
pub const NOREPLY_SENDER: &str = "noreply@conference-central.local";

/// Errors from mail delivery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    /// The mail backend rejected or failed to send the message.
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

/// A plain-text message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mail {
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
}

impl Mail {
    /// Confirmation sent to an organizer after creating a conference.
    #[must_use]
    pub fn conference_confirmation(to: &str, conference_info: &str) -> Self {
        Self {
            from: NOREPLY_SENDER.to_string(),
            to: to.to_string(),
            subject: "You created a new Conference!".to_string(),
            body: format!("Hi, you have created the following conference:\r\n\r\n{conference_info}"),
        }
    }
}

/// Mail delivery backend.
pub trait Mailer: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns [`MailError::Delivery`] when the message could not be sent.
    fn send(&self, mail: Mail) -> Pin<Box<dyn Future<Output = Result<(), MailError>> + Send + '_>>;
}

/// Mailer that logs messages instead of sending them. For development.
#[derive(Clone, Debug, Default)]
pub struct ConsoleMailer;

impl ConsoleMailer {
    /// Create a new console mailer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Mailer for ConsoleMailer {
    fn send(&self, mail: Mail) -> Pin<Box<dyn Future<Output = Result<(), MailError>> + Send + '_>> {
        Box::pin(async move {
            info!(
                from = %mail.from,
                to = %mail.to,
                subject = %mail.subject,
                body = %mail.body,
                "Outgoing mail (console)"
            );
            Ok(())
        })
    }
}
