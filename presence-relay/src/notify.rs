//! Out-of-band notifications for messages nobody else is around to read.
//!
//! The coordinator only ever calls [`Notifier::dispatch`], which must return
//! immediately. [`MailNotifier`] turns each dispatch into a detached task that
//! drives a [`Mailer`] and reports the outcome to the log, and nowhere else.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message as Email, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_SUBJECT: &str = "Message";
pub const DEFAULT_BODY_PREFIX: &str = "You received a message: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Fixed recipient, subject and body prefix used for every notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPolicy {
    pub recipient: String,
    pub subject: String,
    pub body_prefix: String,
}

impl NotificationPolicy {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            subject: DEFAULT_SUBJECT.to_string(),
            body_prefix: DEFAULT_BODY_PREFIX.to_string(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn compose(&self, text: &str) -> Notification {
        Notification {
            recipient: self.recipient.clone(),
            subject: self.subject.clone(),
            body: format!("{}{}", self.body_prefix, text),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no mail credentials configured")]
    NotConfigured,
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Fire-and-forget dispatch. Implementations must not block the caller.
pub trait Notifier {
    fn dispatch(&self, notification: Notification);
}

/// Delivers one notification, returning a short description of the server
/// response on success.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<String, NotifyError>;
}

pub struct MailNotifier {
    mailer: Arc<dyn Mailer>,
}

impl MailNotifier {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

impl Notifier for MailNotifier {
    fn dispatch(&self, notification: Notification) {
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            match mailer.send(&notification).await {
                Ok(response) => info!(
                    recipient = %notification.recipient,
                    %response,
                    "notification email sent"
                ),
                Err(error) => warn!(
                    recipient = %notification.recipient,
                    %error,
                    "notification email failed"
                ),
            }
        });
    }
}

#[derive(Clone)]
pub struct MailCredentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Sends mail through an authenticated SMTP relay; the sender address is the
/// credential user.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(relay: &str, credentials: &MailCredentials) -> Result<Self, NotifyError> {
        let sender: Mailbox = credentials.user.parse()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(relay)?
            .credentials(Credentials::new(
                credentials.user.clone(),
                credentials.password.clone(),
            ))
            .build();
        Ok(Self { transport, sender })
    }

    /// Checks the relay is reachable. Failure is logged and otherwise ignored.
    pub async fn verify(&self) {
        match self.transport.test_connection().await {
            Ok(true) => info!("mail transport is ready to send messages"),
            Ok(false) => warn!("mail transport did not accept a test connection"),
            Err(error) => warn!(%error, "mail transport error"),
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, notification: &Notification) -> Result<String, NotifyError> {
        let email = Email::builder()
            .from(self.sender.clone())
            .to(notification.recipient.parse()?)
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())?;

        let response = self.transport.send(email).await?;
        let detail = response.message().collect::<Vec<_>>().join(" ");
        Ok(format!("{} {}", response.code(), detail))
    }
}

/// Stand-in used when no sender credentials are configured.
pub struct UnconfiguredMailer;

#[async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send(&self, _notification: &Notification) -> Result<String, NotifyError> {
        Err(NotifyError::NotConfigured)
    }
}
