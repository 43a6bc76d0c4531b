use std::net::SocketAddr;

use axum::http::HeaderValue;
use lettre::message::Mailbox;
use thiserror::Error;

use crate::{
    cli::ServeArgs,
    notify::{MailCredentials, NotificationPolicy},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid allowed origin '{0}'")]
    Origin(String),
    #[error("invalid mail address '{address}': {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },
    #[error("notification recipient must not be empty")]
    MissingRecipient,
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub relay: String,
    pub credentials: MailCredentials,
}

/// Validated settings, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub listen: SocketAddr,
    pub allowed_origins: Vec<HeaderValue>,
    pub mail: Option<MailSettings>,
    pub policy: NotificationPolicy,
}

/// Recipient used when neither mail nor a recipient is configured; nothing is
/// ever delivered to it.
const UNSET_RECIPIENT: &str = "nobody@localhost";

impl TryFrom<ServeArgs> for RelayConfig {
    type Error = ConfigError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let allowed_origins = args
            .allowed_origins
            .iter()
            .map(|origin| origin.trim())
            .filter(|origin| !origin.is_empty())
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|_| ConfigError::Origin(origin.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mail = match (args.mail_user, args.mail_password) {
            (Some(user), Some(password)) => {
                validate_address(&user)?;
                Some(MailSettings {
                    relay: args.smtp_relay,
                    credentials: MailCredentials { user, password },
                })
            }
            _ => None,
        };

        let recipient = match (args.notify_recipient, &mail) {
            (Some(recipient), _) => recipient,
            (None, Some(mail)) => mail.credentials.user.clone(),
            (None, None) => UNSET_RECIPIENT.to_string(),
        };
        if mail.is_some() {
            validate_address(&recipient)?;
        }
        if recipient.trim().is_empty() {
            return Err(ConfigError::MissingRecipient);
        }

        Ok(Self {
            listen: args.listen,
            allowed_origins,
            mail,
            policy: NotificationPolicy::new(recipient).with_subject(args.notify_subject),
        })
    }
}

fn validate_address(address: &str) -> Result<(), ConfigError> {
    address
        .parse::<Mailbox>()
        .map(|_| ())
        .map_err(|source| ConfigError::Address {
            address: address.to_string(),
            source,
        })
}
