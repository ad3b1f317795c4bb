//! SMTP delivery of hook notifications.
//!
//! The relay is configured once from [`SmtpConfig`] and every message is sent as
//! `multipart/alternative` with a plain-text and an HTML part. Delivery is attempted exactly once.

use std::time::Duration;

use hooks_core::{AuthMode, NotificationMessage, SmtpConfig};
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::extension::ClientId;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
  /// Connection, TLS, authentication or timeout failure talking to the relay
  #[error("SMTP delivery failed: {0}")]
  Delivery(#[from] lettre::transport::smtp::Error),

  #[error("Invalid address: {0}")]
  Address(#[from] lettre::address::AddressError),

  #[error("Building message: {0}")]
  Build(#[from] lettre::error::Error),

  #[error("Mail config: {0}")]
  Config(String),
}

/// Delivers a composed notification
pub trait Mailer {
  fn send(&self, message: &NotificationMessage) -> Result<(), MailError>;
}

/// [`Mailer`] backed by a blocking SMTP relay connection
pub struct SmtpMailer {
  transport: SmtpTransport,
  relay: String,
}

impl SmtpMailer {
  pub fn from_config(config: &SmtpConfig) -> Result<Self, MailError> {
    let builder = if config.use_starttls {
      SmtpTransport::starttls_relay(&config.address)?
    } else {
      SmtpTransport::builder_dangerous(&config.address)
    };

    let mut builder = builder
      .port(config.port)
      .timeout(Some(Duration::from_secs(config.timeout_secs)));

    if let Some(ref domain) = config.domain {
      builder = builder.hello_name(ClientId::Domain(domain.clone()));
    }

    let mechanism = match config.auth_mode {
      AuthMode::Plain => Some(Mechanism::Plain),
      AuthMode::Login => Some(Mechanism::Login),
      AuthMode::None => None,
    };
    if let Some(mechanism) = mechanism {
      let (Some(username), Some(password)) = (&config.username, &config.password) else {
        return Err(MailError::Config(
          "smtp.username and smtp.password are required unless auth_mode = \"none\"".to_string(),
        ));
      };
      builder = builder
        .credentials(Credentials::new(username.clone(), password.clone()))
        .authentication(vec![mechanism]);
    }

    debug!(
      relay = %config.address,
      port = config.port,
      starttls = config.use_starttls,
      "Configured SMTP relay"
    );

    Ok(Self {
      transport: builder.build(),
      relay: format!("{}:{}", config.address, config.port),
    })
  }
}

impl Mailer for SmtpMailer {
  fn send(&self, message: &NotificationMessage) -> Result<(), MailError> {
    let email = build_message(message)?;
    self.transport.send(&email)?;
    info!(
      relay = %self.relay,
      recipient = %message.recipient,
      subject = %message.subject,
      "Notification sent"
    );
    Ok(())
  }
}

/// Build the MIME message: text part first, HTML part second
pub fn build_message(message: &NotificationMessage) -> Result<Message, MailError> {
  if message.recipient.trim().is_empty() {
    return Err(MailError::Config("mail.recipient is not set".to_string()));
  }

  let from: Mailbox = message.sender.parse()?;
  let to: Mailbox = message.recipient.parse()?;

  let email = Message::builder()
    .from(from)
    .to(to)
    .subject(message.subject.as_str())
    .multipart(
      MultiPart::alternative()
        .singlepart(
          SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .body(message.text_body.clone()),
        )
        .singlepart(
          SinglePart::builder()
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone()),
        ),
    )?;

  Ok(email)
}
