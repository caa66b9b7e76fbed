//! Email Sender - Outbound transport for rendered emails

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;
use tracing::debug;
use trainhub_common::config::SmtpConfig;
use trainhub_common::{Error, Result};
use uuid::Uuid;

/// Sends one rendered email to one recipient.
///
/// Any failure is reported as [`Error::Transport`] and only affects that
/// recipient.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP relay sender backed by lettre
pub struct SmtpEmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    hostname: String,
}

impl SmtpEmailSender {
    /// Build the relay transport. No connection is made until the first send.
    pub fn new(config: &SmtpConfig, hostname: &str) -> Result<Self> {
        let address: Address = config
            .from_address
            .parse()
            .map_err(|e| Error::Config(format!("Invalid from address: {}", e)))?;
        let from = Mailbox::new(config.from_name.clone(), address);

        let mut transport = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| Error::Config(format!("Failed to create SMTP transport: {}", e)))?
        } else if config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| Error::Config(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        transport = transport.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            transport = transport.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let mailer = transport
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(Self {
            mailer,
            from,
            hostname: hostname.to_string(),
        })
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> Result<Message> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| Error::Transport(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .message_id(Some(format!("<{}@{}>", Uuid::new_v4(), self.hostname)))
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| Error::Transport(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = self.build_message(to, subject, body)?;

        let response = self
            .mailer
            .send(message)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        debug!("Email to {} accepted: {:?}", to, response.code());
        Ok(())
    }
}
