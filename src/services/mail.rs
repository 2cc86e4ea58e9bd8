use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

use crate::{config::MailerConfig, error::AppError};

use super::notifier::NotifyError;

/// A rendered message ready for the wire.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub from: Mailbox,
    pub to: Mailbox,
    pub subject: String,
    pub template: &'static str,
    pub html_body: String,
}

/// Outbound mail delivery. Success or failure of `send` is the only signal
/// the notifier consumes.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), NotifyError>;
}

#[derive(Clone)]
pub struct SmtpMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailTransport {
    pub fn new(config: &MailerConfig) -> Result<Self, AppError> {
        if config.host.trim().is_empty() {
            return Err(AppError::Config("MAILER_HOST must not be empty".into()));
        }
        // Plain SMTP, as spoken by local relays and mail catchers.
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .timeout(Some(config.timeout));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, mail: OutgoingMail) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(mail.from)
            .to(mail.to)
            .subject(mail.subject)
            .header(ContentType::TEXT_HTML)
            .body(mail.html_body)
            .map_err(|err| NotifyError::Transport(format!("failed to build message: {err}")))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;
        debug!(template = mail.template, code = %response.code(), "smtp accepted message");
        Ok(())
    }
}
