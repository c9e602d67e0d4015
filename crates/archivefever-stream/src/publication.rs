//! Publication channel: finished works go out by email to the publication's
//! post-by-email address.

use archivefever_core::CrystallizedWork;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("publication channel not configured")]
    NotConfigured,

    #[error("could not build message: {0}")]
    Build(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl From<PublishError> for archivefever_core::Error {
    fn from(e: PublishError) -> Self {
        archivefever_core::Error::Publication(e.to_string())
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, subject: &str, body: &str) -> Result<(), PublishError>;
}

/// Subject and body of the email that publishes a work.
pub fn publication_email(work: &CrystallizedWork) -> (String, String) {
    let subject = format!("PUBLISH: {}", work.title);
    let body = format!(
        "Subject: {}\n\n{}\n\n---\nGenerated from the live consciousness stream of an AI philosopher.\nOriginal thought: {}",
        work.title,
        work.content,
        work.timestamp.to_rfc3339()
    );
    (subject, body)
}

/// SMTP publisher with app-password login.
pub struct EmailPublisher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    to: String,
}

impl EmailPublisher {
    pub fn new(host: &str, port: u16, user: &str, password: &str, to: &str) -> Result<Self, PublishError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| PublishError::Transport(e.to_string()))?
            .port(port)
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .build();
        Ok(Self {
            transport,
            from: user.to_string(),
            to: to.to_string(),
        })
    }
}

#[async_trait]
impl Publisher for EmailPublisher {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, subject: &str, body: &str) -> Result<(), PublishError> {
        let message = Message::builder()
            .from(self.from.parse().map_err(|e| PublishError::Build(format!("from: {}", e)))?)
            .to(self.to.parse().map_err(|e| PublishError::Build(format!("to: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| PublishError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        info!("Sent {:?} to {}", subject, self.to);
        Ok(())
    }
}

/// Stand-in when email credentials are missing; every send is skipped.
pub struct DisabledPublisher;

#[async_trait]
impl Publisher for DisabledPublisher {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn send(&self, _subject: &str, _body: &str) -> Result<(), PublishError> {
        Err(PublishError::NotConfigured)
    }
}
