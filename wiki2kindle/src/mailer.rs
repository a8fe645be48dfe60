use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, info};

use crate::article::Document;
use crate::config::Config;
use crate::error::SendError;

pub const EPUB_CONTENT_TYPE: &str = "application/epub+zip";

/// Mails documents to the configured Kindle address over SMTP.
///
/// Each [`send`](SmtpMailer::send) opens its own STARTTLS session and
/// makes exactly one delivery attempt.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    config: Config,
}

impl SmtpMailer {
    pub fn new(config: Config) -> Self {
        SmtpMailer { config }
    }

    pub fn send(&self, document: &Document) -> Result<(), SendError> {
        let message = build_message(&self.config, document)?;

        let transport = SmtpTransport::starttls_relay(&self.config.smtp_host)
            .map_err(SendError::Connection)?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.smtp_user.clone(),
                self.config.smtp_password.clone(),
            ))
            .build();

        debug!(
            host = %self.config.smtp_host,
            port = self.config.smtp_port,
            "opening SMTP session"
        );
        let response = transport.send(&message).map_err(classify)?;

        info!(
            to = %self.config.kindle_email,
            filename = %document.filename,
            code = %response.code(),
            "document sent"
        );
        Ok(())
    }
}

/// Assemble the message: a short text part plus the document attachment.
pub fn build_message(config: &Config, document: &Document) -> Result<Message, SendError> {
    let content_type =
        ContentType::parse(EPUB_CONTENT_TYPE).map_err(|e| SendError::Message(e.to_string()))?;

    let body = format!(
        "\"{}\" from Wikipedia, sent by wiki2kindle.\n",
        document.title
    );

    let message = Message::builder()
        .from(Mailbox::new(None, config.sender.clone()))
        .to(Mailbox::new(None, config.kindle_email.clone()))
        .subject(format!("Convert: {}", document.title))
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(body))
                .singlepart(
                    Attachment::new(document.filename.clone())
                        .body(document.content.clone(), content_type),
                ),
        )?;

    Ok(message)
}

/// Sort an SMTP failure into auth, rejection or connection trouble.
fn classify(err: lettre::transport::smtp::Error) -> SendError {
    let code = err.status().map(|code| code.to_string());
    if is_auth_failure(code.as_deref(), err.is_client(), &err.to_string()) {
        SendError::Auth(err)
    } else if code.is_some() {
        SendError::Rejected(err)
    } else {
        SendError::Connection(err)
    }
}

/// 530 auth required, 534 mechanism too weak, 535 bad credentials.
/// Without a reply code, only client-side errors raised while
/// negotiating a login count, e.g. no common mechanism.
fn is_auth_failure(code: Option<&str>, client_error: bool, message: &str) -> bool {
    match code {
        Some(code) => matches!(code, "530" | "534" | "535"),
        None if client_error => {
            let message = message.to_lowercase();
            ["authentication", "challenge", "credentials"]
                .iter()
                .any(|word| message.contains(word))
        }
        None => false,
    }
}
