use askama::Template;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{digest_subject, NotificationSink};
use crate::config::SmtpConfig;
use crate::models::{PersistedRecord, SearchPage};
use crate::utils::error::{AppError, Result};

/// Sends one digest email per run with new results.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let to_address = config
            .to_address
            .as_deref()
            .ok_or_else(|| AppError::Notification("SMTP to_address is not configured".to_string()))?;
        let from_address = config.from_address.as_deref().unwrap_or(to_address);

        let to = Mailbox::new(None, parse_address(to_address)?);
        let from = Mailbox::new(Some(config.from_name.clone()), parse_address(from_address)?);

        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| AppError::Notification(format!("SMTP relay {}: {}", config.host, e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    pub fn build_message(&self, page: &SearchPage, records: &[PersistedRecord]) -> Result<Message> {
        let sent_at = Utc::now();
        let html = format_html_body(page, records, sent_at)?;

        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(digest_subject(page, records))
            .multipart(MultiPart::alternative_plain_html(
                format_text_body(page, records, sent_at),
                html,
            ))
            .map_err(|e| AppError::Notification(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl NotificationSink for EmailNotifier {
    async fn notify(&self, page: &SearchPage, records: &[PersistedRecord]) -> Result<()> {
        tracing::info!(page = %page.name, count = records.len(), "Trying to send mail with new search results");

        let message = self.build_message(page, records)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Notification(format!("Failed to send email: {}", e)))?;

        tracing::info!(page = %page.name, "Email successfully sent");
        Ok(())
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.parse::<Address>()
        .map_err(|e| AppError::Notification(format!("Invalid email address '{}': {}", raw, e)))
}

fn format_text_body(page: &SearchPage, records: &[PersistedRecord], sent_at: DateTime<Utc>) -> String {
    let mut text = String::new();

    text.push_str(&format!("New results on {}\n", page.name));
    text.push_str(&format!("Search: {}\n\n", page.url));

    for record in records {
        text.push_str(&format!("{}\n", record.title.as_deref().unwrap_or("(untitled)")));
        if let Some(price) = &record.price {
            text.push_str(&format!("Price: {}\n", price));
        }
        if let Some(description) = &record.description {
            text.push_str(&format!("{}\n", description));
        }
        text.push_str(&format!("{}\n\n", record.url));
    }

    text.push_str(&format!("Sent {}\n", sent_at.format("%Y-%m-%d %H:%M UTC")));
    text
}

/// HTML digest, rendered from `templates/digest.html`. Values are escaped by the template.
#[derive(Template)]
#[template(path = "digest.html")]
struct DigestTemplate<'a> {
    page_name: &'a str,
    page_url: &'a str,
    entries: Vec<DigestEntry<'a>>,
    sent_at: String,
}

struct DigestEntry<'a> {
    title: &'a str,
    url: &'a str,
    price: Option<&'a str>,
    description: Option<&'a str>,
    image_url: Option<&'a str>,
}

impl<'a> From<&'a PersistedRecord> for DigestEntry<'a> {
    fn from(record: &'a PersistedRecord) -> Self {
        Self {
            title: record.title.as_deref().unwrap_or(&record.url),
            url: &record.url,
            price: record.price.as_deref(),
            description: record.description.as_deref(),
            image_url: record.image_url.as_deref(),
        }
    }
}

fn format_html_body(page: &SearchPage, records: &[PersistedRecord], sent_at: DateTime<Utc>) -> Result<String> {
    DigestTemplate {
        page_name: &page.name,
        page_url: &page.url,
        entries: records.iter().map(DigestEntry::from).collect(),
        sent_at: sent_at.format("%Y-%m-%d %H:%M UTC").to_string(),
    }
    .render()
    .map_err(|e| AppError::Notification(format!("Failed to render digest: {}", e)))
}
