//! Gmail REST client
//!
//! Uses a pre-issued bearer token; the interactive OAuth consent flow is
//! outside this boundary. Every failure degrades to an empty list or `false`
//! and is logged, never raised past the trait.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::warn;

use super::EmailService;

const GMAIL_BASE_URL: &str = "https://gmail.googleapis.com";

/// Header summary of one inbox message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSummary {
    pub sender: String,
    pub subject: String,
    pub date: String,
    pub snippet: String,
}

/// [`EmailService`] over the Gmail v1 REST API.
pub struct GmailClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
struct MessageMeta {
    #[serde(default)]
    snippet: String,
    payload: Option<MessagePayload>,
}

#[derive(Deserialize)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Deserialize)]
struct Header {
    name: String,
    value: String,
}

impl GmailClient {
    pub fn new(access_token: Option<String>) -> Self {
        Self::with_base_url(access_token, GMAIL_BASE_URL.to_string())
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(access_token: Option<String>, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            access_token,
        }
    }

    fn token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// List message ids for a query, then fetch header metadata for each.
    async fn query(&self, query: &str, n: usize) -> anyhow::Result<Vec<EmailSummary>> {
        let token = self
            .token()
            .ok_or_else(|| anyhow::anyhow!("gmail not authenticated"))?;

        let max_results = n.to_string();
        let list: MessageList = self
            .client
            .get(format!("{}/gmail/v1/users/me/messages", self.base_url))
            .bearer_auth(token)
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut summaries = Vec::new();
        for msg in list.messages.iter().take(n) {
            let meta: MessageMeta = self
                .client
                .get(format!(
                    "{}/gmail/v1/users/me/messages/{}",
                    self.base_url, msg.id
                ))
                .bearer_auth(token)
                .query(&[
                    ("format", "metadata"),
                    ("metadataHeaders", "Subject"),
                    ("metadataHeaders", "From"),
                    ("metadataHeaders", "Date"),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let header = |name: &str| {
                meta.payload
                    .as_ref()
                    .and_then(|p| p.headers.iter().find(|h| h.name.eq_ignore_ascii_case(name)))
                    .map(|h| h.value.clone())
            };

            summaries.push(EmailSummary {
                sender: header("From").unwrap_or_else(|| "Unknown".to_string()),
                subject: header("Subject").unwrap_or_else(|| "No Subject".to_string()),
                date: header("Date").unwrap_or_default(),
                snippet: meta.snippet,
            });
        }

        Ok(summaries)
    }
}

#[async_trait]
impl EmailService for GmailClient {
    async fn recent(&self, n: usize) -> Vec<EmailSummary> {
        match self.query("in:inbox", n).await {
            Ok(summaries) => summaries,
            Err(e) => {
                warn!(?e, "failed to fetch recent emails");
                Vec::new()
            }
        }
    }

    async fn search(&self, query: &str, n: usize) -> Vec<EmailSummary> {
        match self.query(query, n).await {
            Ok(summaries) => summaries,
            Err(e) => {
                warn!(?e, query, "email search failed");
                Vec::new()
            }
        }
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> bool {
        let Some(token) = self.token() else {
            warn!("email send requested without authentication");
            return false;
        };

        let rfc822 = format!("To: {to}\r\nSubject: {subject}\r\n\r\n{body}");
        let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(rfc822);

        let result = self
            .client
            .post(format!("{}/gmail/v1/users/me/messages/send", self.base_url))
            .bearer_auth(token)
            .json(&serde_json::json!({ "raw": raw }))
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(_) => true,
            Err(e) => {
                warn!(?e, to, "failed to send email");
                false
            }
        }
    }

    fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Numbered summary list for replies.
pub fn format_emails_summary(emails: &[EmailSummary]) -> String {
    emails
        .iter()
        .enumerate()
        .map(|(i, email)| {
            let snippet: String = email.snippet.chars().take(100).collect();
            format!(
                "{}. From: {}\n   Subject: {}\n   Date: {}\n   Snippet: {}...\n",
                i + 1,
                email.sender,
                email.subject,
                email.date,
                snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
