//! Telegram bot API client
//!
//! Thin typed wrapper over the HTTP methods the frontend uses: getUpdates
//! long polling, sendMessage, sendChatAction, and voice-file download.

use std::io::Write;
use std::time::Duration;

use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::debug;

const TELEGRAM_BASE_URL: &str = "https://api.telegram.org";

/// Errors from the chat transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telegram API error: {0}")]
    Api(String),

    #[error("could not store voice file: {0}")]
    Io(#[from] std::io::Error),
}

/// One long-poll update.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: ChatRef,
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice: Option<Voice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRef {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Voice {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    file_path: Option<String>,
}

/// Standard Telegram response envelope.
#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiReply<T> {
    fn into_result(self) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TransportError::Api(
                self.description
                    .unwrap_or_else(|| "unspecified API failure".to_string()),
            )),
        }
    }
}

/// HTTP client bound to one bot token.
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, TELEGRAM_BASE_URL.to_string())
    }

    /// Point the client at a different endpoint (tests).
    pub fn with_base_url(token: String, base_url: String) -> Self {
        // The request timeout must outlast the long-poll window.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .expect("client construction only configures a timeout");

        Self {
            client,
            base_url,
            token,
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Long-poll for new updates starting at `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        let reply: ApiReply<Vec<Update>> = self
            .client
            .post(self.url("getUpdates"))
            .json(&serde_json::json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }))
            .send()
            .await?
            .json()
            .await?;
        reply.into_result()
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        let reply: ApiReply<serde_json::Value> = self
            .client
            .post(self.url("sendMessage"))
            .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await?
            .json()
            .await?;
        reply.into_result().map(|_| ())
    }

    /// Typing indicator while a reply is being produced.
    pub async fn send_typing(&self, chat_id: i64) -> Result<(), TransportError> {
        let reply: ApiReply<serde_json::Value> = self
            .client
            .post(self.url("sendChatAction"))
            .json(&serde_json::json!({ "chat_id": chat_id, "action": "typing" }))
            .send()
            .await?
            .json()
            .await?;
        reply.into_result().map(|_| ())
    }

    /// Download a voice note into a scoped temp file (removed on drop).
    pub async fn download_voice(&self, file_id: &str) -> Result<NamedTempFile, TransportError> {
        let file: FileRef = self
            .client
            .post(self.url("getFile"))
            .json(&serde_json::json!({ "file_id": file_id }))
            .send()
            .await?
            .json::<ApiReply<FileRef>>()
            .await?
            .into_result()?;

        let path = file
            .file_path
            .ok_or_else(|| TransportError::Api("file has no download path".to_string()))?;

        let bytes = self
            .client
            .get(format!("{}/file/bot{}/{}", self.base_url, self.token, path))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        debug!(file_id, size = bytes.len(), "voice file downloaded");

        let mut temp = tempfile::Builder::new().suffix(".oga").tempfile()?;
        temp.write_all(&bytes)?;
        Ok(temp)
    }
}
