//! Conversational model completion over HTTP
//!
//! The provider follows the shared mode state at call time: online requests
//! go to the Gemini API, offline requests to a local Ollama instance.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::ModelProvider;
use crate::state::{Mode, ModeState};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Errors from the completion backends
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("provider response had no completion text")]
    MalformedResponse,

    #[error("online mode requires GEMINI_API_KEY")]
    Unconfigured,
}

/// [`ModelProvider`] dispatching on the current [`Mode`].
pub struct HttpModelProvider {
    client: reqwest::Client,
    mode: ModeState,
    gemini_base_url: String,
    gemini_api_key: Option<String>,
    gemini_model: String,
    ollama_base_url: String,
    ollama_model: String,
}

impl HttpModelProvider {
    pub fn new(
        mode: ModeState,
        gemini_api_key: Option<String>,
        gemini_model: String,
        ollama_base_url: String,
        ollama_model: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            mode,
            gemini_base_url: GEMINI_BASE_URL.to_string(),
            gemini_api_key,
            gemini_model,
            ollama_base_url,
            ollama_model,
        }
    }

    /// Override the Gemini endpoint (tests).
    #[cfg(test)]
    fn with_gemini_base_url(mut self, base_url: String) -> Self {
        self.gemini_base_url = base_url;
        self
    }

    async fn complete_gemini(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, ProviderError> {
        let key = self
            .gemini_api_key
            .as_deref()
            .ok_or(ProviderError::Unconfigured)?;

        let mut body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        if let Some(system) = system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.gemini_base_url, self.gemini_model
            ))
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let payload: serde_json::Value = response.json().await?;
        let text = payload["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.is_empty())
            .ok_or(ProviderError::MalformedResponse)?;

        Ok(text)
    }

    async fn complete_ollama(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, ProviderError> {
        let mut body = json!({
            "model": self.ollama_model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }

        let response = self
            .client
            .post(format!("{}/api/generate", self.ollama_base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let payload: serde_json::Value = response.json().await?;
        payload["response"]
            .as_str()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(ProviderError::MalformedResponse)
    }
}

#[async_trait]
impl ModelProvider for HttpModelProvider {
    async fn complete(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, ProviderError> {
        let mode = self.mode.get();
        debug!(%mode, "requesting completion");
        match mode {
            Mode::Online => self.complete_gemini(prompt, system).await,
            Mode::Offline => self.complete_ollama(prompt, system).await,
        }
    }

    fn is_available(&self) -> bool {
        match self.mode.get() {
            Mode::Online => self.gemini_api_key.is_some(),
            // Reachability of a local Ollama cannot be probed without I/O.
            Mode::Offline => true,
        }
    }
}

/// Canned reply used when the provider fails; the raw error never reaches
/// the user.
pub fn fallback_reply(prompt: &str) -> String {
    let p = prompt.trim().to_lowercase();
    if ["hello", "hi", "hey"].iter().any(|g| p.contains(g)) {
        "Hello! I'm here, but my language model is unreachable right now.".to_string()
    } else {
        "Temporarily unable to reach the language model. Please check the provider \
         configuration and try again."
            .to_string()
    }
}
