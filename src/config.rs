//! Configuration loading and management
//!
//! All settings come from the environment. Only the Telegram bot token is
//! required; everything else has a default or degrades to "unavailable".

use std::path::PathBuf;
use std::time::Duration;

/// Error raised when required configuration is missing or malformed.
///
/// Fatal: raised before any loop starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot API token (required)
    pub telegram_token: String,

    /// Single allow-listed Telegram sender id; `None` means open
    pub allowed_chat_id: Option<String>,

    /// Gemini API key for online mode; `None` leaves the provider degraded
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,

    /// Ollama endpoint for offline mode
    pub ollama_base_url: String,
    pub ollama_model: String,

    /// Pre-issued Gmail bearer token; `None` means email is unauthenticated
    pub gmail_access_token: Option<String>,

    /// whisper.cpp CLI binary and model
    pub whisper_executable: PathBuf,
    pub whisper_model: PathBuf,
    pub whisper_threads: usize,
    pub whisper_timeout: Duration,

    /// Key names forming the activation chord, e.g. ["ctrl", "alt", "a"]
    pub chord: Vec<String>,

    /// Roots searched by the file index
    pub search_paths: Vec<PathBuf>,
    pub max_file_results: usize,
    pub max_email_results: usize,

    /// Seconds of audio recorded per hotkey activation
    pub capture_secs: u64,

    /// Mode the daemon starts in ("online"/"offline")
    pub default_mode: String,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let telegram_token =
            env_var("TELEGRAM_TOKEN").ok_or(ConfigError::MissingVar("TELEGRAM_TOKEN"))?;

        let whisper_timeout = match env_var("WHISPER_TIMEOUT") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|_| ConfigError::InvalidVar {
                    var: "WHISPER_TIMEOUT",
                    value: raw.clone(),
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(180),
        };

        let capture_secs = match env_var("ASSISTANT_CAPTURE_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::InvalidVar {
                var: "ASSISTANT_CAPTURE_SECS",
                value: raw.clone(),
            })?,
            None => 10,
        };

        let chord = env_var("ASSISTANT_CHORD")
            .map(|raw| {
                raw.split(',')
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|keys| !keys.is_empty())
            .unwrap_or_else(|| vec!["ctrl".into(), "alt".into(), "a".into()]);

        let search_paths = env_var("ASSISTANT_SEARCH_PATHS")
            .map(|raw| raw.split(':').map(PathBuf::from).collect::<Vec<_>>())
            .unwrap_or_else(default_search_paths);

        Ok(Self {
            telegram_token,
            allowed_chat_id: env_var("TELEGRAM_CHAT_ID"),
            gemini_api_key: env_var("GEMINI_API_KEY"),
            gemini_model: env_var("GEMINI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            ollama_base_url: env_var("OLLAMA_BASE_URL")
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            ollama_model: env_var("OLLAMA_MODEL").unwrap_or_else(|| "mistral:7b".to_string()),
            gmail_access_token: env_var("GMAIL_ACCESS_TOKEN"),
            whisper_executable: env_var("WHISPER_EXECUTABLE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./whisper.cpp/build/bin/whisper-cli")),
            whisper_model: env_var("WHISPER_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("models/ggml-large-v3-turbo-q5_0.bin")),
            whisper_threads: env_var("WHISPER_THREADS")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(4),
            whisper_timeout,
            chord,
            search_paths,
            max_file_results: 10,
            max_email_results: 5,
            capture_secs,
            default_mode: env_var("ASSISTANT_MODE").unwrap_or_else(|| "online".to_string()),
        })
    }
}

/// Read an environment variable, treating empty values as unset.
fn env_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn default_search_paths() -> Vec<PathBuf> {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    [
        "Documents",
        "Downloads",
        "Desktop",
        "Pictures",
        "Music",
        "Videos",
    ]
    .iter()
    .map(|dir| PathBuf::from(&home).join(dir))
    .collect()
}
