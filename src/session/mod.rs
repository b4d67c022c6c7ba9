//! Per-utterance session processing
//!
//! One session covers a single utterance from capture/receipt through reply.
//! The dispatcher is the shared intent-resolution path; the executor adds the
//! voice-capture serialization on top of it. Every collaborator failure is
//! converted to a user-facing string here; errors never escape a session.

mod dispatch;
mod executor;

pub use dispatch::Dispatcher;
pub use executor::{Busy, SessionExecutor, BUSY_REPLY};

use chrono::{DateTime, Utc};

/// Where an utterance came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceSource {
    Voice,
    Text,
}

/// One normalized input, immutable once constructed.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    pub source: UtteranceSource,
    pub sender_id: String,
    pub received_at: DateTime<Utc>,
}

impl Utterance {
    pub fn voice(text: String, sender_id: &str) -> Self {
        Self {
            text,
            source: UtteranceSource::Voice,
            sender_id: sender_id.to_string(),
            received_at: Utc::now(),
        }
    }

    pub fn text(text: String, sender_id: &str) -> Self {
        Self {
            text,
            source: UtteranceSource::Text,
            sender_id: sender_id.to_string(),
            received_at: Utc::now(),
        }
    }
}

/// Fixed system preamble sent with every chat completion.
pub const SYSTEM_PREAMBLE: &str =
    "You are a helpful AI assistant. Provide concise and helpful responses.";

/// Help text shared by the help intent and the /help command.
pub const HELP_MESSAGE: &str = "\
🤖 **AI Assistant Help**

**File Operations:**
• 'Search for [filename]' - Find files
• 'Find all PDF files' - Search by type
• 'Look for documents' - General search

**Email Operations:**
• 'Check emails' - Read recent emails
• 'Search email [query]' - Search emails
• /send <address> <subject> | <body> - Send an email

**System Commands:**
• 'Switch to online mode' - Use Gemini
• 'Switch to offline mode' - Use Ollama
• 'System status' - Check status
• 'Help' - Show this help

**Voice:**
• Press the hotkey chord to speak
• Send voice messages via Telegram";
