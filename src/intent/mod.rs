//! Intent classification for utterances
//!
//! An ordered keyword-cascade rule table, first match wins. The order is a
//! binding contract: file search before email, email before system commands,
//! chat as the exhaustive default. Classification is deterministic, total,
//! and never fails.

use regex::Regex;

use crate::state::Mode;

/// Clarification replies produced when a category keyword matched but a
/// required argument could not be extracted.
pub const CLARIFY_FILE_QUERY: &str =
    "Please specify what you want to search for. For example: 'search for documents'";
pub const CLARIFY_EMAIL_QUERY: &str = "Please specify what to search for in emails.";
pub const EMAIL_USAGE: &str =
    "Email commands: 'check emails', 'search email [query]', 'send email'";

/// Email sub-command resolved by fixed keyword checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailKind {
    /// Show recent inbox messages
    Check,
    /// Search messages for a query
    Search { query: String },
    /// Compose and send (reported as not yet available from free text)
    Send,
    /// Email keyword matched but no recognized sub-command
    Unspecified,
}

/// The classified action derived from one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    FileSearch { query: String },
    EmailQuery { kind: EmailKind },
    /// `target: None` reports the current mode instead of switching
    ModeSwitch { target: Option<Mode> },
    StatusRequest,
    HelpRequest,
    /// Category matched, argument missing: resolves to a fixed reply and
    /// no collaborator is invoked
    Clarify { reply: &'static str },
    /// Exhaustive default: forwarded verbatim to the model
    Chat { text: String },
}

/// Ordered rule table mapping normalized utterance text to an [`Intent`].
pub struct IntentRouter {
    /// File-query extraction alternatives, most specific first
    file_patterns: Vec<Regex>,
    email_search: Regex,
}

impl IntentRouter {
    pub fn new() -> Self {
        // "find all (.+)" must precede "find (.+)" so "find all pdf files"
        // captures "pdf files" rather than "all pdf files".
        let file_patterns = [
            r"search for (.+)",
            r"look for (.+)",
            r"find all (.+)",
            r"find (.+)",
            r"search (.+)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect();

        Self {
            file_patterns,
            email_search: Regex::new(r"search email (.+)").expect("static pattern"),
        }
    }

    /// Classify utterance text. Matching is case-insensitive; the original
    /// text is preserved only for the chat fallback.
    pub fn classify(&self, text: &str) -> Intent {
        let lower = text.to_lowercase();

        if contains_any(&lower, &["search", "find", "look for"]) {
            return self.classify_file_search(&lower);
        }

        if contains_any(&lower, &["email", "mail", "gmail"]) {
            return self.classify_email(&lower);
        }

        if contains_any(&lower, &["mode", "status", "help"]) {
            return Self::classify_system(&lower);
        }

        Intent::Chat {
            text: text.to_string(),
        }
    }

    fn classify_file_search(&self, lower: &str) -> Intent {
        for pattern in &self.file_patterns {
            if let Some(caps) = pattern.captures(lower) {
                let query = caps[1].trim().to_string();
                if !query.is_empty() {
                    return Intent::FileSearch { query };
                }
            }
        }
        Intent::Clarify {
            reply: CLARIFY_FILE_QUERY,
        }
    }

    fn classify_email(&self, lower: &str) -> Intent {
        if contains_any(
            lower,
            &["check email", "read email", "show email", "check mail"],
        ) {
            return Intent::EmailQuery {
                kind: EmailKind::Check,
            };
        }

        if lower.contains("search email") {
            return match self.email_search.captures(lower) {
                Some(caps) => Intent::EmailQuery {
                    kind: EmailKind::Search {
                        query: caps[1].trim().to_string(),
                    },
                },
                None => Intent::Clarify {
                    reply: CLARIFY_EMAIL_QUERY,
                },
            };
        }

        if lower.contains("send email") || lower.contains("compose email") {
            return Intent::EmailQuery {
                kind: EmailKind::Send,
            };
        }

        Intent::EmailQuery {
            kind: EmailKind::Unspecified,
        }
    }

    fn classify_system(lower: &str) -> Intent {
        if lower.contains("status") {
            return Intent::StatusRequest;
        }

        if lower.contains("mode") {
            let target = if lower.contains("online") {
                Some(Mode::Online)
            } else if lower.contains("offline") {
                Some(Mode::Offline)
            } else {
                None
            };
            return Intent::ModeSwitch { target };
        }

        Intent::HelpRequest
    }
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}
