//! Intent resolution against the capability collaborators

use std::sync::Arc;

use tracing::{info, warn};

use crate::collab::email::format_emails_summary;
use crate::collab::files::format_search_results;
use crate::collab::model::fallback_reply;
use crate::collab::Collaborators;
use crate::intent::{EmailKind, Intent, IntentRouter};
use crate::state::{Mode, ModeState};
use crate::status::StatusAggregator;

use super::{Utterance, HELP_MESSAGE, SYSTEM_PREAMBLE};

/// Reply for the email-compose intent; free-text composition is not wired.
const EMAIL_SEND_UNAVAILABLE: &str =
    "Email composition from chat text isn't available yet. Use /send <address> <subject> | <body>.";

/// Shared dispatch path: classify one utterance and execute the intent.
///
/// Never returns an error; any collaborator failure becomes a reply string.
pub struct Dispatcher {
    router: IntentRouter,
    collab: Collaborators,
    mode: ModeState,
    status: Arc<StatusAggregator>,
    max_email_results: usize,
}

impl Dispatcher {
    pub fn new(
        collab: Collaborators,
        mode: ModeState,
        status: Arc<StatusAggregator>,
        max_email_results: usize,
    ) -> Self {
        Self {
            router: IntentRouter::new(),
            collab,
            mode,
            status,
            max_email_results,
        }
    }

    pub(crate) fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    pub async fn dispatch(&self, utterance: &Utterance) -> String {
        let intent = self.router.classify(&utterance.text);
        info!(
            ?intent,
            source = ?utterance.source,
            sender = %utterance.sender_id,
            received_at = %utterance.received_at,
            "dispatching utterance"
        );

        match intent {
            Intent::FileSearch { query } => self.file_search(&query).await,
            Intent::EmailQuery { kind } => self.email_query(kind).await,
            Intent::ModeSwitch { target } => self.mode_switch(target),
            Intent::StatusRequest => self.status.report(),
            Intent::HelpRequest => HELP_MESSAGE.to_string(),
            Intent::Clarify { reply } => reply.to_string(),
            Intent::Chat { text } => self.chat(&text).await,
        }
    }

    async fn file_search(&self, query: &str) -> String {
        let results = self.collab.files.search(query).await;
        if results.is_empty() {
            format!("No files found matching '{query}'")
        } else {
            format!(
                "Found {} files:\n\n{}",
                results.len(),
                format_search_results(&results)
            )
        }
    }

    async fn email_query(&self, kind: EmailKind) -> String {
        match kind {
            EmailKind::Check => {
                let emails = self.collab.email.recent(self.max_email_results).await;
                if emails.is_empty() {
                    "No recent emails found.".to_string()
                } else {
                    format!("Recent emails:\n\n{}", format_emails_summary(&emails))
                }
            }
            EmailKind::Search { query } => {
                let emails = self
                    .collab
                    .email
                    .search(&query, self.max_email_results)
                    .await;
                if emails.is_empty() {
                    format!("No emails found matching '{query}'")
                } else {
                    format!(
                        "Email search results for '{query}':\n\n{}",
                        format_emails_summary(&emails)
                    )
                }
            }
            EmailKind::Send => EMAIL_SEND_UNAVAILABLE.to_string(),
            EmailKind::Unspecified => crate::intent::EMAIL_USAGE.to_string(),
        }
    }

    fn mode_switch(&self, target: Option<Mode>) -> String {
        match target {
            Some(mode) => {
                self.mode.replace(mode);
                format!("Switched to {mode} mode ({})", mode.provider_name())
            }
            None => {
                let current = self.mode.get();
                format!("Current mode: {current}. Use 'switch to online/offline mode'")
            }
        }
    }

    async fn chat(&self, text: &str) -> String {
        match self.collab.model.complete(text, Some(SYSTEM_PREAMBLE)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(?e, "model completion failed, using canned reply");
                fallback_reply(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::testing::{stub_collaborators, Probes, StubConfig};
    use crate::collab::{EmailSummary, FileHit};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn dispatcher(config: StubConfig) -> (Dispatcher, Probes, ModeState) {
        let (collab, probes) = stub_collaborators(config);
        let mode = ModeState::default();
        let status = Arc::new(StatusAggregator::new(
            mode.clone(),
            collab.model.clone(),
            collab.transcriber.clone(),
            collab.email.clone(),
            Arc::new(AtomicBool::new(true)),
            Arc::new(AtomicBool::new(true)),
            "ctrl+alt+a".to_string(),
        ));
        (
            Dispatcher::new(collab, mode.clone(), status, 5),
            probes,
            mode,
        )
    }

    async fn reply_for(dispatcher: &Dispatcher, text: &str) -> String {
        dispatcher
            .dispatch(&Utterance::text(text.to_string(), "tester"))
            .await
    }

    #[tokio::test]
    async fn test_zero_file_results_reply_is_exact() {
        let (dispatcher, probes, _) = dispatcher(StubConfig::default());
        let reply = reply_for(&dispatcher, "find all pdf files").await;
        assert_eq!(reply, "No files found matching 'pdf files'");
        assert_eq!(probes.file_searches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_file_results_are_listed() {
        let (dispatcher, _, _) = dispatcher(StubConfig {
            file_hits: vec![FileHit {
                name: "notes.txt".into(),
                path: PathBuf::from("/home/u/notes.txt"),
                size: 10,
                modified: None,
                kind: "text",
            }],
            ..StubConfig::default()
        });
        let reply = reply_for(&dispatcher, "search for notes").await;
        assert!(reply.starts_with("Found 1 files:"));
        assert!(reply.contains("notes.txt"));
    }

    #[tokio::test]
    async fn test_email_check_formats_summaries() {
        let (dispatcher, _, _) = dispatcher(StubConfig {
            emails: vec![EmailSummary {
                sender: "alice@example.com".into(),
                subject: "Hi".into(),
                date: "Mon".into(),
                snippet: "hello".into(),
            }],
            ..StubConfig::default()
        });
        let reply = reply_for(&dispatcher, "check emails").await;
        assert!(reply.starts_with("Recent emails:"));
        assert!(reply.contains("alice@example.com"));
    }

    #[tokio::test]
    async fn test_empty_inbox_reply() {
        let (dispatcher, _, _) = dispatcher(StubConfig::default());
        assert_eq!(
            reply_for(&dispatcher, "check emails").await,
            "No recent emails found."
        );
    }

    #[tokio::test]
    async fn test_clarification_touches_no_collaborator() {
        let (dispatcher, probes, _) = dispatcher(StubConfig::default());
        let reply = reply_for(&dispatcher, "search").await;
        assert!(reply.starts_with("Please specify"));
        assert_eq!(probes.file_searches.load(Ordering::SeqCst), 0);
        assert_eq!(probes.email_calls.load(Ordering::SeqCst), 0);
        assert_eq!(probes.model_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mode_switch_updates_shared_state() {
        let (dispatcher, _, mode) = dispatcher(StubConfig::default());
        let reply = reply_for(&dispatcher, "switch to offline mode").await;
        assert_eq!(reply, "Switched to offline mode (Ollama)");
        assert_eq!(mode.get(), Mode::Offline);
    }

    #[tokio::test]
    async fn test_mode_report_without_target() {
        let (dispatcher, _, _) = dispatcher(StubConfig::default());
        let reply = reply_for(&dispatcher, "which mode").await;
        assert_eq!(
            reply,
            "Current mode: online. Use 'switch to online/offline mode'"
        );
    }

    #[tokio::test]
    async fn test_chat_goes_to_model() {
        let (dispatcher, probes, _) = dispatcher(StubConfig {
            model_reply: Some("It is sunny.".into()),
            ..StubConfig::default()
        });
        let reply = reply_for(&dispatcher, "what's the weather like?").await;
        assert_eq!(reply, "It is sunny.");
        assert_eq!(probes.model_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chat_falls_back_when_model_unreachable() {
        let (dispatcher, _, _) = dispatcher(StubConfig::default());
        let reply = reply_for(&dispatcher, "tell me a story").await;
        assert!(reply.starts_with("Temporarily unable"));
    }

    #[tokio::test]
    async fn test_status_request_reports_all_collaborators() {
        let (dispatcher, _, _) = dispatcher(StubConfig::default());
        let reply = reply_for(&dispatcher, "status").await;
        assert_eq!(reply.lines().count(), 6);
        assert!(reply.contains("Telegram"));
    }

    #[tokio::test]
    async fn test_help_request() {
        let (dispatcher, _, _) = dispatcher(StubConfig::default());
        assert_eq!(reply_for(&dispatcher, "help").await, HELP_MESSAGE);
    }

    #[tokio::test]
    async fn test_email_send_intent_is_not_attempted() {
        let (dispatcher, probes, _) = dispatcher(StubConfig::default());
        let reply = reply_for(&dispatcher, "send email to bob").await;
        assert_eq!(reply, EMAIL_SEND_UNAVAILABLE);
        assert_eq!(probes.email_calls.load(Ordering::SeqCst), 0);
    }
}
