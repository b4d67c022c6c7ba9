//! System status report
//!
//! Synchronous, side-effect-free poll of each collaborator's liveness flag
//! into a fixed-order multi-line report. A missing or unconfigured
//! collaborator is reported as unavailable, never omitted, and the report
//! itself never fails.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::collab::{EmailService, ModelProvider, Transcriber};
use crate::state::ModeState;

/// Fixed-order liveness report over the daemon's collaborators.
pub struct StatusAggregator {
    mode: ModeState,
    model: Arc<dyn ModelProvider>,
    transcriber: Arc<dyn Transcriber>,
    email: Arc<dyn EmailService>,
    listener_active: Arc<AtomicBool>,
    chat_active: Arc<AtomicBool>,
    chord_label: String,
}

impl StatusAggregator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mode: ModeState,
        model: Arc<dyn ModelProvider>,
        transcriber: Arc<dyn Transcriber>,
        email: Arc<dyn EmailService>,
        listener_active: Arc<AtomicBool>,
        chat_active: Arc<AtomicBool>,
        chord_label: String,
    ) -> Self {
        Self {
            mode,
            model,
            transcriber,
            email,
            listener_active,
            chat_active,
            chord_label,
        }
    }

    /// Compose the report. Order is fixed: model, transcription, email,
    /// key listener, chat frontend, chord.
    pub fn report(&self) -> String {
        let mode = self.mode.get();
        let lines = [
            if self.model.is_available() {
                format!("🤖 LLM: {} ({})", mode.to_string().to_uppercase(), mode.provider_name())
            } else {
                format!(
                    "🤖 LLM: {} ({}) ❌ Unavailable",
                    mode.to_string().to_uppercase(),
                    mode.provider_name()
                )
            },
            if self.transcriber.is_available() {
                "🎤 Whisper: ✅ Available".to_string()
            } else {
                "🎤 Whisper: ❌ Not available".to_string()
            },
            if self.email.is_authenticated() {
                "📧 Email: ✅ Connected".to_string()
            } else {
                "📧 Email: ❌ Not connected".to_string()
            },
            if self.listener_active.load(Ordering::SeqCst) {
                "⌨️ Hotkey: ✅ Active".to_string()
            } else {
                "⌨️ Hotkey: ❌ Inactive".to_string()
            },
            if self.chat_active.load(Ordering::SeqCst) {
                "📱 Telegram: ✅ Active".to_string()
            } else {
                "📱 Telegram: ❌ Inactive".to_string()
            },
            format!("🔑 Chord: {}", self.chord_label),
        ];
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{EmailSummary, ProviderError, TranscriptionError};
    use crate::state::Mode;
    use async_trait::async_trait;
    use std::path::Path;

    struct StubModel {
        available: bool,
    }

    #[async_trait]
    impl ModelProvider for StubModel {
        async fn complete(&self, _: &str, _: Option<&str>) -> Result<String, ProviderError> {
            Err(ProviderError::Unconfigured)
        }
        fn is_available(&self) -> bool {
            self.available
        }
    }

    struct StubTranscriber {
        available: bool,
    }

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(&self, _: &Path) -> Result<String, TranscriptionError> {
            Err(TranscriptionError::NoOutput)
        }
        fn is_available(&self) -> bool {
            self.available
        }
    }

    struct StubEmail {
        authenticated: bool,
    }

    #[async_trait]
    impl EmailService for StubEmail {
        async fn recent(&self, _: usize) -> Vec<EmailSummary> {
            Vec::new()
        }
        async fn search(&self, _: &str, _: usize) -> Vec<EmailSummary> {
            Vec::new()
        }
        async fn send(&self, _: &str, _: &str, _: &str) -> bool {
            false
        }
        fn is_authenticated(&self) -> bool {
            self.authenticated
        }
    }

    fn aggregator(all_up: bool) -> StatusAggregator {
        StatusAggregator::new(
            ModeState::new(Mode::Online),
            Arc::new(StubModel { available: all_up }),
            Arc::new(StubTranscriber { available: all_up }),
            Arc::new(StubEmail {
                authenticated: all_up,
            }),
            Arc::new(AtomicBool::new(all_up)),
            Arc::new(AtomicBool::new(all_up)),
            "ctrl+alt+a".to_string(),
        )
    }

    #[test]
    fn test_report_order_is_fixed() {
        let report = aggregator(true).report();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("🤖 LLM: ONLINE (Gemini)"));
        assert_eq!(lines[1], "🎤 Whisper: ✅ Available");
        assert_eq!(lines[2], "📧 Email: ✅ Connected");
        assert_eq!(lines[3], "⌨️ Hotkey: ✅ Active");
        assert_eq!(lines[4], "📱 Telegram: ✅ Active");
        assert_eq!(lines[5], "🔑 Chord: ctrl+alt+a");
    }

    #[test]
    fn test_unavailable_collaborators_are_reported_not_omitted() {
        let report = aggregator(false).report();
        assert!(report.contains("❌ Unavailable"));
        assert!(report.contains("🎤 Whisper: ❌ Not available"));
        assert!(report.contains("📧 Email: ❌ Not connected"));
        assert!(report.contains("⌨️ Hotkey: ❌ Inactive"));
        assert!(report.contains("📱 Telegram: ❌ Inactive"));
        assert_eq!(report.lines().count(), 6);
    }
}
