//! Chat receive loop and command handling
//!
//! The loop suspends only on the long-poll wait. Per-message work
//! (transcription, intent dispatch, replies) runs on spawned tasks through
//! the session executor so the loop keeps accepting new events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::collab::{EmailService, TranscriptionError, Transcriber};
use crate::session::{SessionExecutor, Utterance, HELP_MESSAGE};
use crate::state::ModeState;
use crate::status::StatusAggregator;

use super::api::{Message, TelegramClient, Voice};

/// Fixed reply for senders rejected by the authorization policy.
pub const UNAUTHORIZED_REPLY: &str = "❌ Unauthorized access";

const WELCOME_MESSAGE: &str = "\
🤖 Hello! I'm your AI Assistant.

I can help you with:
• File search and management
• Email reading and sending
• Voice and text processing
• General questions and tasks

Send me a message or voice note to get started!

Commands:
/help - Show this help
/mode - Switch between online/offline
/status - Check system status";

const SEND_USAGE: &str = "Usage: /send <address> <subject> | <body>";

/// How long each getUpdates call blocks server-side.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Single allow-listed sender identity; unset means every sender is
/// authorized.
#[derive(Debug, Clone)]
pub struct AuthorizationPolicy {
    allowed: Option<String>,
}

impl AuthorizationPolicy {
    pub fn allow_only(allowed: Option<String>) -> Self {
        Self { allowed }
    }

    pub fn allows(&self, sender_id: &str) -> bool {
        match &self.allowed {
            Some(allowed) => allowed == sender_id,
            None => true,
        }
    }
}

/// Long-lived receive loop over the chat transport.
pub struct ChatFrontend {
    api: TelegramClient,
    executor: Arc<SessionExecutor>,
    policy: AuthorizationPolicy,
    mode: ModeState,
    status: Arc<StatusAggregator>,
    email: Arc<dyn EmailService>,
    transcriber: Arc<dyn Transcriber>,
    active: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ChatFrontend {
    /// `active` is the liveness flag shared with the status report; it is
    /// owned by the caller because the report exists before the frontend.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: TelegramClient,
        executor: Arc<SessionExecutor>,
        policy: AuthorizationPolicy,
        mode: ModeState,
        status: Arc<StatusAggregator>,
        email: Arc<dyn EmailService>,
        transcriber: Arc<dyn Transcriber>,
        active: Arc<AtomicBool>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            api,
            executor,
            policy,
            mode,
            status,
            email,
            transcriber,
            active,
            shutdown_tx,
        }
    }

    /// Shared liveness flag for the status report.
    pub fn activity_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    /// Receive loop. Suspends on the long poll; returns after [`stop`].
    ///
    /// [`stop`]: ChatFrontend::stop
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut offset = 0i64;

        self.active.store(true, Ordering::SeqCst);
        info!("chat frontend polling for updates");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,

                result = self.api.get_updates(offset, POLL_TIMEOUT_SECS) => match result {
                    Ok(updates) => {
                        for update in updates {
                            offset = offset.max(update.update_id + 1);
                            if let Some(message) = update.message {
                                let _ = self.handle_message(message);
                            }
                        }
                    }
                    Err(e) => {
                        warn!(?e, "update poll failed, backing off");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                },
            }
        }

        self.active.store(false, Ordering::SeqCst);
        info!("chat frontend stopped");
    }

    /// Cancel the receive loop. Idempotent and safe to call even if the
    /// loop never started.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Authorize and hand one inbound message to a worker task.
    fn handle_message(&self, message: Message) -> JoinHandle<()> {
        let chat_id = message.chat.id;
        let sender_id = message
            .from
            .as_ref()
            .map(|u| u.id.to_string())
            .unwrap_or_default();

        // Authorization comes first: an unauthorized message gets the fixed
        // reply and touches nothing else.
        if !self.policy.allows(&sender_id) {
            warn!(%sender_id, "rejecting unauthorized sender");
            let api = self.api.clone();
            return tokio::spawn(async move {
                send_or_warn(&api, chat_id, UNAUTHORIZED_REPLY).await;
            });
        }

        if let Some(text) = message.text {
            if text.starts_with('/') {
                let task = CommandTask {
                    api: self.api.clone(),
                    mode: self.mode.clone(),
                    status: Arc::clone(&self.status),
                    email: Arc::clone(&self.email),
                };
                return tokio::spawn(async move {
                    let reply = task.run(&text).await;
                    send_or_warn(&task.api, chat_id, &reply).await;
                });
            }

            let api = self.api.clone();
            let executor = Arc::clone(&self.executor);
            return tokio::spawn(async move {
                let _ = api.send_typing(chat_id).await;
                let utterance = Utterance::text(text, &sender_id);
                let reply = executor.process(&utterance).await;
                send_or_warn(&api, chat_id, &reply).await;
            });
        }

        if let Some(voice) = message.voice {
            let api = self.api.clone();
            let executor = Arc::clone(&self.executor);
            let transcriber = Arc::clone(&self.transcriber);
            return tokio::spawn(async move {
                let _ = api.send_typing(chat_id).await;
                handle_voice(&api, &executor, transcriber.as_ref(), chat_id, &sender_id, voice)
                    .await;
            });
        }

        // Stickers, photos, etc. are not utterances.
        tokio::spawn(async {})
    }
}

async fn send_or_warn(api: &TelegramClient, chat_id: i64, text: &str) {
    if let Err(e) = api.send_message(chat_id, text).await {
        warn!(?e, chat_id, "failed to send reply");
    }
}

/// Transcribe a voice note and dispatch the transcript. The downloaded
/// temp file is removed on every path.
async fn handle_voice(
    api: &TelegramClient,
    executor: &SessionExecutor,
    transcriber: &dyn Transcriber,
    chat_id: i64,
    sender_id: &str,
    voice: Voice,
) {
    let temp = match api.download_voice(&voice.file_id).await {
        Ok(temp) => temp,
        Err(e) => {
            warn!(?e, "voice download failed");
            send_or_warn(api, chat_id, "❌ Error processing voice message").await;
            return;
        }
    };

    match transcriber.transcribe(temp.path()).await {
        Ok(transcript) => {
            send_or_warn(api, chat_id, &format!("🎤 Transcription: {transcript}")).await;
            let utterance = Utterance::voice(transcript, sender_id);
            let reply = executor.process(&utterance).await;
            send_or_warn(api, chat_id, &reply).await;
        }
        Err(TranscriptionError::Timeout(_)) => {
            send_or_warn(api, chat_id, "Transcription timed out").await;
        }
        Err(e) => {
            warn!(?e, "voice transcription failed");
            send_or_warn(api, chat_id, "❌ Could not transcribe voice message").await;
        }
    }
}

/// Slash commands bypass the intent router and act on the mode state,
/// status report, or email collaborator directly.
struct CommandTask {
    api: TelegramClient,
    mode: ModeState,
    status: Arc<StatusAggregator>,
    email: Arc<dyn EmailService>,
}

impl CommandTask {
    async fn run(&self, text: &str) -> String {
        let mut parts = text.trim().splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or("").trim();

        match command {
            "/start" => WELCOME_MESSAGE.to_string(),
            "/help" => HELP_MESSAGE.to_string(),
            "/status" => self.status.report(),
            "/mode" => self.mode_command(rest),
            "/send" => self.send_command(rest).await,
            _ => "Unknown command. Send /help for available commands.".to_string(),
        }
    }

    fn mode_command(&self, arg: &str) -> String {
        if arg.is_empty() {
            return format!(
                "Current mode: {}\nUse: /mode online or /mode offline",
                self.mode.get()
            );
        }

        match self.mode.set(arg) {
            Ok(mode) => format!("✅ Switched to {mode} mode"),
            Err(_) => "Invalid mode. Use 'online' or 'offline'".to_string(),
        }
    }

    async fn send_command(&self, args: &str) -> String {
        let Some((to, subject, body)) = parse_send_args(args) else {
            return SEND_USAGE.to_string();
        };

        if self.email.send(&to, &subject, &body).await {
            format!("✅ Email sent to {to}")
        } else {
            "❌ Failed to send email".to_string()
        }
    }
}

/// Parse `<address> <subject> | <body>`.
fn parse_send_args(args: &str) -> Option<(String, String, String)> {
    let (left, body) = args.split_once('|')?;
    let body = body.trim();

    let mut words = left.trim().split_whitespace();
    let to = words.next()?.to_string();
    let subject = words.collect::<Vec<_>>().join(" ");

    if subject.is_empty() || body.is_empty() {
        return None;
    }
    Some((to, subject, body.to_string()))
}
