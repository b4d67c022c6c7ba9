//! adjutant: desk-side assistant daemon
//!
//! Two concurrent front ends feed one dispatch path:
//! - a global keyboard chord that triggers local voice capture
//! - a Telegram long-poll loop for text and voice messages
//!
//! Utterances from both are classified by an ordered intent router and
//! resolved against the capability collaborators (file search, email,
//! transcription, conversational model), with a guarded mode flag deciding
//! which model backend answers chat.

mod chat;
mod collab;
mod config;
mod hotkey;
mod intent;
mod session;
mod state;
mod status;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::chat::{AuthorizationPolicy, ChatFrontend, TelegramClient};
use crate::collab::audio::MicrophoneSource;
use crate::collab::email::GmailClient;
use crate::collab::files::FsFileIndex;
use crate::collab::model::HttpModelProvider;
use crate::collab::transcribe::WhisperCli;
use crate::collab::Collaborators;
use crate::config::Config;
use crate::hotkey::KeyListener;
use crate::session::{Dispatcher, SessionExecutor};
use crate::state::{Mode, ModeState};
use crate::status::StatusAggregator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "adjutant starting");

    // Load configuration; a missing bot token is fatal before any loop runs
    let config = Config::from_env()?;

    let mode = ModeState::new(config.default_mode.parse::<Mode>().unwrap_or_else(|e| {
        warn!(?e, "invalid ASSISTANT_MODE, defaulting to online");
        Mode::Online
    }));
    info!(mode = %mode.get(), "mode state initialized");

    // Collaborators
    let collab = Collaborators {
        files: Arc::new(FsFileIndex::new(
            config.search_paths.clone(),
            config.max_file_results,
        )),
        email: Arc::new(GmailClient::new(config.gmail_access_token.clone())),
        transcriber: Arc::new(WhisperCli::new(
            config.whisper_executable.clone(),
            config.whisper_model.clone(),
            config.whisper_threads,
            config.whisper_timeout,
        )),
        model: Arc::new(HttpModelProvider::new(
            mode.clone(),
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.ollama_base_url.clone(),
            config.ollama_model.clone(),
        )),
        audio: Arc::new(MicrophoneSource),
    };

    // Hotkey listener -> capture bridge
    let (activation_tx, mut activation_rx) = mpsc::channel(8);
    let listener = KeyListener::new(&config.chord, activation_tx)?;

    // Chat transport
    let api = TelegramClient::new(config.telegram_token.clone());
    let policy = AuthorizationPolicy::allow_only(config.allowed_chat_id.clone());

    // Liveness flag shared between the status report and the chat loop
    let chat_active = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let status = Arc::new(StatusAggregator::new(
        mode.clone(),
        collab.model.clone(),
        collab.transcriber.clone(),
        collab.email.clone(),
        listener.liveness_flag(),
        Arc::clone(&chat_active),
        config.chord.join("+"),
    ));

    let email = collab.email.clone();
    let transcriber = collab.transcriber.clone();
    let dispatcher = Arc::new(Dispatcher::new(
        collab,
        mode.clone(),
        Arc::clone(&status),
        config.max_email_results,
    ));
    let executor = Arc::new(SessionExecutor::spawn(
        Arc::clone(&dispatcher),
        Duration::from_secs(config.capture_secs),
    ));

    let frontend = ChatFrontend::new(
        api,
        Arc::clone(&executor),
        policy,
        mode.clone(),
        Arc::clone(&status),
        email,
        transcriber,
        chat_active,
    );

    // Start the hotkey listener (runs on a dedicated thread)
    match listener.start() {
        Ok(()) => info!(chord = %config.chord.join("+"), "hotkey listener started"),
        Err(e) => {
            error!(?e, "failed to start hotkey listener");
            warn!("continuing without hotkey support");
        }
    }

    // Bridge chord activations into serialized capture sessions
    let bridge_executor = Arc::clone(&executor);
    let bridge = tokio::spawn(async move {
        while let Some(_request) = activation_rx.recv().await {
            match bridge_executor.submit_capture() {
                Ok(done) => {
                    tokio::spawn(async move {
                        match done.await {
                            Ok(reply) => info!(%reply, "voice session reply"),
                            Err(_) => warn!("voice session ended without a reply"),
                        }
                    });
                }
                Err(_) => warn!("{}", session::BUSY_REPLY),
            }
        }
    });

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        _ = frontend.run() => {
            info!("chat frontend exited");
        }

        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    listener.stop();
    frontend.stop();
    bridge.abort();

    info!("adjutant stopped");

    Ok(())
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}
