//! Configurable collaborator stubs for tests

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;

use super::{
    AudioSource, CaptureError, Collaborators, EmailService, EmailSummary, FileHit, FileIndex,
    ModelProvider, ProviderError, TranscriptionError, Transcriber,
};

/// Invocation counters shared with the stubs inside a [`Collaborators`].
#[derive(Clone, Default)]
pub struct Probes {
    pub file_searches: Arc<AtomicUsize>,
    pub email_calls: Arc<AtomicUsize>,
    pub model_calls: Arc<AtomicUsize>,
    pub captures: Arc<AtomicUsize>,
    pub transcriptions: Arc<AtomicUsize>,
    /// Highest number of captures observed running at once
    pub max_concurrent_captures: Arc<AtomicUsize>,
    /// Path of the last temp WAV handed out by the stub audio source
    pub last_capture_path: Arc<Mutex<Option<PathBuf>>>,
}

/// Canned behavior for the stub set.
#[derive(Clone, Default)]
pub struct StubConfig {
    pub file_hits: Vec<FileHit>,
    pub emails: Vec<EmailSummary>,
    pub email_send_ok: bool,
    pub email_authenticated: bool,
    /// `None` makes the model fail with `Unconfigured`
    pub model_reply: Option<String>,
    /// `None` makes transcription fail; `Some` is the transcript
    pub transcript: Option<String>,
    pub transcription_times_out: bool,
    pub capture_fails: bool,
    /// Artificial capture latency, for overlap tests
    pub capture_delay: Option<Duration>,
}

pub fn stub_collaborators(config: StubConfig) -> (Collaborators, Probes) {
    let probes = Probes::default();
    let collab = Collaborators {
        files: Arc::new(StubFileIndex {
            hits: config.file_hits,
            probes: probes.clone(),
        }),
        email: Arc::new(StubEmailService {
            emails: config.emails,
            send_ok: config.email_send_ok,
            authenticated: config.email_authenticated,
            probes: probes.clone(),
        }),
        transcriber: Arc::new(StubTranscriber {
            transcript: config.transcript,
            times_out: config.transcription_times_out,
            probes: probes.clone(),
        }),
        model: Arc::new(StubModel {
            reply: config.model_reply,
            probes: probes.clone(),
        }),
        audio: Arc::new(StubAudio {
            fails: config.capture_fails,
            delay: config.capture_delay,
            running: Arc::new(AtomicUsize::new(0)),
            probes: probes.clone(),
        }),
    };
    (collab, probes)
}

struct StubFileIndex {
    hits: Vec<FileHit>,
    probes: Probes,
}

#[async_trait]
impl FileIndex for StubFileIndex {
    async fn search(&self, _query: &str) -> Vec<FileHit> {
        self.probes.file_searches.fetch_add(1, Ordering::SeqCst);
        self.hits.clone()
    }
}

struct StubEmailService {
    emails: Vec<EmailSummary>,
    send_ok: bool,
    authenticated: bool,
    probes: Probes,
}

#[async_trait]
impl EmailService for StubEmailService {
    async fn recent(&self, n: usize) -> Vec<EmailSummary> {
        self.probes.email_calls.fetch_add(1, Ordering::SeqCst);
        self.emails.iter().take(n).cloned().collect()
    }

    async fn search(&self, _query: &str, n: usize) -> Vec<EmailSummary> {
        self.probes.email_calls.fetch_add(1, Ordering::SeqCst);
        self.emails.iter().take(n).cloned().collect()
    }

    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> bool {
        self.probes.email_calls.fetch_add(1, Ordering::SeqCst);
        self.send_ok
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

struct StubTranscriber {
    transcript: Option<String>,
    times_out: bool,
    probes: Probes,
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, _audio: &Path) -> Result<String, TranscriptionError> {
        self.probes.transcriptions.fetch_add(1, Ordering::SeqCst);
        if self.times_out {
            return Err(TranscriptionError::Timeout(1));
        }
        self.transcript
            .clone()
            .ok_or(TranscriptionError::NoOutput)
    }

    fn is_available(&self) -> bool {
        self.transcript.is_some()
    }
}

struct StubModel {
    reply: Option<String>,
    probes: Probes,
}

#[async_trait]
impl ModelProvider for StubModel {
    async fn complete(&self, _: &str, _: Option<&str>) -> Result<String, ProviderError> {
        self.probes.model_calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().ok_or(ProviderError::Unconfigured)
    }

    fn is_available(&self) -> bool {
        self.reply.is_some()
    }
}

struct StubAudio {
    fails: bool,
    delay: Option<Duration>,
    running: Arc<AtomicUsize>,
    probes: Probes,
}

#[async_trait]
impl AudioSource for StubAudio {
    async fn capture(&self, _duration: Duration) -> Result<NamedTempFile, CaptureError> {
        self.probes.captures.fetch_add(1, Ordering::SeqCst);

        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.probes
            .max_concurrent_captures
            .fetch_max(now_running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        if self.fails {
            return Err(CaptureError::NoDevice);
        }

        let file = tempfile::Builder::new().suffix(".wav").tempfile()?;
        *self.probes.last_capture_path.lock().unwrap() = Some(file.path().to_path_buf());
        Ok(file)
    }
}
