//! Capability collaborators behind narrow interfaces
//!
//! Everything the core consumes from the outside world lives behind one of
//! these traits: file lookup, email, transcription, model completion, and
//! microphone capture. The daemon wires the real implementations; tests wire
//! stubs.

pub mod audio;
pub mod email;
pub mod files;
pub mod model;
#[cfg(test)]
pub mod testing;
pub mod transcribe;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;

pub use audio::CaptureError;
pub use email::EmailSummary;
pub use files::FileHit;
pub use model::ProviderError;
pub use transcribe::TranscriptionError;

/// Read-only filename lookup over the configured search roots.
#[async_trait]
pub trait FileIndex: Send + Sync {
    /// No side effects; an unreadable root contributes nothing.
    async fn search(&self, query: &str) -> Vec<FileHit>;
}

/// Email access. Failures degrade to empty/false at this boundary rather
/// than raising past it.
#[async_trait]
pub trait EmailService: Send + Sync {
    async fn recent(&self, n: usize) -> Vec<EmailSummary>;
    async fn search(&self, query: &str, n: usize) -> Vec<EmailSummary>;
    async fn send(&self, to: &str, subject: &str, body: &str) -> bool;
    fn is_authenticated(&self) -> bool;
}

/// Speech-to-text over a captured audio file.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<String, TranscriptionError>;
    fn is_available(&self) -> bool;
}

/// Conversational model completion.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, ProviderError>;
    fn is_available(&self) -> bool;
}

/// Microphone capture into a scoped temporary WAV file. The file is deleted
/// when the returned handle drops.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn capture(&self, duration: Duration) -> Result<NamedTempFile, CaptureError>;
}

/// The full collaborator set handed to the session layer.
#[derive(Clone)]
pub struct Collaborators {
    pub files: Arc<dyn FileIndex>,
    pub email: Arc<dyn EmailService>,
    pub transcriber: Arc<dyn Transcriber>,
    pub model: Arc<dyn ModelProvider>,
    pub audio: Arc<dyn AudioSource>,
}
