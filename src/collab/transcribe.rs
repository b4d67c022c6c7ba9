//! Speech-to-text via the whisper.cpp CLI
//!
//! Runs the whisper-cli binary as a subprocess with `-otxt` output and reads
//! the transcript file back. The subprocess is killed if it exceeds the
//! configured duration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::Transcriber;

/// Errors from the transcription subprocess
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("failed to launch whisper-cli: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("whisper-cli exited with an error: {0}")]
    Failed(String),

    #[error("transcription exceeded {0} seconds")]
    Timeout(u64),

    #[error("whisper-cli produced no transcript output")]
    NoOutput,
}

/// [`Transcriber`] shelling out to a whisper.cpp build.
pub struct WhisperCli {
    executable: PathBuf,
    model: PathBuf,
    threads: usize,
    timeout: Duration,
}

impl WhisperCli {
    pub fn new(executable: PathBuf, model: PathBuf, threads: usize, timeout: Duration) -> Self {
        Self {
            executable,
            model,
            threads,
            timeout,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperCli {
    async fn transcribe(&self, audio: &Path) -> Result<String, TranscriptionError> {
        // whisper-cli writes "<base>.txt" next to the audio file.
        let output_base = audio.with_extension("");
        let output_file = output_base.with_extension("txt");

        let mut command = Command::new(&self.executable);
        command
            .arg("-m")
            .arg(&self.model)
            .arg("-f")
            .arg(audio)
            .arg("-otxt")
            .arg("-of")
            .arg(&output_base)
            .arg("-t")
            .arg(self.threads.to_string())
            .kill_on_drop(true);

        debug!(?audio, timeout_secs = self.timeout.as_secs(), "running whisper-cli");

        let child = command
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()?;

        // On timeout the wait future is dropped and kill_on_drop reaps the
        // child; the partial output file is cleaned up below either way.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                let _ = std::fs::remove_file(&output_file);
                return Err(TranscriptionError::Timeout(self.timeout.as_secs()));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let _ = std::fs::remove_file(&output_file);
            return Err(TranscriptionError::Failed(stderr));
        }

        let transcript = std::fs::read_to_string(&output_file)
            .map(|text| text.trim().to_string())
            .map_err(|_| TranscriptionError::NoOutput);
        if std::fs::remove_file(&output_file).is_err() {
            warn!(?output_file, "could not remove transcript file");
        }

        match transcript {
            Ok(text) if text.is_empty() => Err(TranscriptionError::NoOutput),
            other => other,
        }
    }

    fn is_available(&self) -> bool {
        self.executable.exists() && self.model.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_when_paths_missing() {
        let whisper = WhisperCli::new(
            PathBuf::from("/no/such/binary"),
            PathBuf::from("/no/such/model.bin"),
            4,
            Duration::from_secs(1),
        );
        assert!(!whisper.is_available());
    }

    // Stand-in scripts emulate the whisper-cli argument contract:
    // -m <model> -f <audio> -otxt -of <base> -t <threads>.
    #[cfg(unix)]
    fn fake_whisper(dir: &Path, script_body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("whisper-cli");
        std::fs::write(&path, format!("#!/bin/sh\n{script_body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_transcribe_reads_and_removes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_whisper(dir.path(), r#"printf 'hello world\n' > "$7.txt""#);
        let audio = dir.path().join("clip.wav");
        std::fs::write(&audio, b"RIFF").unwrap();

        let whisper = WhisperCli::new(exe, audio.clone(), 2, Duration::from_secs(5));
        let text = whisper.transcribe(&audio).await.unwrap();

        assert_eq!(text, "hello world");
        assert!(!dir.path().join("clip.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_subprocess_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_whisper(dir.path(), "echo 'model load failed' >&2; exit 3");
        let audio = dir.path().join("clip.wav");
        std::fs::write(&audio, b"RIFF").unwrap();

        let whisper = WhisperCli::new(exe, audio.clone(), 2, Duration::from_secs(5));
        let err = whisper.transcribe(&audio).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Failed(ref msg) if msg.contains("model load failed")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_subprocess() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_whisper(dir.path(), "sleep 30");
        let audio = dir.path().join("clip.wav");
        std::fs::write(&audio, b"RIFF").unwrap();

        let whisper = WhisperCli::new(exe, audio.clone(), 2, Duration::from_millis(200));
        let err = whisper.transcribe(&audio).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::Timeout(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_whisper(dir.path(), "exit 0");
        let audio = dir.path().join("clip.wav");
        std::fs::write(&audio, b"RIFF").unwrap();

        let whisper = WhisperCli::new(exe, audio.clone(), 2, Duration::from_secs(5));
        let err = whisper.transcribe(&audio).await.unwrap_err();
        assert!(matches!(err, TranscriptionError::NoOutput));
    }
}
