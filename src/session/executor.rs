//! Voice-capture session serialization
//!
//! A single long-lived worker owns the microphone path: capture, transcribe,
//! dispatch. Activations are submitted over a channel; a second activation
//! while one session is in flight is rejected with a distinct busy outcome,
//! never interleaved: overlapping captures would corrupt the exclusive
//! audio device and its temporary buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::collab::TranscriptionError;

use super::{Dispatcher, Utterance};

/// Reply for activations rejected while a session is in flight.
pub const BUSY_REPLY: &str =
    "A voice capture is already in progress. Please wait for it to finish.";

/// Distinct busy outcome for overlapping activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a voice capture session is already in progress")]
pub struct Busy;

struct CaptureJob {
    done: oneshot::Sender<String>,
}

/// Serializes voice-capture sessions and exposes the shared dispatch path.
pub struct SessionExecutor {
    dispatcher: Arc<Dispatcher>,
    job_tx: mpsc::Sender<CaptureJob>,
    in_flight: Arc<AtomicBool>,
}

impl SessionExecutor {
    /// Spawn the capture worker and return the executor handle.
    pub fn spawn(dispatcher: Arc<Dispatcher>, capture_duration: Duration) -> Self {
        let (job_tx, job_rx) = mpsc::channel(1);
        let in_flight = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_worker(
            Arc::clone(&dispatcher),
            job_rx,
            Arc::clone(&in_flight),
            capture_duration,
        ));

        Self {
            dispatcher,
            job_tx,
            in_flight,
        }
    }

    /// Request a voice-capture session.
    ///
    /// Returns a receiver for the final reply, or [`Busy`] if a session is
    /// already in flight. The guard is a single compare-exchange; there is
    /// no check-then-set window.
    pub fn submit_capture(&self) -> Result<oneshot::Receiver<String>, Busy> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Busy);
        }

        let (done_tx, done_rx) = oneshot::channel();
        if self.job_tx.try_send(CaptureJob { done: done_tx }).is_err() {
            // Worker gone or queue full; release the claim we just took.
            self.in_flight.store(false, Ordering::SeqCst);
            return Err(Busy);
        }

        Ok(done_rx)
    }

    /// Process an already-received text utterance through the shared
    /// dispatch path. Safe to call concurrently; only voice capture is
    /// serialized.
    pub async fn process(&self, utterance: &Utterance) -> String {
        self.dispatcher.dispatch(utterance).await
    }
}

/// Clears the in-flight flag when a session ends, on every exit path.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn run_worker(
    dispatcher: Arc<Dispatcher>,
    mut job_rx: mpsc::Receiver<CaptureJob>,
    in_flight: Arc<AtomicBool>,
    capture_duration: Duration,
) {
    info!("capture worker started");

    while let Some(job) = job_rx.recv().await {
        let guard = InFlightGuard(Arc::clone(&in_flight));
        let reply = run_voice_session(&dispatcher, capture_duration).await;
        drop(guard);

        if job.done.send(reply).is_err() {
            warn!("capture reply receiver dropped");
        }
    }

    info!("capture worker stopped");
}

/// One voice session: record, transcribe, dispatch. All failures become
/// reply strings; the temp WAV is released on every path.
async fn run_voice_session(dispatcher: &Dispatcher, duration: Duration) -> String {
    let collab = dispatcher.collaborators();

    let audio = match collab.audio.capture(duration).await {
        Ok(file) => file,
        Err(e) => {
            warn!(?e, "audio capture failed");
            return format!("Error recording audio: {e}");
        }
    };

    let text = match collab.transcriber.transcribe(audio.path()).await {
        Ok(text) => text,
        Err(TranscriptionError::Timeout(_)) => {
            warn!("transcription timed out");
            return "Transcription timed out".to_string();
        }
        Err(e) => {
            warn!(?e, "transcription failed");
            return "Error transcribing audio".to_string();
        }
    };

    info!(%text, "voice transcription complete");
    let utterance = Utterance::voice(text, "hotkey");
    dispatcher.dispatch(&utterance).await
    // `audio` drops here, removing the temp WAV
}
