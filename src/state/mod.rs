//! Shared mode state for response generation
//!
//! A single guarded cell holding the current provider mode:
//! - Online: Gemini API
//! - Offline: local Ollama
//!
//! Written only by the mode-switch command, read by the model provider and
//! the status report.

mod mode;

pub use mode::{Mode, ModeError, ModeState};
