//! Mode enumeration and the guarded state cell

use std::str::FromStr;
use std::sync::{Arc, RwLock};

/// Response-generation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Gemini API
    Online,
    /// Local Ollama
    Offline,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Online
    }
}

impl Mode {
    /// Human-readable provider name for replies and status lines.
    pub fn provider_name(&self) -> &'static str {
        match self {
            Mode::Online => "Gemini",
            Mode::Offline => "Ollama",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Online => write!(f, "online"),
            Mode::Offline => write!(f, "offline"),
        }
    }
}

impl FromStr for Mode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(Mode::Online),
            "offline" => Ok(Mode::Offline),
            other => Err(ModeError::Unsupported(other.to_string())),
        }
    }
}

/// Mode transition errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModeError {
    /// The candidate is not in the enumerated mode set. The prior mode is
    /// left unchanged.
    #[error("unsupported mode: {0}")]
    Unsupported(String),
}

/// Guarded singleton holding the current mode.
///
/// Cloning shares the underlying cell. Every read observes a fully-written
/// value; `set` is a single guarded assignment, no check-then-set window.
#[derive(Debug, Clone)]
pub struct ModeState {
    inner: Arc<RwLock<Mode>>,
}

impl ModeState {
    pub fn new(initial: Mode) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// Current mode.
    pub fn get(&self) -> Mode {
        *self.inner.read().expect("mode lock poisoned")
    }

    /// Validate and atomically replace the mode.
    ///
    /// An invalid candidate leaves the prior value untouched and returns
    /// the rejection.
    pub fn set(&self, candidate: &str) -> Result<Mode, ModeError> {
        let mode = candidate.parse::<Mode>()?;
        self.replace(mode);
        Ok(mode)
    }

    /// Atomically replace the mode with an already-validated value.
    pub fn replace(&self, mode: Mode) {
        *self.inner.write().expect("mode lock poisoned") = mode;
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let state = ModeState::default();
        state.set("offline").unwrap();
        assert_eq!(state.get(), Mode::Offline);
        state.set("online").unwrap();
        assert_eq!(state.get(), Mode::Online);
    }

    #[test]
    fn test_invalid_target_leaves_prior_value() {
        let state = ModeState::new(Mode::Offline);
        let err = state.set("bogus").unwrap_err();
        assert!(matches!(err, ModeError::Unsupported(ref m) if m == "bogus"));
        assert_eq!(state.get(), Mode::Offline);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(" Online ".parse::<Mode>().unwrap(), Mode::Online);
        assert_eq!("OFFLINE".parse::<Mode>().unwrap(), Mode::Offline);
    }

    #[test]
    fn test_shared_across_clones() {
        let state = ModeState::default();
        let reader = state.clone();
        state.set("offline").unwrap();
        assert_eq!(reader.get(), Mode::Offline);
    }
}
