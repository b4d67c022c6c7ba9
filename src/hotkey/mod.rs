//! Global keyboard chord listening
//!
//! Tracks the set of currently-held keys against a configured chord and
//! dispatches an activation request when the chord is completed. The OS hook
//! (macOS CGEventTap) runs on a dedicated thread; chord tracking itself is
//! platform-independent.

mod chord;
mod listener;

pub use chord::{parse_chord, ChordKey, ChordTracker};
pub use listener::{ActivationRequest, KeyListener, ListenerError};
