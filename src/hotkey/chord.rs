//! Chord key definitions and held-set tracking

use std::collections::HashSet;

/// A key that can participate in an activation chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChordKey {
    Control,
    Alt,
    Shift,
    Super,
    /// A letter or digit key
    Char(char),
}

impl ChordKey {
    /// Parse a configured key name ("ctrl", "alt", "a", ...).
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        match name.as_str() {
            "ctrl" | "control" => Some(ChordKey::Control),
            "alt" | "option" | "opt" => Some(ChordKey::Alt),
            "shift" => Some(ChordKey::Shift),
            "cmd" | "command" | "super" | "meta" | "win" => Some(ChordKey::Super),
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphanumeric() => Some(ChordKey::Char(c)),
                    _ => None,
                }
            }
        }
    }
}

/// Parse a configured chord; returns the first unknown name on failure.
pub fn parse_chord(names: &[String]) -> Result<HashSet<ChordKey>, String> {
    names
        .iter()
        .map(|name| ChordKey::parse(name).ok_or_else(|| name.clone()))
        .collect()
}

/// Tracks held keys against the chord and arms exactly once per completion.
///
/// Arms when the held set equals the chord exactly; disarms as soon as any
/// chord key is released, which prevents repeat-fire while the chord stays
/// held.
#[derive(Debug)]
pub struct ChordTracker {
    chord: HashSet<ChordKey>,
    held: HashSet<ChordKey>,
    armed: bool,
}

impl ChordTracker {
    pub fn new(chord: HashSet<ChordKey>) -> Self {
        Self {
            chord,
            held: HashSet::new(),
            armed: false,
        }
    }

    /// Record a key press. Returns `true` when this press completes the
    /// chord and the tracker arms.
    pub fn key_down(&mut self, key: ChordKey) -> bool {
        self.held.insert(key);
        if !self.armed && self.held == self.chord {
            self.armed = true;
            return true;
        }
        false
    }

    /// Record a key release.
    pub fn key_up(&mut self, key: ChordKey) {
        self.held.remove(&key);
        if self.armed && self.chord.contains(&key) {
            self.armed = false;
        }
    }

    #[cfg(test)]
    fn is_armed(&self) -> bool {
        self.armed
    }
}
