//! Global key listener using macOS CGEventTap
//!
//! Monitors system-wide key and modifier events on a dedicated thread with
//! its own CFRunLoop. The event-tap callback never blocks: raw events are
//! queued to the listener thread, and activations are dispatched to the
//! async side with a non-blocking send.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::chord::parse_chord;
#[cfg(target_os = "macos")]
use super::chord::ChordTracker;
use super::ChordKey;
use std::collections::HashSet;

/// Request to start a voice-capture session, fired on chord completion.
#[derive(Debug, Clone, Copy)]
pub struct ActivationRequest;

/// Errors from the key listener
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("key listener is already running")]
    AlreadyRunning,

    #[error("no key-event hook available on this platform or permission denied")]
    Unavailable,

    #[error("unknown chord key name: {0}")]
    UnknownKey(String),

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

/// Global key listener that fires an [`ActivationRequest`] when the
/// configured chord is completed.
#[derive(Debug)]
pub struct KeyListener {
    chord: HashSet<ChordKey>,
    activation_tx: mpsc::Sender<ActivationRequest>,
    running: Arc<AtomicBool>,
}

impl KeyListener {
    /// Create a listener for the named chord keys.
    pub fn new(
        chord_names: &[String],
        activation_tx: mpsc::Sender<ActivationRequest>,
    ) -> Result<Self, ListenerError> {
        let chord = parse_chord(chord_names).map_err(ListenerError::UnknownKey)?;
        Ok(Self {
            chord,
            activation_tx,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start the listener.
    ///
    /// Returns once the event tap is registered, or with an error if the
    /// hook cannot be installed (the listener is left inactive).
    pub fn start(&self) -> Result<(), ListenerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ListenerError::AlreadyRunning);
        }

        match self.start_platform_hook() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    #[cfg(target_os = "macos")]
    fn start_platform_hook(&self) -> Result<(), ListenerError> {
        let chord = self.chord.clone();
        let activation_tx = self.activation_tx.clone();
        let running = Arc::clone(&self.running);

        // The thread reports whether tap registration succeeded before the
        // run loop starts.
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        std::thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                tracing::info!("hotkey listener thread started");

                if let Err(e) = macos::run_event_loop(chord, activation_tx, &running, ready_tx) {
                    tracing::error!(?e, "hotkey listener error");
                }

                running.store(false, Ordering::SeqCst);
                tracing::info!("hotkey listener thread stopped");
            })
            .map_err(|e| ListenerError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(ListenerError::Unavailable),
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn start_platform_hook(&self) -> Result<(), ListenerError> {
        let _ = (&self.chord, &self.activation_tx);
        Err(ListenerError::Unavailable)
    }

    /// Stop the listener. Idempotent; the listener thread exits on its next
    /// poll interval.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// True hook liveness, not merely "start was called".
    pub fn is_listening(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Shared liveness flag for the status report.
    pub fn liveness_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

#[cfg(target_os = "macos")]
mod macos {
    use super::*;

    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
        CGEventTapPlacement, CGEventType, EventField,
    };

    /// Raw event forwarded from the tap callback to the listener thread.
    enum TapEvent {
        Key { key: ChordKey, down: bool },
        Flags(CGEventFlags),
    }

    /// Modifier snapshot for edge detection across FlagsChanged events.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    struct Modifiers {
        control: bool,
        alt: bool,
        shift: bool,
        command: bool,
    }

    impl Modifiers {
        fn from_flags(flags: CGEventFlags) -> Self {
            Self {
                control: flags.contains(CGEventFlags::CGEventFlagControl),
                alt: flags.contains(CGEventFlags::CGEventFlagAlternate),
                shift: flags.contains(CGEventFlags::CGEventFlagShift),
                command: flags.contains(CGEventFlags::CGEventFlagCommand),
            }
        }

        fn edges(&self, next: &Modifiers) -> Vec<(ChordKey, bool)> {
            let mut edges = Vec::new();
            for (held_before, held_now, key) in [
                (self.control, next.control, ChordKey::Control),
                (self.alt, next.alt, ChordKey::Alt),
                (self.shift, next.shift, ChordKey::Shift),
                (self.command, next.command, ChordKey::Super),
            ] {
                if held_before != held_now {
                    edges.push((key, held_now));
                }
            }
            edges
        }
    }

    /// ANSI virtual keycodes for letters and digits.
    fn keycode_to_char(code: i64) -> Option<char> {
        let c = match code {
            0 => 'a',
            1 => 's',
            2 => 'd',
            3 => 'f',
            4 => 'h',
            5 => 'g',
            6 => 'z',
            7 => 'x',
            8 => 'c',
            9 => 'v',
            11 => 'b',
            12 => 'q',
            13 => 'w',
            14 => 'e',
            15 => 'r',
            16 => 'y',
            17 => 't',
            18 => '1',
            19 => '2',
            20 => '3',
            21 => '4',
            22 => '6',
            23 => '5',
            25 => '9',
            26 => '7',
            28 => '8',
            29 => '0',
            31 => 'o',
            32 => 'u',
            34 => 'i',
            35 => 'p',
            37 => 'l',
            38 => 'j',
            40 => 'k',
            45 => 'n',
            46 => 'm',
            _ => return None,
        };
        Some(c)
    }

    pub(super) fn run_event_loop(
        chord: HashSet<ChordKey>,
        activation_tx: mpsc::Sender<ActivationRequest>,
        running: &AtomicBool,
        ready_tx: std::sync::mpsc::Sender<Result<(), ListenerError>>,
    ) -> Result<(), ListenerError> {
        let mut tracker = ChordTracker::new(chord);

        // Events cross from the tap callback to this thread over a channel;
        // the callback itself must stay fast and non-blocking.
        let (callback_tx, callback_rx) = std::sync::mpsc::channel::<TapEvent>();

        let callback = move |_proxy: core_graphics::event::CGEventTapProxy,
                             event_type: CGEventType,
                             event: &CGEvent|
              -> Option<CGEvent> {
            match event_type {
                CGEventType::KeyDown | CGEventType::KeyUp => {
                    let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
                    if let Some(c) = keycode_to_char(code) {
                        let _ = callback_tx.send(TapEvent::Key {
                            key: ChordKey::Char(c),
                            down: matches!(event_type, CGEventType::KeyDown),
                        });
                    }
                }
                CGEventType::FlagsChanged => {
                    let _ = callback_tx.send(TapEvent::Flags(event.get_flags()));
                }
                CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                    tracing::warn!("event tap disabled, will re-enable");
                }
                _ => {}
            }
            Some(event.clone())
        };

        let tap = match CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::ListenOnly,
            vec![
                CGEventType::KeyDown,
                CGEventType::KeyUp,
                CGEventType::FlagsChanged,
            ],
            callback,
        ) {
            Ok(tap) => tap,
            Err(_) => {
                tracing::error!("failed to create event tap - is Accessibility permission granted?");
                let _ = ready_tx.send(Err(ListenerError::Unavailable));
                return Err(ListenerError::Unavailable);
            }
        };

        tap.enable();

        let run_loop_source = match tap.mach_port.create_runloop_source(0) {
            Ok(source) => source,
            Err(_) => {
                let _ = ready_tx.send(Err(ListenerError::Unavailable));
                return Err(ListenerError::Unavailable);
            }
        };
        let run_loop = CFRunLoop::get_current();

        unsafe {
            run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
        }

        tracing::info!("event tap created and enabled");
        let _ = ready_tx.send(Ok(()));

        let mut modifiers = Modifiers::default();

        while running.load(Ordering::SeqCst) {
            unsafe {
                CFRunLoop::run_in_mode(
                    kCFRunLoopDefaultMode,
                    std::time::Duration::from_millis(100),
                    true,
                );
            }

            while let Ok(event) = callback_rx.try_recv() {
                let fired = match event {
                    TapEvent::Key { key, down } => {
                        if down {
                            tracker.key_down(key)
                        } else {
                            tracker.key_up(key);
                            false
                        }
                    }
                    TapEvent::Flags(flags) => {
                        let next = Modifiers::from_flags(flags);
                        let mut fired = false;
                        for (key, down) in modifiers.edges(&next) {
                            if down {
                                fired |= tracker.key_down(key);
                            } else {
                                tracker.key_up(key);
                            }
                        }
                        modifiers = next;
                        fired
                    }
                };

                if fired {
                    tracing::info!("activation chord detected");
                    // Non-blocking: a full queue means a session is already
                    // pending and the activation is dropped.
                    if activation_tx.try_send(ActivationRequest).is_err() {
                        tracing::warn!("activation queue full, dropping chord activation");
                    }
                }
            }
        }

        Ok(())
    }
}
