//! Synthetic key injection.
//!
//! [`InputInjector`] turns a set of keys into two batches, all key-downs then
//! all key-ups, and hands each batch to an [`InputBackend`] in a single call.
//! Sending the downs together is what makes the keys land as a chord rather
//! than as a run of separate taps.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::keys::{display_key, KeyCode};

/// Whether an event presses or releases its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

/// One synthetic key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub direction: KeyDirection,
}

impl KeyEvent {
    pub fn down(code: KeyCode) -> Self {
        Self {
            code,
            direction: KeyDirection::Down,
        }
    }

    pub fn up(code: KeyCode) -> Self {
        Self {
            code,
            direction: KeyDirection::Up,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.direction {
            KeyDirection::Down => "down",
            KeyDirection::Up => "up",
        };
        write!(f, "{} {}", display_key(self.code), arrow)
    }
}

/// Something that can deliver a batch of key events to the OS input queue.
///
/// One call is one submission: a backend must not split a batch into
/// several OS calls. Returns the number of events the OS accepted.
pub trait InputBackend: Send + Sync {
    fn send(&self, batch: &[KeyEvent]) -> Result<usize>;
}

/// Backend that only logs what it would have sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogBackend;

impl InputBackend for LogBackend {
    fn send(&self, batch: &[KeyEvent]) -> Result<usize> {
        if !batch.is_empty() {
            let events: Vec<String> = batch.iter().map(ToString::to_string).collect();
            info!("dry run: {}", events.join(", "));
        }
        Ok(batch.len())
    }
}

/// Presses and releases a set of keys together.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct InputInjector {
    backend: Arc<dyn InputBackend>,
}

impl InputInjector {
    pub fn new(backend: Arc<dyn InputBackend>) -> Self {
        Self { backend }
    }

    /// Press every key, then release every key.
    ///
    /// Fire-and-forget: a backend failure is logged and dropped so that a
    /// refusing OS can never stop the run loop.
    pub fn inject(&self, keys: &[KeyCode]) {
        let downs: Vec<KeyEvent> = keys.iter().copied().map(KeyEvent::down).collect();
        self.submit(&downs);

        let ups: Vec<KeyEvent> = keys.iter().copied().map(KeyEvent::up).collect();
        self.submit(&ups);
    }

    fn submit(&self, batch: &[KeyEvent]) {
        match self.backend.send(batch) {
            Ok(sent) => debug!("injected {} of {} events", sent, batch.len()),
            Err(e) => warn!("ignoring injection failure: {}", e),
        }
    }
}

impl fmt::Debug for InputInjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputInjector").finish_non_exhaustive()
    }
}
