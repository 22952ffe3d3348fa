//! Process-wide fan-out of command output to terminal listeners

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, warn};
use uuid::Uuid;

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Stdout(String),
    Stderr(String),
    /// The process could not be spawned at all
    Failure(String),
}

impl OutputEvent {
    pub fn text(&self) -> &str {
        match self {
            OutputEvent::Stdout(t) | OutputEvent::Stderr(t) | OutputEvent::Failure(t) => t,
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, OutputEvent::Stdout(_))
    }

    /// Text as written to the terminal, error tones included
    pub fn terminal_text(&self) -> String {
        match self {
            OutputEvent::Stdout(line) => format!("{line}\n"),
            OutputEvent::Stderr(line) => format!("{RED}{line}{RESET}\n"),
            OutputEvent::Failure(msg) => format!("{RED}Error: {msg}{RESET}\n"),
        }
    }
}

type Listener = Arc<dyn Fn(&OutputEvent) + Send + Sync>;
type Registry = Mutex<HashMap<Uuid, Listener>>;

#[derive(Clone, Default)]
pub struct OutputBus {
    listeners: Arc<Registry>,
}

impl fmt::Debug for OutputBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl OutputBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&OutputEvent) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        lock(&self.listeners).insert(id, Arc::new(listener));
        debug!(%id, "Output listener registered");
        Subscription {
            id,
            registry: Arc::downgrade(&self.listeners),
            detached: false,
        }
    }

    /// Listen to stdout lines only
    pub fn on_output<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let OutputEvent::Stdout(line) = event {
                listener(line);
            }
        })
    }

    /// Listen to stderr lines and spawn failures
    pub fn on_error<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if event.is_error() {
                listener(event.text());
            }
        })
    }

    /// Subscription that forwards every event into a channel
    pub fn channel(&self) -> (Subscription, mpsc::Receiver<OutputEvent>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let sub = self.subscribe(move |event| {
            let _ = lock(&tx).send(event.clone());
        });
        (sub, rx)
    }

    /// Deliver to every listener registered at this moment.
    ///
    /// A panicking listener is logged and skipped; the rest still receive the event.
    pub fn publish(&self, event: &OutputEvent) {
        let listeners: Vec<Listener> = lock(&self.listeners).values().cloned().collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(event = ?event, "Output listener panicked");
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle for a registered listener; dropping it unregisters the listener
pub struct Subscription {
    id: Uuid,
    registry: Weak<Registry>,
    detached: bool,
}

impl Subscription {
    /// Safe to call more than once
    pub fn cancel(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if lock(&registry).remove(&self.id).is_some() {
                debug!(id = %self.id, "Output listener removed");
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| lock(&registry).contains_key(&self.id))
    }

    /// Keep the listener registered for the life of the bus
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
