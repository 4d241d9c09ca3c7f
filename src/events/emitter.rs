//! Ordered, hash-chained event emission.
//!
//! Node tasks run concurrently but the event stream is a single ordered
//! sequence. [`EventEmitter`] serialises emission under a lock: it stamps
//! each event's `previous_hash` with the digest of the event emitted before
//! it, then pushes the event into the stream channel. Consumers therefore
//! observe a finite, ordered, chained sequence ending in exactly one
//! terminal event.

use std::sync::Mutex;

use miette::Diagnostic;
use thiserror::Error;

use super::event::StateEvent;
use super::hashing::event_hash;

/// Emission failures.
#[derive(Debug, Error, Diagnostic)]
pub enum EmitError {
    /// Every receiver of the stream was dropped.
    #[error("event stream disconnected")]
    #[diagnostic(code(filament::events::disconnected))]
    Disconnected,

    /// The event could not be canonically serialized for hashing.
    #[error("event hashing failed: {source}")]
    #[diagnostic(code(filament::events::hashing))]
    Hashing {
        #[source]
        source: serde_json::Error,
    },
}

/// Sending half: chains and emits events in a single serialised step.
pub struct EventEmitter {
    tx: flume::Sender<StateEvent>,
    last_hash: Mutex<Option<String>>,
}

impl EventEmitter {
    #[must_use]
    pub fn new(tx: flume::Sender<StateEvent>) -> Self {
        Self {
            tx,
            last_hash: Mutex::new(None),
        }
    }

    /// Stamps the chain link onto `event` and emits it.
    ///
    /// Returns the emitted event (with `previous_hash` filled in) so callers
    /// can reuse the exact emitted form.
    pub fn emit(&self, mut event: StateEvent) -> Result<StateEvent, EmitError> {
        let mut last = self.last_hash.lock().expect("emitter lock poisoned");
        event.body_mut().previous_hash = last.clone();
        let hash = event_hash(&event).map_err(|source| EmitError::Hashing { source })?;
        self.tx
            .send(event.clone())
            .map_err(|_| EmitError::Disconnected)?;
        *last = Some(hash);
        Ok(event)
    }
}

/// Receiving half: the ordered stream of an execution's events.
///
/// Wraps a `flume` receiver; events can be consumed async (`recv`) or
/// drained synchronously after the run (`drain`).
pub struct EventStream {
    rx: flume::Receiver<StateEvent>,
}

impl EventStream {
    #[must_use]
    pub fn new(rx: flume::Receiver<StateEvent>) -> Self {
        Self { rx }
    }

    /// Receives the next event, or `None` once the stream is closed and
    /// drained.
    pub async fn recv(&self) -> Option<StateEvent> {
        self.rx.recv_async().await.ok()
    }

    /// Collects every remaining event, waiting until the stream closes.
    pub async fn collect(self) -> Vec<StateEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.recv_async().await {
            events.push(event);
        }
        events
    }

    /// Non-blocking drain of everything currently buffered.
    #[must_use]
    pub fn drain(&self) -> Vec<StateEvent> {
        self.rx.try_iter().collect()
    }

    #[must_use]
    pub fn into_inner(self) -> flume::Receiver<StateEvent> {
        self.rx
    }
}
