//! # Devtools Event Surface
//!
//! When a store is built with `devtools(true)` it publishes a
//! [`StoreEvent`] for every externally visible state change on a broadcast
//! channel. External tooling (inspectors, time-travel recorders) consumes
//! the stream; the store itself implements none of that tooling.
//!
//! Slow consumers lag rather than block the store; lagged events are
//! dropped for that consumer only.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

/// Maximum events buffered per consumer before lagging.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Externally visible store happenings.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A mutation ran to completion.
    MutationCommitted {
        #[serde(rename = "type")]
        kind: String,
        payload: Option<Value>,
    },
    /// An action dispatch completed successfully.
    ActionDispatched {
        #[serde(rename = "type")]
        kind: String,
        handlers: usize,
    },
    /// A module was dynamically registered.
    ModuleRegistered { path: String },
    /// A module was dynamically unregistered.
    ModuleUnregistered { path: String },
    /// The root state was replaced wholesale (hydration/time travel).
    StateReplaced,
}

/// A consumer handle for the devtools event channel.
pub struct EventStream {
    receiver: broadcast::Receiver<StoreEvent>,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<StoreEvent>) -> Self {
        Self { receiver }
    }

    /// Receive the next event.
    ///
    /// Returns `None` once the store (the sending side) is gone. A lagged
    /// consumer skips the dropped events and keeps receiving.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Devtools consumer lagged, events dropped");
                }
            }
        }
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            }
        }
    }

    /// Adapt into a [`tokio_stream::Stream`] for combinator use.
    #[must_use]
    pub fn into_stream(self) -> BroadcastStream<StoreEvent> {
        BroadcastStream::new(self.receiver)
    }
}
