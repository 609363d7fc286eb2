use crate::{Key, ReplenishError};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

/// Receives the outcome of every replenishment step.
///
/// Callbacks run inline on the replenisher's task and must not block. Any
/// closure `Fn(ReplenishError)` is an observer that ignores successes.
pub trait ReplenishObserver: Send + Sync {
    fn on_created(&self, _key: &Key) {}

    fn on_error(&self, error: ReplenishError);
}

impl<F> ReplenishObserver for F
where
    F: Fn(ReplenishError) + Send + Sync,
{
    fn on_error(&self, error: ReplenishError) {
        self(error);
    }
}

/// Logs every step through `tracing`.
///
/// Collisions are logged at `debug`, all other failures at `warn`.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

#[cfg(feature = "tracing")]
impl ReplenishObserver for TracingObserver {
    fn on_created(&self, key: &Key) {
        tracing::trace!(%key, "Key added to pool");
    }

    fn on_error(&self, error: ReplenishError) {
        if error.is_collision() {
            tracing::debug!(%error, "Generated key already available");
        } else {
            tracing::warn!(%error, "Replenishment step failed");
        }
    }
}

/// One replenishment outcome, as seen by an [`EventDrain`].
#[derive(Clone, Debug)]
pub enum ReplenishEvent {
    Created(Key),
    Failed(Arc<ReplenishError>),
    /// The drain fell behind and this many of the oldest events were
    /// discarded.
    Dropped(u64),
}

/// A bounded observer that hands events to a separate consumer.
///
/// The queue never blocks the replenisher. Once `capacity` events are
/// pending, each new event evicts the oldest one, and the drain learns how
/// many were lost through [`ReplenishEvent::Dropped`].
///
/// ```
/// use keygen::{EventQueue, Key, ReplenishEvent, ReplenishObserver};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (queue, mut drain) = EventQueue::new(16);
/// let key = Key::parse(b"abc123").unwrap();
/// queue.on_created(&key);
/// drop(queue);
///
/// assert!(matches!(drain.recv().await, Some(ReplenishEvent::Created(k)) if k == key));
/// assert!(drain.recv().await.is_none());
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct EventQueue {
    tx: broadcast::Sender<ReplenishEvent>,
}

/// The consuming end of an [`EventQueue`].
#[derive(Debug)]
pub struct EventDrain {
    rx: broadcast::Receiver<ReplenishEvent>,
}

impl EventQueue {
    /// Creates a queue holding at most `capacity` pending events (at least
    /// one).
    pub fn new(capacity: usize) -> (Self, EventDrain) {
        let (tx, rx) = broadcast::channel(capacity.max(1));
        (Self { tx }, EventDrain { rx })
    }

    fn push(&self, event: ReplenishEvent) {
        // Only fails once the drain is gone, in which case nobody is
        // listening.
        let _ = self.tx.send(event);
    }
}

impl ReplenishObserver for EventQueue {
    fn on_created(&self, key: &Key) {
        self.push(ReplenishEvent::Created(*key));
    }

    fn on_error(&self, error: ReplenishError) {
        self.push(ReplenishEvent::Failed(Arc::new(error)));
    }
}

impl EventDrain {
    /// Waits for the next event. Returns `None` once every [`EventQueue`]
    /// handle has been dropped and all pending events were received.
    pub async fn recv(&mut self) -> Option<ReplenishEvent> {
        match self.rx.recv().await {
            Ok(event) => Some(event),
            Err(RecvError::Lagged(n)) => Some(ReplenishEvent::Dropped(n)),
            Err(RecvError::Closed) => None,
        }
    }
}
