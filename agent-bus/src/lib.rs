//! The host event bus is deliberately out of scope of this specification —
//! it is consumed only at its publish/subscribe interface. This crate
//! supplies a minimal concrete implementation (best-effort in-process
//! fan-out, no cross-publisher ordering guarantee) so the scheduler and
//! executor components can be wired together and exercised end to end.

use agent_model::Event;
use tokio::sync::broadcast;

/// Default channel capacity: generous enough that a slow subscriber does
/// not cause publishers to block under normal load. A subscriber that
/// falls behind past this sees `RecvError::Lagged` and skips forward,
/// matching the "best-effort" delivery guarantee in the bus contract.
const DEFAULT_CAPACITY: usize = 1024;

pub trait EventBus: Send + Sync {
    fn publish(&self, event: Event);
    fn subscribe(&self) -> EventReceiver;
}

#[derive(Clone)]
pub struct InProcessBus {
    sender: broadcast::Sender<Event>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for InProcessBus {
    fn publish(&self, event: Event) {
        // No subscribers is a normal state (e.g. during startup); a send
        // error here only means nobody is listening right now.
        let _ = self.sender.send(event);
    }

    fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            inner: self.sender.subscribe(),
        }
    }
}

/// Thin wrapper over `broadcast::Receiver` so callers depend on this
/// crate's type rather than on `tokio::sync::broadcast` directly.
pub struct EventReceiver {
    inner: broadcast::Receiver<Event>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecvError {
    #[error("bus closed")]
    Closed,
    #[error("receiver lagged, {0} events skipped")]
    Lagged(u64),
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<Event, RecvError> {
        loop {
            match self.inner.recv().await {
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Closed) => return Err(RecvError::Closed),
                Err(broadcast::error::RecvError::Lagged(n)) => return Err(RecvError::Lagged(n)),
            }
        }
    }
}
