//! Broadcaster: the single fan-out sink shared by every component that
//! notifies observers. Constructed once at startup and cloned by handle.

use crate::protocol::StreamEvent;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct Broadcaster {
    tx: broadcast::Sender<StreamEvent>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Push an event to all current observers. Returns how many received it;
    /// zero observers is not an error.
    pub fn publish(&self, event: StreamEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(n) => {
                debug!("Broadcast {} to {} observers", name, n);
                n
            }
            Err(_) => {
                debug!("Broadcast {} with no observers", name);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(1024)
    }
}
