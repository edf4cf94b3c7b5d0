//! Container status notifications.

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use project_store::ContainerStatus;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Sink for container status changes
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    /// Announce a status change; delivery is best-effort
    async fn publish(&self, status: &ContainerStatus);
}

/// In-process fan-out of status changes to any number of subscribers
#[derive(Default)]
pub struct ChannelPublisher {
    subscribers: Mutex<Vec<Sender<ContainerStatus>>>,
}

impl ChannelPublisher {
    /// Create a publisher without subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every status published from now on
    pub fn subscribe(&self) -> Receiver<ContainerStatus> {
        let (tx, rx) = async_channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

#[async_trait]
impl StatusPublisher for ChannelPublisher {
    async fn publish(&self, status: &ContainerStatus) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Unbounded channels only fail once the receiver is gone
        subscribers.retain(|tx| tx.try_send(status.clone()).is_ok());
        debug!(
            "Published status of {}/{} to {} subscriber(s)",
            status.project_id,
            status.environment,
            subscribers.len()
        );
    }
}
