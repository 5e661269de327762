//! Server lifecycle notifications and the sinks that receive them.

use tokio::sync::broadcast;
use tracing::info;

/// A server lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLifecycleEvent {
    /// The server is bound and accepting calls.
    Started {
        /// The configured listen address.
        address: String,
        /// The port actually bound.
        port: u16,
    },
    /// `stop()` began; in-flight calls are draining.
    ShutdownInitiated,
    /// The server has fully terminated.
    Terminated,
}

/// Receives lifecycle events. Delivery is fire-and-forget.
pub trait LifecycleEventSink: Send + Sync {
    fn publish(&self, event: ServerLifecycleEvent);
}

impl<F> LifecycleEventSink for F
where
    F: Fn(ServerLifecycleEvent) + Send + Sync,
{
    fn publish(&self, event: ServerLifecycleEvent) {
        self(event);
    }
}

/// Fans events out to any number of `tokio::sync::broadcast` subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<ServerLifecycleEvent>,
}

impl BroadcastEventSink {
    /// Creates a bus that buffers up to `capacity` events per lagging subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ServerLifecycleEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(16)
    }
}

impl LifecycleEventSink for BroadcastEventSink {
    fn publish(&self, event: ServerLifecycleEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

/// Logs each event at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink;

impl LifecycleEventSink for LoggingEventSink {
    fn publish(&self, event: ServerLifecycleEvent) {
        match event {
            ServerLifecycleEvent::Started { address, port } => {
                info!(%address, port, "server started");
            }
            ServerLifecycleEvent::ShutdownInitiated => info!("server shutdown initiated"),
            ServerLifecycleEvent::Terminated => info!("server terminated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[tokio::test]
    async fn broadcast_delivers_in_order() {
        let sink = BroadcastEventSink::default();
        let mut rx = sink.subscribe();

        sink.publish(ServerLifecycleEvent::ShutdownInitiated);
        sink.publish(ServerLifecycleEvent::Terminated);

        assert_eq!(rx.recv().await.unwrap(), ServerLifecycleEvent::ShutdownInitiated);
        assert_eq!(rx.recv().await.unwrap(), ServerLifecycleEvent::Terminated);
    }

    #[test]
    fn broadcast_without_subscribers_is_silent() {
        BroadcastEventSink::new(0).publish(ServerLifecycleEvent::Terminated);
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let sink = move |event: ServerLifecycleEvent| recorder.lock().push(event);

        sink.publish(ServerLifecycleEvent::Started {
            address: "*:0".to_string(),
            port: 4242,
        });
        assert_eq!(seen.lock().len(), 1);
    }
}
