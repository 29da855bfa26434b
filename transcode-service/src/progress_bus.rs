//! Progress Bus: routes per-client progress events to a push channel keyed
//! by opaque client id. Delivery is best-effort; events to a disconnected
//! client are dropped.

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::models::ProgressEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Safe under many concurrent emitters: registration only touches the
/// `DashMap` shard for its own key, and sending never blocks on a slow
/// receiver (broadcast drops the oldest buffered event instead).
pub struct ProgressBus {
    channels: DashMap<String, broadcast::Sender<ProgressEvent>>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribes to a client's channel, creating it if this is the first subscriber.
    pub fn subscribe(&self, client_id: &str) -> broadcast::Receiver<ProgressEvent> {
        self.channels
            .entry(client_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Best-effort emit; silently drops the event if nobody is listening.
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = self.channels.get(&event.client_id) {
            let _ = sender.send(event);
        }
    }

    /// Drops the channel once no subscribers remain, so disconnected clients
    /// don't leak entries forever.
    pub fn sweep(&self, client_id: &str) {
        if let Some(sender) = self.channels.get(client_id) {
            if sender.receiver_count() == 0 {
                drop(sender);
                self.channels.remove(client_id);
            }
        }
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProgressContent;

    #[test]
    fn drops_events_for_unknown_client() {
        let bus = ProgressBus::new();
        bus.emit(ProgressEvent {
            client_id: "ghost".to_string(),
            progress: 50,
            content: ProgressContent::Upload,
        });
        // no panic, no subscriber: nothing to assert beyond "didn't blow up"
    }

    #[tokio::test]
    async fn delivers_to_subscriber() {
        let bus = ProgressBus::new();
        let mut rx = bus.subscribe("c1");

        bus.emit(ProgressEvent {
            client_id: "c1".to_string(),
            progress: 42,
            content: ProgressContent::Transcode { resolution: None },
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.progress, 42);
    }
}
