use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Per-channel buffer. Subscribers that fall further behind than this see
/// a lag error and must resubscribe; producers never block.
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    pub channel: String,
    pub event: String,
    pub payload: serde_json::Value,
    /// FIFO position within the channel; nothing is ordered across channels
    pub seq: u64,
}

struct Channel {
    sender: broadcast::Sender<BusEvent>,
    seq: AtomicU64,
}

/// The real-time broadcast fabric. Cloning is cheap; every service holds
/// one and emits its post-state after each write.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<Mutex<HashMap<String, Arc<Channel>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn channel(&self, name: &str) -> Arc<Channel> {
        let mut channels = self.channels.lock().expect("bus lock poisoned");
        channels
            .entry(name.to_string())
            .or_insert_with(|| {
                let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
                Arc::new(Channel {
                    sender,
                    seq: AtomicU64::new(0),
                })
            })
            .clone()
    }

    /// Emit an event. Lock-free on the hot path apart from the channel-map
    /// lookup; a channel with no subscribers drops the event silently.
    pub fn emit(&self, channel: &str, event: &str, payload: serde_json::Value) {
        let chan = self.channel(channel);
        let seq = chan.seq.fetch_add(1, Ordering::AcqRel);
        let _ = chan.sender.send(BusEvent {
            channel: channel.to_string(),
            event: event.to_string(),
            payload,
            seq,
        });
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<BusEvent> {
        self.channel(channel).sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_per_channel() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("sessions:a");
        for i in 0..5 {
            bus.emit("sessions:a", "task.patch", serde_json::json!({ "i": i }));
        }
        for i in 0..5 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.seq, i);
            assert_eq!(event.payload["i"], i);
        }
    }

    #[tokio::test]
    async fn test_no_subscriber_does_not_block() {
        let bus = EventBus::new();
        // No receiver exists; emit must not error or block
        bus.emit("sessions:b", "session.patch", serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let bus = EventBus::new();
        let mut rx_a = bus.subscribe("messages:a");
        bus.emit("messages:b", "message.create", serde_json::json!({}));
        bus.emit("messages:a", "message.create", serde_json::json!({"mine": true}));
        let event = rx_a.recv().await.unwrap();
        assert_eq!(event.payload["mine"], true);
    }
}
