//! C2: per-topic bounded FIFO queue map.
//!
//! Grounded on `examples/original_source/main.py`'s `queues = {topic:
//! Queue(maxsize=cordon)}` dict-of-queues. Built on `Mutex<VecDeque>` plus
//! two `Notify`s rather than `tokio::sync::mpsc` — the drop-oldest
//! backpressure policy needs the producer to clear the queue outright,
//! which a channel's bounded `send` can't do.

use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// Spec §5: the switch a deployment picks between loss-tolerant and
/// loss-intolerant ingestion. Default is Drop-oldest with `cordon = 5000`.
/// `cache.backpressure = "drop-oldest" | "block"` selects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressurePolicy {
    DropOldest,
    Block,
}

impl Default for BackpressurePolicy {
    fn default() -> Self {
        BackpressurePolicy::DropOldest
    }
}

pub struct TopicQueue {
    items: Mutex<VecDeque<Vec<u8>>>,
    item_available: Notify,
    space_available: Notify,
    cordon: usize,
    policy: BackpressurePolicy,
}

impl TopicQueue {
    fn new(cordon: usize, policy: BackpressurePolicy) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            item_available: Notify::new(),
            space_available: Notify::new(),
            cordon,
            policy,
        }
    }

    /// Enqueue one payload. Under `DropOldest`, a full queue is cleared and
    /// the new payload becomes the sole element (spec §5, §8 scenario 5).
    /// Under `Block`, the caller waits for a consumer to make room.
    pub async fn put(&self, topic: &str, payload: Vec<u8>) {
        loop {
            let mut items = self.items.lock().await;
            if items.len() < self.cordon {
                items.push_back(payload);
                drop(items);
                self.item_available.notify_one();
                return;
            }

            match self.policy {
                BackpressurePolicy::DropOldest => {
                    tracing::error!(
                        event = "queue.cordon.dropped",
                        topic,
                        cordon = self.cordon,
                        "queue at cordon, clearing"
                    );
                    items.clear();
                    items.push_back(payload);
                    drop(items);
                    self.item_available.notify_one();
                    return;
                }
                BackpressurePolicy::Block => {
                    drop(items);
                    self.space_available.notified().await;
                }
            }
        }
    }

    /// Dequeue one payload, blocking until one arrives. Returns the payload
    /// and the queue's size immediately after the pop, for the drain loop's
    /// `qsize` log line (spec §4.5).
    pub async fn get(&self) -> (Vec<u8>, usize) {
        loop {
            let mut items = self.items.lock().await;
            if let Some(payload) = items.pop_front() {
                let size = items.len();
                drop(items);
                self.space_available.notify_one();
                return (payload, size);
            }
            drop(items);
            self.item_available.notified().await;
        }
    }
}

/// Constructed once at startup from the configured topic list and
/// read-only thereafter (spec §5's shared-resource note).
pub struct TopicQueueMap {
    queues: HashMap<String, Arc<TopicQueue>>,
}

impl TopicQueueMap {
    pub fn new(topics: &[String], cordon: usize, policy: BackpressurePolicy) -> Self {
        let queues = topics
            .iter()
            .map(|topic| (topic.clone(), Arc::new(TopicQueue::new(cordon, policy))))
            .collect();
        Self { queues }
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.queues.keys().map(String::as_str)
    }

    pub fn queue(&self, topic: &str) -> Option<Arc<TopicQueue>> {
        self.queues.get(topic).cloned()
    }

    /// Hand an inbound payload to its topic's queue. A topic the broker
    /// delivered but that isn't configured here is dropped with an error,
    /// never fatal (spec §4.1).
    pub async fn dispatch(&self, topic: &str, payload: Vec<u8>) {
        match self.queues.get(topic) {
            Some(queue) => queue.put(topic, payload).await,
            None => {
                tracing::error!(event = "queue.topic.unconfigured", topic, "dropping payload for unconfigured topic");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn topic_set_matches_configuration() {
        let topics = vec!["a".to_string(), "b".to_string()];
        let map = TopicQueueMap::new(&topics, 10, BackpressurePolicy::DropOldest);
        let mut seen: Vec<&str> = map.topics().collect();
        seen.sort();
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn unconfigured_topic_is_dropped_not_fatal() {
        let topics = vec!["a".to_string()];
        let map = TopicQueueMap::new(&topics, 10, BackpressurePolicy::DropOldest);
        map.dispatch("unknown", b"x".to_vec()).await;
        assert!(map.queue("unknown").is_none());
    }

    #[tokio::test]
    async fn drop_oldest_clears_queue_at_cordon() {
        let queue = TopicQueue::new(3, BackpressurePolicy::DropOldest);
        queue.put("t", b"1".to_vec()).await;
        queue.put("t", b"2".to_vec()).await;
        queue.put("t", b"3".to_vec()).await;
        queue.put("t", b"4".to_vec()).await;

        let (payload, size) = queue.get().await;
        assert_eq!(payload, b"4".to_vec());
        assert_eq!(size, 0);
    }

    #[tokio::test]
    async fn fifo_order_preserved_under_single_consumer() {
        let queue = TopicQueue::new(10, BackpressurePolicy::DropOldest);
        queue.put("t", b"1".to_vec()).await;
        queue.put("t", b"2".to_vec()).await;

        let (first, _) = queue.get().await;
        let (second, _) = queue.get().await;
        assert_eq!(first, b"1".to_vec());
        assert_eq!(second, b"2".to_vec());
    }
}
