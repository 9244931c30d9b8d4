//! In-process implementation of the durable-log contract.
//!
//! Each `(topic, group)` pair owns an independent queue, so consumer groups
//! replay the topic at their own pace. Negative acknowledgment (dropping a
//! [`LogMessage`] unacked) pushes the payload back to the front of its
//! group's queue, preserving redelivery order.
//!
//! State lives in this process only; a durable backend plugs in behind the
//! same [`EventLog`] trait.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::{AckToken, EventLog, LogError, LogMessage, LogStream, Subscription};

#[derive(Default)]
struct GroupQueue {
    queue: Mutex<VecDeque<Arc<[u8]>>>,
    notify: Notify,
    closed: AtomicBool,
}

impl GroupQueue {
    fn push_back(&self, payload: Arc<[u8]>) {
        self.queue.lock().expect("group queue poisoned").push_back(payload);
        self.notify.notify_one();
    }

    fn push_front(&self, payload: Arc<[u8]>) {
        self.queue.lock().expect("group queue poisoned").push_front(payload);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Arc<[u8]>> {
        self.queue.lock().expect("group queue poisoned").pop_front()
    }
}

/// In-process durable log with independent consumer-group queues.
#[derive(Default)]
pub struct MemoryEventLog {
    topics: Mutex<HashMap<String, HashMap<String, Arc<GroupQueue>>>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes every group queue; pending messages stay deliverable, after
    /// which streams end.
    pub fn close(&self) {
        let topics = self.topics.lock().expect("topics poisoned");
        for groups in topics.values() {
            for group in groups.values() {
                group.closed.store(true, Ordering::SeqCst);
                group.notify.notify_waiters();
                group.notify.notify_one();
            }
        }
    }

    fn group(&self, topic: &str, group: &str) -> Arc<GroupQueue> {
        let mut topics = self.topics.lock().expect("topics poisoned");
        topics
            .entry(topic.to_string())
            .or_default()
            .entry(group.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), LogError> {
        let payload: Arc<[u8]> = payload.into();
        let groups: Vec<Arc<GroupQueue>> = {
            let topics = self.topics.lock().expect("topics poisoned");
            topics
                .get(topic)
                .map(|groups| groups.values().cloned().collect())
                .unwrap_or_default()
        };
        // A topic nobody has subscribed to yet has no group positions to
        // advance; the publish still succeeds.
        for group in groups {
            group.push_back(payload.clone());
        }
        Ok(())
    }

    async fn subscribe(&self, group: &str, topic: &str) -> Result<Subscription, LogError> {
        Ok(Box::new(MemoryLogStream {
            group: self.group(topic, group),
        }))
    }
}

struct MemoryLogStream {
    group: Arc<GroupQueue>,
}

#[async_trait]
impl LogStream for MemoryLogStream {
    async fn recv(&mut self) -> Option<LogMessage> {
        loop {
            if let Some(payload) = self.group.pop() {
                let token = MemoryAckToken {
                    group: self.group.clone(),
                    payload: Some(payload.clone()),
                };
                return Some(LogMessage::new(payload.to_vec(), Box::new(token)));
            }
            if self.group.closed.load(Ordering::SeqCst) {
                return None;
            }
            self.group.notify.notified().await;
        }
    }
}

struct MemoryAckToken {
    group: Arc<GroupQueue>,
    payload: Option<Arc<[u8]>>,
}

impl AckToken for MemoryAckToken {
    fn ack(&mut self) {
        self.payload = None;
    }

    fn nack(&mut self) {
        if let Some(payload) = self.payload.take() {
            self.group.push_front(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn recv(sub: &mut Subscription) -> LogMessage {
        timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("recv timed out")
            .expect("stream ended")
    }

    #[tokio::test]
    async fn groups_read_the_same_topic_independently() {
        let log = MemoryEventLog::new();
        let mut live = log.subscribe("live", "t").await.unwrap();
        let mut history = log.subscribe("history", "t").await.unwrap();

        log.publish("t", b"one".to_vec()).await.unwrap();
        log.publish("t", b"two".to_vec()).await.unwrap();

        let a = recv(&mut live).await;
        assert_eq!(a.payload(), b"one");
        a.ack();
        // The history group's position is unaffected by live's ack.
        let b = recv(&mut history).await;
        assert_eq!(b.payload(), b"one");
        b.ack();
        recv(&mut live).await.ack();
        recv(&mut history).await.ack();
    }

    #[tokio::test]
    async fn dropping_unacked_message_redelivers_in_order() {
        let log = MemoryEventLog::new();
        let mut sub = log.subscribe("history", "t").await.unwrap();
        log.publish("t", b"first".to_vec()).await.unwrap();
        log.publish("t", b"second".to_vec()).await.unwrap();

        let msg = recv(&mut sub).await;
        assert_eq!(msg.payload(), b"first");
        drop(msg); // nack

        let again = recv(&mut sub).await;
        assert_eq!(again.payload(), b"first");
        again.ack();
        let next = recv(&mut sub).await;
        assert_eq!(next.payload(), b"second");
        next.ack();
    }

    #[tokio::test]
    async fn acked_message_is_not_redelivered() {
        let log = MemoryEventLog::new();
        let mut sub = log.subscribe("g", "t").await.unwrap();
        log.publish("t", b"only".to_vec()).await.unwrap();
        recv(&mut sub).await.ack();

        log.publish("t", b"after".to_vec()).await.unwrap();
        let next = recv(&mut sub).await;
        assert_eq!(next.payload(), b"after");
        next.ack();
    }

    #[tokio::test]
    async fn close_ends_streams_after_draining() {
        let log = MemoryEventLog::new();
        let mut sub = log.subscribe("g", "t").await.unwrap();
        log.publish("t", b"tail".to_vec()).await.unwrap();
        log.close();

        recv(&mut sub).await.ack();
        assert!(
            timeout(Duration::from_secs(1), sub.recv())
                .await
                .expect("recv timed out")
                .is_none()
        );
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let log = MemoryEventLog::new();
        log.publish("t", b"dropped".to_vec()).await.unwrap();
        // A group created afterwards starts at the current end.
        let mut sub = log.subscribe("g", "t").await.unwrap();
        log.publish("t", b"seen".to_vec()).await.unwrap();
        let msg = recv(&mut sub).await;
        assert_eq!(msg.payload(), b"seen");
        msg.ack();
    }
}
