//! Live fan-out: one shared `live` subscription rebroadcast to every
//! connected viewer of a room.
//!
//! The registry is an arena of per-room viewer-queue sets with explicit
//! register/deregister. Dispatch routes each log payload by the envelope's
//! `room_id` and forwards the raw bytes verbatim; the log message is
//! acknowledged right after dispatch, because broadcast is best-effort per
//! viewer rather than a delivery guarantee the log retains.
//!
//! Backpressure: viewer queues are bounded. A viewer whose queue is full is
//! dropped so it can never stall the shared subscription or other viewers.

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::log::{EventLog, LIVE_GROUP, LogError, MSG_SENT_TOPIC};

/// Just enough of the envelope to route a payload to its room.
#[derive(Deserialize)]
struct RoomKey {
    room_id: String,
}

type ViewerQueues = Mutex<HashMap<u64, mpsc::Sender<Vec<u8>>>>;

/// Broadcast registry mapping room → connected viewer queues.
pub struct LiveFanout {
    capacity: usize,
    next_viewer_id: AtomicU64,
    rooms: Mutex<HashMap<String, Arc<ViewerQueues>>>,
}

impl LiveFanout {
    pub fn new(viewer_queue_capacity: usize) -> Self {
        Self {
            capacity: viewer_queue_capacity.max(1),
            next_viewer_id: AtomicU64::new(0),
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a viewer queue for a room. The registration deregisters
    /// itself on drop without affecting other viewers.
    pub fn register(self: &Arc<Self>, room_id: &str) -> ViewerRegistration {
        let id = self.next_viewer_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);

        let room = {
            let mut rooms = self.rooms.lock().expect("rooms registry poisoned");
            rooms.entry(room_id.to_string()).or_default().clone()
        };
        room.lock().expect("viewer set poisoned").insert(id, tx);
        debug!(room_id, viewer = id, "registered live viewer");

        ViewerRegistration {
            fanout: Arc::clone(self),
            room_id: room_id.to_string(),
            id,
            receiver: rx,
        }
    }

    fn deregister(&self, room_id: &str, viewer: u64) {
        let mut rooms = self.rooms.lock().expect("rooms registry poisoned");
        if let Some(room) = rooms.get(room_id) {
            let mut viewers = room.lock().expect("viewer set poisoned");
            viewers.remove(&viewer);
            let empty = viewers.is_empty();
            drop(viewers);
            if empty {
                rooms.remove(room_id);
            }
        }
        debug!(room_id, viewer, "deregistered live viewer");
    }

    /// Number of currently registered viewers for a room.
    pub fn viewer_count(&self, room_id: &str) -> usize {
        self.rooms
            .lock()
            .expect("rooms registry poisoned")
            .get(room_id)
            .map(|room| room.lock().expect("viewer set poisoned").len())
            .unwrap_or(0)
    }

    /// Pushes a payload to every registered queue of its room, dropping
    /// viewers whose queue is full or whose connection is gone.
    fn dispatch(&self, payload: &[u8]) {
        let Ok(key) = serde_json::from_slice::<RoomKey>(payload) else {
            debug!("payload without routable room id - skip");
            return;
        };

        let room = {
            let rooms = self.rooms.lock().expect("rooms registry poisoned");
            match rooms.get(&key.room_id) {
                Some(room) => room.clone(),
                None => return,
            }
        };

        let mut stalled = Vec::new();
        {
            let viewers = room.lock().expect("viewer set poisoned");
            for (id, queue) in viewers.iter() {
                match queue.try_send(payload.to_vec()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(room_id = %key.room_id, viewer = id, "viewer queue full - dropping viewer");
                        stalled.push(*id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => stalled.push(*id),
                }
            }
        }
        for id in stalled {
            self.deregister(&key.room_id, id);
        }
    }

    /// Consumes the shared `live` subscription until shutdown, dispatching
    /// every payload and acknowledging it.
    ///
    /// # Errors
    /// Returns [`LogError`] when the subscription cannot be established.
    pub async fn run(
        self: Arc<Self>,
        log: Arc<dyn EventLog>,
        shutdown: CancellationToken,
    ) -> Result<(), LogError> {
        let mut sub = log.subscribe(LIVE_GROUP, MSG_SENT_TOPIC).await?;
        info!(topic = MSG_SENT_TOPIC, group = LIVE_GROUP, "live fan-out running");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                msg = sub.recv() => {
                    let Some(msg) = msg else { break };
                    self.dispatch(msg.payload());
                    msg.ack();
                }
            }
        }
        info!("live fan-out stopped");
        Ok(())
    }
}

/// A live viewer's registered queue; deregisters itself on drop.
pub struct ViewerRegistration {
    fanout: Arc<LiveFanout>,
    room_id: String,
    id: u64,
    receiver: mpsc::Receiver<Vec<u8>>,
}

impl ViewerRegistration {
    /// Receives the next broadcast payload; `None` once the viewer has been
    /// dropped by the fan-out.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.receiver.recv().await
    }
}

impl Drop for ViewerRegistration {
    fn drop(&mut self) {
        self.fanout.deregister(&self.room_id, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn payload(room: &str, n: usize) -> Vec<u8> {
        format!(r#"{{"room_id":"{room}","msg":"m{n}"}}"#).into_bytes()
    }

    async fn recv(viewer: &mut ViewerRegistration) -> Vec<u8> {
        timeout(Duration::from_secs(1), viewer.recv())
            .await
            .expect("recv timed out")
            .expect("viewer dropped")
    }

    #[tokio::test]
    async fn all_viewers_observe_messages_in_the_same_order() {
        let fanout = Arc::new(LiveFanout::new(16));
        let mut viewers: Vec<_> = (0..3).map(|_| fanout.register("room")).collect();

        for n in 0..5 {
            fanout.dispatch(&payload("room", n));
        }

        for viewer in &mut viewers {
            for n in 0..5 {
                assert_eq!(recv(viewer).await, payload("room", n));
            }
        }
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let fanout = Arc::new(LiveFanout::new(16));
        let mut a = fanout.register("room-a");
        let _b = fanout.register("room-b");

        fanout.dispatch(&payload("room-a", 0));
        assert_eq!(recv(&mut a).await, payload("room-a", 0));
        assert_eq!(fanout.viewer_count("room-b"), 1);
    }

    #[tokio::test]
    async fn deregistration_leaves_other_viewers_untouched() {
        let fanout = Arc::new(LiveFanout::new(16));
        let mut stays = fanout.register("room");
        let leaves = fanout.register("room");
        assert_eq!(fanout.viewer_count("room"), 2);

        drop(leaves);
        assert_eq!(fanout.viewer_count("room"), 1);

        fanout.dispatch(&payload("room", 0));
        assert_eq!(recv(&mut stays).await, payload("room", 0));
    }

    #[tokio::test]
    async fn slow_viewer_is_dropped_not_awaited() {
        let fanout = Arc::new(LiveFanout::new(1));
        let mut slow = fanout.register("room");
        let mut healthy = fanout.register("room");

        fanout.dispatch(&payload("room", 0));
        // The healthy viewer keeps up; the slow one leaves its queue full.
        assert_eq!(recv(&mut healthy).await, payload("room", 0));
        fanout.dispatch(&payload("room", 1));

        assert_eq!(fanout.viewer_count("room"), 1);
        assert_eq!(recv(&mut healthy).await, payload("room", 1));

        // The slow viewer drains its backlog and then sees its queue closed.
        assert_eq!(recv(&mut slow).await, payload("room", 0));
        assert!(slow.recv().await.is_none());
    }

    #[tokio::test]
    async fn unroutable_payload_is_skipped() {
        let fanout = Arc::new(LiveFanout::new(16));
        let mut viewer = fanout.register("room");
        fanout.dispatch(b"not json");
        fanout.dispatch(&payload("room", 0));
        assert_eq!(recv(&mut viewer).await, payload("room", 0));
    }

    #[tokio::test]
    async fn run_dispatches_from_log_and_acks() {
        use crate::log::memory::MemoryEventLog;

        let log = Arc::new(MemoryEventLog::new());
        let fanout = Arc::new(LiveFanout::new(16));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(
            fanout
                .clone()
                .run(log.clone() as Arc<dyn EventLog>, shutdown.clone()),
        );

        // Give the pump a moment to subscribe before registering + publishing.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut viewer = fanout.register("room");
        log.publish(MSG_SENT_TOPIC, payload("room", 0)).await.unwrap();
        assert_eq!(recv(&mut viewer).await, payload("room", 0));

        shutdown.cancel();
        timeout(Duration::from_secs(1), task)
            .await
            .expect("shutdown timed out")
            .expect("task panicked")
            .expect("fanout failed");
    }
}
