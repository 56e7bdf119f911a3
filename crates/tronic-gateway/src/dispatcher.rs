use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::warn;
use uuid::Uuid;

use tronic_types::events::GatewayEvent;

/// Manages live connections and their room memberships, and fans events out.
///
/// Rooms are plain identifier strings; membership is transient and exists
/// only here. A room with no members is indistinguishable from a room that
/// never existed.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Per-connection send channels: conn_id -> sender
    connections: RwLock<HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>>,

    /// Room membership: room_id -> set of conn_ids
    rooms: RwLock<HashMap<String, HashSet<Uuid>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                connections: RwLock::new(HashMap::new()),
                rooms: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a new connection. Returns (conn_id, receiver).
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Drop a connection and remove it from every room it joined.
    pub async fn unregister(&self, conn_id: Uuid) {
        self.inner.connections.write().await.remove(&conn_id);

        let mut rooms = self.inner.rooms.write().await;
        rooms.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    /// Join a room. Joining an empty room is legal; joining twice is a no-op.
    pub async fn join(&self, conn_id: Uuid, room_id: &str) {
        self.inner
            .rooms
            .write()
            .await
            .entry(room_id.to_string())
            .or_default()
            .insert(conn_id);
    }

    /// Leave a room. Leaving a room that was never joined is a no-op.
    pub async fn leave(&self, conn_id: Uuid, room_id: &str) {
        let mut rooms = self.inner.rooms.write().await;
        if let Some(members) = rooms.get_mut(room_id) {
            members.remove(&conn_id);
            if members.is_empty() {
                rooms.remove(room_id);
            }
        }
    }

    /// Deliver an event to every connection currently joined to `room_id`,
    /// and only those connections.
    pub async fn publish(&self, room_id: &str, event: GatewayEvent) {
        let rooms = self.inner.rooms.read().await;
        let Some(members) = rooms.get(room_id) else {
            return;
        };

        let connections = self.inner.connections.read().await;
        for conn_id in members {
            if let Some(tx) = connections.get(conn_id) {
                if tx.send(event.clone()).is_err() {
                    warn!("Dropping event for dead connection {}", conn_id);
                }
            }
        }
    }

    /// Deliver an event to every registered connection.
    pub async fn broadcast(&self, event: GatewayEvent) {
        let connections = self.inner.connections.read().await;
        for tx in connections.values() {
            let _ = tx.send(event.clone());
        }
    }

    /// Deliver an event to every registered connection except `exclude`.
    /// Used for presence announcements, which the announcer already knows.
    pub async fn broadcast_except(&self, exclude: Uuid, event: GatewayEvent) {
        let connections = self.inner.connections.read().await;
        for (conn_id, tx) in connections.iter() {
            if *conn_id != exclude {
                let _ = tx.send(event.clone());
            }
        }
    }

    pub async fn member_count(&self, room_id: &str) -> usize {
        self.inner
            .rooms
            .read()
            .await
            .get(room_id)
            .map_or(0, |members| members.len())
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_event(status: &str) -> GatewayEvent {
        GatewayEvent::UserStatusChange {
            user_id: Uuid::new_v4(),
            status: status.into(),
        }
    }

    #[tokio::test]
    async fn publish_reaches_only_room_members() {
        let dispatcher = Dispatcher::new();
        let (a, mut rx_a) = dispatcher.register().await;
        let (b, mut rx_b) = dispatcher.register().await;
        let (_c, mut rx_c) = dispatcher.register().await;

        dispatcher.join(a, "general").await;
        dispatcher.join(b, "general").await;
        // c joins a different room
        dispatcher.join(_c, "random").await;

        dispatcher.publish("general", status_event("hello")).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_to_empty_room_is_a_noop() {
        let dispatcher = Dispatcher::new();
        let (_a, mut rx_a) = dispatcher.register().await;
        dispatcher.publish("nobody-here", status_event("x")).await;
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_and_double_leave_are_safe() {
        let dispatcher = Dispatcher::new();
        let (a, mut rx_a) = dispatcher.register().await;

        dispatcher.join(a, "general").await;
        dispatcher.leave(a, "general").await;
        dispatcher.leave(a, "general").await;
        dispatcher.leave(a, "never-joined").await;

        dispatcher.publish("general", status_event("x")).await;
        assert!(rx_a.try_recv().is_err());
        assert_eq!(dispatcher.member_count("general").await, 0);
    }

    #[tokio::test]
    async fn unregister_removes_connection_from_all_rooms() {
        let dispatcher = Dispatcher::new();
        let (a, _rx_a) = dispatcher.register().await;
        let (b, mut rx_b) = dispatcher.register().await;

        dispatcher.join(a, "general").await;
        dispatcher.join(a, "random").await;
        dispatcher.join(b, "general").await;

        dispatcher.unregister(a).await;
        assert_eq!(dispatcher.member_count("general").await, 1);
        assert_eq!(dispatcher.member_count("random").await, 0);
        assert_eq!(dispatcher.connection_count().await, 1);

        // b still receives room traffic
        dispatcher.publish("general", status_event("x")).await;
        assert!(rx_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn room_delivery_preserves_publish_order() {
        let dispatcher = Dispatcher::new();
        let (a, mut rx_a) = dispatcher.register().await;
        dispatcher.join(a, "general").await;

        for status in ["one", "two", "three"] {
            dispatcher.publish("general", status_event(status)).await;
        }

        for expected in ["one", "two", "three"] {
            match rx_a.try_recv().unwrap() {
                GatewayEvent::UserStatusChange { status, .. } => assert_eq!(status, expected),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn broadcast_except_skips_the_announcer() {
        let dispatcher = Dispatcher::new();
        let (a, mut rx_a) = dispatcher.register().await;
        let (_b, mut rx_b) = dispatcher.register().await;

        dispatcher.broadcast_except(a, status_event("online")).await;
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }
}
