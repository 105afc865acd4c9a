use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use ember_types::events::GatewayEvent;

/// Manages all connected clients: a broadcast channel for global events
/// (presence) and per-user targeted channels for match and message events.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel — all connected clients receive these events
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Per-user targeted send channels: user_id -> (conn_id, sender)
    user_channels: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                user_channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to broadcast events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a per-user targeted channel. Returns (conn_id, receiver).
    /// A newer connection for the same user takes the channel over.
    pub async fn register_user_channel(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .insert(user_id, (conn_id, tx));
        (conn_id, rx)
    }

    /// Release a user's channel at teardown, but only if `conn_id` still owns
    /// it. Returns true if this connection owned the channel — the caller
    /// must then run the disconnect hook; a stale teardown must not.
    pub async fn release_user_channel(&self, user_id: Uuid, conn_id: Uuid) -> bool {
        let mut channels = self.inner.user_channels.write().await;
        match channels.get(&user_id) {
            Some((stored_conn_id, _)) if *stored_conn_id == conn_id => {
                channels.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    /// Send a targeted event to a specific user. Dropped if not connected.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        let channels = self.inner.user_channels.read().await;
        if let Some((_, tx)) = channels.get(&user_id) {
            let _ = tx.send(event);
        }
    }

    /// Send a targeted event to every listed user.
    pub async fn send_to_users(&self, user_ids: &[Uuid], event: GatewayEvent) {
        let channels = self.inner.user_channels.read().await;
        for user_id in user_ids {
            if let Some((_, tx)) = channels.get(user_id) {
                let _ = tx.send(event.clone());
            }
        }
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
    use ember_types::models::PresenceStatus;

    fn presence_event(user_id: Uuid) -> GatewayEvent {
        GatewayEvent::PresenceUpdate {
            user_id,
            nickname: "ana".to_string(),
            status: PresenceStatus::Online,
        }
    }

    #[tokio::test]
    async fn targeted_send_reaches_only_the_target() {
        let dispatcher = Dispatcher::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (_, mut rx_a) = dispatcher.register_user_channel(a).await;
        let (_, mut rx_b) = dispatcher.register_user_channel(b).await;

        dispatcher.send_to_user(a, presence_event(a)).await;

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn newer_connection_takes_over_the_channel() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (old_conn, _rx_old) = dispatcher.register_user_channel(user).await;
        let (new_conn, mut rx_new) = dispatcher.register_user_channel(user).await;

        // The stale teardown must not release the newer channel.
        assert!(!dispatcher.release_user_channel(user, old_conn).await);
        dispatcher.send_to_user(user, presence_event(user)).await;
        assert!(rx_new.try_recv().is_ok());

        assert!(dispatcher.release_user_channel(user, new_conn).await);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers() {
        let dispatcher = Dispatcher::new();
        let mut rx1 = dispatcher.subscribe();
        let mut rx2 = dispatcher.subscribe();

        dispatcher.broadcast(presence_event(Uuid::new_v4()));

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }
}
