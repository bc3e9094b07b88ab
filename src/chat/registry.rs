use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Message as WsMessage;
use tokio::sync::mpsc::UnboundedSender;

/// Live socket lookup. A user may hold several connections (two devices,
/// a reconnect race); frames go to all of them.
pub trait SocketRegistry: Send + Sync {
    /// Attach a connection; the returned id must be passed to `unregister`.
    fn register(&self, user_id: i32, sender: UnboundedSender<WsMessage>) -> u64;

    fn unregister(&self, user_id: i32, connection_id: u64);

    /// Deliver a text frame to every live connection of the user.
    /// Returns how many connections accepted it.
    fn send_to_user(&self, user_id: i32, frame: &str) -> usize;

    fn is_online(&self, user_id: i32) -> bool;
}

#[derive(Default)]
pub struct InProcessRegistry {
    next_id: AtomicU64,
    connections: RwLock<HashMap<i32, Vec<(u64, UnboundedSender<WsMessage>)>>>,
}

impl InProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SocketRegistry for InProcessRegistry {
    fn register(&self, user_id: i32, sender: UnboundedSender<WsMessage>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections
            .write()
            .unwrap()
            .entry(user_id)
            .or_default()
            .push((id, sender));
        id
    }

    fn unregister(&self, user_id: i32, connection_id: u64) {
        let mut connections = self.connections.write().unwrap();
        if let Some(list) = connections.get_mut(&user_id) {
            list.retain(|(id, _)| *id != connection_id);
            if list.is_empty() {
                connections.remove(&user_id);
            }
        }
    }

    fn send_to_user(&self, user_id: i32, frame: &str) -> usize {
        let connections = self.connections.read().unwrap();
        let Some(list) = connections.get(&user_id) else {
            return 0;
        };
        list.iter()
            .filter(|(_, sender)| sender.send(WsMessage::Text(frame.to_string().into())).is_ok())
            .count()
    }

    fn is_online(&self, user_id: i32) -> bool {
        self.connections
            .read()
            .unwrap()
            .get(&user_id)
            .is_some_and(|list| !list.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_online_state() {
        let registry = InProcessRegistry::new();
        assert!(!registry.is_online(1));

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let conn = registry.register(1, tx);
        assert!(registry.is_online(1));

        registry.unregister(1, conn);
        assert!(!registry.is_online(1));
    }

    #[test]
    fn delivers_to_all_connections() {
        let registry = InProcessRegistry::new();
        let (tx1, mut rx1) = tokio::sync::mpsc::unbounded_channel();
        let (tx2, mut rx2) = tokio::sync::mpsc::unbounded_channel();
        registry.register(7, tx1);
        registry.register(7, tx2);

        assert_eq!(registry.send_to_user(7, "hello"), 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn dropped_receiver_is_not_counted() {
        let registry = InProcessRegistry::new();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        registry.register(3, tx);
        drop(rx);

        assert_eq!(registry.send_to_user(3, "hello"), 0);
    }
}
