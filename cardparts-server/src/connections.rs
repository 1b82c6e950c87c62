use crate::protocol::ServerMessage;
use cardparts_core::domain::player::PlayerId;
use cardparts_core::domain::room::RoomCode;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tokio_tungstenite::tungstenite::Message;

pub type ConnectionSender = UnboundedSender<Message>;

/// Room-keyed map of live connections. A connection appears here once its
/// identity has joined (or rebound into) a room; acks go straight through
/// the per-connection sender and never need this map.
#[derive(Clone, Default)]
pub struct Connections {
    rooms: Arc<RwLock<HashMap<RoomCode, HashMap<PlayerId, ConnectionSender>>>>,
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, code: &RoomCode, id: PlayerId, sender: ConnectionSender) {
        let mut rooms = self.rooms.write().await;
        rooms.entry(code.clone()).or_default().insert(id, sender);
    }

    /// Swap one identity for another within a room, keeping the new sender.
    pub async fn rebind(
        &self,
        code: &RoomCode,
        old: &PlayerId,
        new: PlayerId,
        sender: ConnectionSender,
    ) {
        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(code.clone()).or_default();
        room.remove(old);
        room.insert(new, sender);
    }

    /// Drop an identity from every room it appears in.
    pub async fn remove_identity(&self, id: &PlayerId) {
        let mut rooms = self.rooms.write().await;
        for members in rooms.values_mut() {
            members.remove(id);
        }
        rooms.retain(|_, members| !members.is_empty());
    }

    pub async fn remove_room(&self, code: &RoomCode) {
        self.rooms.write().await.remove(code);
    }

    /// Fan a message out to every connection in a room. Dead senders are
    /// pruned on the way.
    pub async fn broadcast(&self, code: &RoomCode, message: &ServerMessage) {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(room = %code, error = %e, "failed to serialize broadcast");
                return;
            }
        };

        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(code) {
            members.retain(|id, sender| {
                let alive = sender.send(Message::Text(text.clone())).is_ok();
                if !alive {
                    tracing::debug!(room = %code, player = %id, "dropping dead connection");
                }
                alive
            });
        }
    }
}
