//! The registry actor: one task owns the [`RoomRegistry`], fed by a command
//! queue. Serializing every mutation through this loop is what makes room
//! operations atomic without per-room locks. Broadcasts and persistence
//! notifications happen only after a mutation commits; failed operations
//! produce an error ack and nothing else.

use crate::connections::{Connections, ConnectionSender};
use crate::protocol::{Ack, ClientRequest, ServerEvent, ServerMessage};
use crate::store::StoreEvent;
use cardparts_core::domain::card::PartId;
use cardparts_core::domain::error::GameError;
use cardparts_core::domain::player::PlayerId;
use cardparts_core::domain::room::{RoomCode, RoomConfig};
use cardparts_core::{snapshot, RoomRegistry};
use serde_json::json;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// How long a started room survives its host's disconnect.
pub const HOST_GRACE: Duration = Duration::from_secs(30);

pub enum Command {
    /// A parsed client frame. `conn` doubles as the player identity; the
    /// sender is registered into the room map on join and rebind.
    Request {
        conn: PlayerId,
        sender: ConnectionSender,
        seq: u64,
        request: ClientRequest,
        reply: oneshot::Sender<Ack>,
    },
    /// The connection's socket closed.
    Disconnected { conn: PlayerId },
    /// A host-grace timer elapsed. Honored only if `generation` is still
    /// current for the room.
    ExpireHostGrace { code: RoomCode, generation: u64 },
}

pub struct GameService {
    registry: RoomRegistry,
    connections: Connections,
    store_tx: mpsc::UnboundedSender<StoreEvent>,
    /// Handle back into our own queue, for delayed commands.
    self_tx: mpsc::UnboundedSender<Command>,
}

impl GameService {
    pub fn new(
        registry: RoomRegistry,
        connections: Connections,
        store_tx: mpsc::UnboundedSender<StoreEvent>,
        self_tx: mpsc::UnboundedSender<Command>,
    ) -> Self {
        GameService {
            registry,
            connections,
            store_tx,
            self_tx,
        }
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Request {
                    conn,
                    sender,
                    seq,
                    request,
                    reply,
                } => {
                    let ack = match self.handle_request(conn, sender, request).await {
                        Ok(data) => Ack::ok(seq, data),
                        Err(e) => Ack::err(seq, e.code()),
                    };
                    // The requester may already be gone; that is not an error.
                    let _ = reply.send(ack);
                }
                Command::Disconnected { conn } => self.handle_disconnect(conn).await,
                Command::ExpireHostGrace { code, generation } => {
                    self.handle_grace_expiry(code, generation).await
                }
            }
        }
        tracing::debug!("game service stopped");
    }

    async fn handle_request(
        &mut self,
        conn: PlayerId,
        sender: ConnectionSender,
        request: ClientRequest,
    ) -> Result<serde_json::Value, GameError> {
        match request {
            ClientRequest::CreateRoom {
                name,
                passcode,
                max_players,
                minutes,
                bonus_rules,
            } => {
                let config = RoomConfig {
                    name,
                    passcode,
                    max_players,
                    minutes,
                    bonus_rules,
                };
                let (code, room) = {
                    let mut rng = rand::thread_rng();
                    let room = self.registry.create_room(&mut rng, config);
                    (room.code().clone(), snapshot::room_snapshot(room))
                };
                self.persist(&code);
                Ok(json!({ "code": code.as_str(), "room": room }))
            }

            ClientRequest::JoinRoom {
                code,
                name,
                passcode,
            } => {
                let code = RoomCode::normalize(&code);
                self.registry
                    .join_room(&code, conn, &name, passcode.as_deref())?;
                self.connections.register(&code, conn, sender).await;

                let room = self.registry.room(&code)?;
                let joined = room.player_name(&conn).to_string();
                let snap = snapshot::room_snapshot(room);
                self.broadcast(&code, ServerEvent::RoomState { room: snap.clone() })
                    .await;
                self.activity(&code, format!("{} joined the room", joined))
                    .await;
                self.persist(&code);
                Ok(json!({ "playerId": conn, "room": snap }))
            }

            ClientRequest::LeaveRoom { code } => {
                let code = RoomCode::normalize(&code);
                let outcome = self.registry.leave_room(&code, &conn)?;
                self.connections.remove_identity(&conn).await;

                if outcome.closed {
                    let message = if outcome.was_host {
                        "Host left - room closed".to_string()
                    } else {
                        "Room closed".to_string()
                    };
                    self.close_room(&code, message).await;
                } else {
                    self.broadcast_room_state(&code).await;
                    self.broadcast_market_state(&code).await;
                    self.activity(&code, format!("{} left the room", outcome.player_name))
                        .await;
                    self.persist(&code);
                }
                Ok(serde_json::Value::Null)
            }

            ClientRequest::StartGame { code } => {
                let code = RoomCode::normalize(&code);
                let ends_at = {
                    let mut rng = rand::thread_rng();
                    self.registry.start_game(&mut rng, &code, &conn)?
                };

                let room = self.registry.room(&code)?;
                let hands = snapshot::hands_snapshot(room);
                self.broadcast(
                    &code,
                    ServerEvent::GameStarted {
                        code: code.as_str().to_string(),
                        ends_at,
                        hands,
                    },
                )
                .await;
                self.broadcast_room_state(&code).await;
                self.broadcast_market_state(&code).await;
                self.activity(&code, "Game started".to_string()).await;
                self.persist(&code);
                Ok(json!({ "endsAt": ends_at }))
            }

            ClientRequest::GetRoomState { code } => {
                let code = RoomCode::normalize(&code);
                let room = self.registry.room(&code)?;
                Ok(json!({ "room": snapshot::room_snapshot(room) }))
            }

            ClientRequest::GetHands { code } => {
                let code = RoomCode::normalize(&code);
                let room = self.registry.room(&code)?;
                Ok(json!({ "hands": snapshot::hands_snapshot(room) }))
            }

            ClientRequest::RebindIdentity { code, old_id } => {
                let code = RoomCode::normalize(&code);
                let moved = self.registry.rebind_identity(&code, &old_id, conn)?;
                self.connections.rebind(&code, &old_id, conn, sender).await;

                self.broadcast_room_state(&code).await;
                self.broadcast_market_state(&code).await;
                self.broadcast_hands(&code).await;
                self.persist(&code);
                Ok(json!({ "playerId": conn, "moved": moved }))
            }

            ClientRequest::CreateOffer { code, give, want } => {
                let code = RoomCode::normalize(&code);
                let offer = self.registry.create_offer(&code, conn, give, want)?;

                let room = self.registry.room(&code)?;
                let mut line = format!(
                    "{} offers {}",
                    room.player_name(&conn),
                    self.labels(&code, &offer.give)
                );
                if offer.is_locked() {
                    line.push_str(&format!(" for {}", self.labels(&code, &offer.want)));
                }
                self.broadcast_market_state(&code).await;
                self.activity(&code, line).await;
                self.persist(&code);
                Ok(json!({ "offer": offer }))
            }

            ClientRequest::CancelOffer { code, offer_id } => {
                let code = RoomCode::normalize(&code);
                self.registry.cancel_offer(&code, offer_id, conn)?;

                let room = self.registry.room(&code)?;
                let line = format!("{} cancelled an offer", room.player_name(&conn));
                self.broadcast_market_state(&code).await;
                self.activity(&code, line).await;
                self.persist(&code);
                Ok(serde_json::Value::Null)
            }

            ClientRequest::CreateRequest {
                code,
                offer_id,
                give,
            } => {
                let code = RoomCode::normalize(&code);
                let request = self.registry.create_request(&code, offer_id, conn, give)?;

                let room = self.registry.room(&code)?;
                let owner = room
                    .market()
                    .offer(&offer_id)
                    .map(|o| room.player_name(&o.owner).to_string())
                    .unwrap_or_default();
                let line = format!(
                    "{} wants to trade {} with {}",
                    room.player_name(&conn),
                    self.labels(&code, &request.give),
                    owner
                );
                self.broadcast_market_state(&code).await;
                self.activity(&code, line).await;
                self.persist(&code);
                Ok(json!({ "request": request }))
            }

            ClientRequest::AcceptRequest {
                code,
                offer_id,
                request_id,
            } => {
                let code = RoomCode::normalize(&code);
                let trade = self
                    .registry
                    .accept_request(&code, offer_id, request_id, conn)?;

                let room = self.registry.room(&code)?;
                let line = format!(
                    "{} traded {} for {} with {}",
                    room.player_name(&trade.owner),
                    self.labels(&code, &trade.owner_gave),
                    self.labels(&code, &trade.requester_gave),
                    room.player_name(&trade.requester)
                );
                self.broadcast_market_state(&code).await;
                self.broadcast_hands(&code).await;
                self.activity(&code, line).await;
                self.persist(&code);
                Ok(json!({ "trade": trade }))
            }

            ClientRequest::DeclineRequest {
                code,
                offer_id,
                request_id,
            } => {
                let code = RoomCode::normalize(&code);
                self.registry
                    .decline_request(&code, offer_id, request_id, conn)?;

                let room = self.registry.room(&code)?;
                let line = format!("{} declined a trade request", room.player_name(&conn));
                self.broadcast_market_state(&code).await;
                self.activity(&code, line).await;
                self.persist(&code);
                Ok(serde_json::Value::Null)
            }

            ClientRequest::GetLiveScore { code } => {
                let code = RoomCode::normalize(&code);
                let leaderboard = self.registry.live_score(&code)?;
                Ok(serde_json::to_value(leaderboard).map_err(|_| GameError::Internal)?)
            }

            ClientRequest::FinalizeScore { code } => {
                let code = RoomCode::normalize(&code);
                let result = self.registry.finalize_score(&code)?;
                self.broadcast(
                    &code,
                    ServerEvent::GameResult {
                        code: code.as_str().to_string(),
                        result: result.clone(),
                    },
                )
                .await;
                Ok(serde_json::to_value(result).map_err(|_| GameError::Internal)?)
            }
        }
    }

    async fn handle_disconnect(&mut self, conn: PlayerId) {
        self.connections.remove_identity(&conn).await;

        for effect in self.registry.mark_disconnected(&conn) {
            self.broadcast_room_state(&effect.code).await;
            self.broadcast_market_state(&effect.code).await;
            self.persist(&effect.code);

            if let Some(generation) = effect.grace_generation {
                let self_tx = self.self_tx.clone();
                let code = effect.code.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(HOST_GRACE).await;
                    let _ = self_tx.send(Command::ExpireHostGrace { code, generation });
                });
            }
        }
    }

    async fn handle_grace_expiry(&mut self, code: RoomCode, generation: u64) {
        if self.registry.expire_host_grace(&code, generation) {
            self.close_room(&code, "Host disconnected - room closed".to_string())
                .await;
        }
    }

    /// Tell everyone the room is gone, then forget their connections and the
    /// persisted row.
    async fn close_room(&mut self, code: &RoomCode, message: String) {
        self.broadcast(
            code,
            ServerEvent::RoomClosed {
                code: code.as_str().to_string(),
                message,
            },
        )
        .await;
        self.connections.remove_room(code).await;
        self.persist_delete(code);
    }

    async fn broadcast(&self, code: &RoomCode, event: ServerEvent) {
        self.connections
            .broadcast(code, &ServerMessage::event(event))
            .await;
    }

    async fn broadcast_room_state(&self, code: &RoomCode) {
        if let Ok(room) = self.registry.room(code) {
            let snap = snapshot::room_snapshot(room);
            self.broadcast(code, ServerEvent::RoomState { room: snap }).await;
        }
    }

    async fn broadcast_market_state(&self, code: &RoomCode) {
        if let Ok(room) = self.registry.room(code) {
            let snap = snapshot::market_snapshot(room);
            self.broadcast(
                code,
                ServerEvent::MarketState {
                    code: code.as_str().to_string(),
                    market: snap,
                },
            )
            .await;
        }
    }

    async fn broadcast_hands(&self, code: &RoomCode) {
        if let Ok(room) = self.registry.room(code) {
            let snap = snapshot::hands_snapshot(room);
            self.broadcast(
                code,
                ServerEvent::HandsUpdate {
                    code: code.as_str().to_string(),
                    hands: snap,
                },
            )
            .await;
        }
    }

    async fn activity(&self, code: &RoomCode, message: String) {
        self.broadcast(
            code,
            ServerEvent::ActivityLog {
                code: code.as_str().to_string(),
                message,
            },
        )
        .await;
    }

    /// Display labels ("7♥TL") for an id set, comma-separated.
    fn labels(&self, code: &RoomCode, part_ids: &[PartId]) -> String {
        match self.registry.room(code) {
            Ok(room) => part_ids
                .iter()
                .map(|id| room.part_label(id))
                .collect::<Vec<_>>()
                .join(", "),
            Err(_) => part_ids.join(", "),
        }
    }

    fn persist(&self, code: &RoomCode) {
        let Ok(room) = self.registry.room(code) else {
            return;
        };
        match serde_json::to_string(room) {
            Ok(data) => {
                let _ = self.store_tx.send(StoreEvent::Upsert {
                    code: code.as_str().to_string(),
                    json: data,
                });
            }
            Err(e) => tracing::error!(room = %code, error = %e, "failed to serialize room"),
        }
    }

    fn persist_delete(&self, code: &RoomCode) {
        let _ = self.store_tx.send(StoreEvent::Delete {
            code: code.as_str().to_string(),
        });
    }
}
