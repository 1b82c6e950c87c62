//! Wire protocol: JSON over WebSocket.
//!
//! Client to server: `{ "seq": n, "request": { "type": ..., ... } }`.
//! Server to client: `{ "kind": "ack", "seq": n, "ok": ..., ... }` for the
//! request's originator, and `{ "kind": "event", "event": {...} }` broadcast
//! to every connection in the affected room.

use cardparts_core::domain::card::PartId;
use cardparts_core::domain::market::{OfferId, RequestId};
use cardparts_core::domain::player::{PlayerId, Timestamp};
use cardparts_core::domain::scoring::{BonusRules, FinalResult};
use cardparts_core::{HandsSnapshot, MarketSnapshot, RoomSnapshot};
use serde::{Deserialize, Serialize};

/// Client frame. `seq` is echoed in the ack so the client can match
/// responses to in-flight requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    pub request: ClientRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientRequest {
    CreateRoom {
        name: String,
        #[serde(default)]
        passcode: Option<String>,
        max_players: usize,
        minutes: u32,
        #[serde(default)]
        bonus_rules: BonusRules,
    },
    JoinRoom {
        code: String,
        name: String,
        #[serde(default)]
        passcode: Option<String>,
    },
    LeaveRoom {
        code: String,
    },
    StartGame {
        code: String,
    },
    GetRoomState {
        code: String,
    },
    GetHands {
        code: String,
    },
    /// Reclaim a previous identity after a reconnect; the fresh identity is
    /// the requesting connection's own.
    RebindIdentity {
        code: String,
        old_id: PlayerId,
    },
    CreateOffer {
        code: String,
        give: Vec<PartId>,
        #[serde(default)]
        want: Vec<PartId>,
    },
    CancelOffer {
        code: String,
        offer_id: OfferId,
    },
    CreateRequest {
        code: String,
        offer_id: OfferId,
        #[serde(default)]
        give: Vec<PartId>,
    },
    AcceptRequest {
        code: String,
        offer_id: OfferId,
        request_id: RequestId,
    },
    DeclineRequest {
        code: String,
        offer_id: OfferId,
        request_id: RequestId,
    },
    GetLiveScore {
        code: String,
    },
    FinalizeScore {
        code: String,
    },
}

impl ClientRequest {
    /// The room code a request targets, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientRequest::CreateRoom { .. } => None,
            ClientRequest::JoinRoom { code, .. }
            | ClientRequest::LeaveRoom { code }
            | ClientRequest::StartGame { code }
            | ClientRequest::GetRoomState { code }
            | ClientRequest::GetHands { code }
            | ClientRequest::RebindIdentity { code, .. }
            | ClientRequest::CreateOffer { code, .. }
            | ClientRequest::CancelOffer { code, .. }
            | ClientRequest::CreateRequest { code, .. }
            | ClientRequest::AcceptRequest { code, .. }
            | ClientRequest::DeclineRequest { code, .. }
            | ClientRequest::GetLiveScore { code }
            | ClientRequest::FinalizeScore { code } => Some(code),
        }
    }
}

/// Per-request response, sent only to the originator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub seq: u64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "serde_json::Value::is_null", default)]
    pub data: serde_json::Value,
}

impl Ack {
    pub fn ok(seq: u64, data: serde_json::Value) -> Self {
        Ack {
            seq,
            ok: true,
            error: None,
            data,
        }
    }

    pub fn err(seq: u64, code: &str) -> Self {
        Ack {
            seq,
            ok: false,
            error: Some(code.to_string()),
            data: serde_json::Value::Null,
        }
    }
}

/// Broadcast to every connection in a room after a committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    RoomState {
        room: RoomSnapshot,
    },
    MarketState {
        code: String,
        market: MarketSnapshot,
    },
    HandsUpdate {
        code: String,
        hands: HandsSnapshot,
    },
    /// Human-readable line for the in-room activity feed.
    ActivityLog {
        code: String,
        message: String,
    },
    GameStarted {
        code: String,
        ends_at: Timestamp,
        hands: HandsSnapshot,
    },
    GameResult {
        code: String,
        result: FinalResult,
    },
    RoomClosed {
        code: String,
        message: String,
    },
}

/// Every frame the server emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ServerMessage {
    Ack(Ack),
    Event { event: ServerEvent },
}

impl ServerMessage {
    pub fn event(event: ServerEvent) -> Self {
        ServerMessage::Event { event }
    }
}
