//! Read-side views of a room, shaped for broadcast.
//!
//! Snapshots are computed from committed state only, so every recipient of
//! one broadcast sees the same picture.

use crate::domain::card::Part;
use crate::domain::market::MarketOffer;
use crate::domain::player::{PlayerId, Timestamp};
use crate::domain::room::Room;
use crate::domain::scoring::BonusRules;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub connected: bool,
    pub is_host: bool,
    pub hand_count: usize,
}

/// Everything about a room that is safe to show every member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: String,
    pub name: String,
    /// Shown in the lobby so the host can share it. Empty when the room is
    /// open.
    pub passcode: String,
    pub max_players: usize,
    pub minutes: u32,
    pub bonus_rules: BonusRules,
    pub started: bool,
    pub ends_at: Option<Timestamp>,
    pub host_id: Option<PlayerId>,
    /// Join order.
    pub players: Vec<PlayerView>,
}

/// Every hand in the room, keyed by player. The server sends all hands and
/// clients render only their own. Serializes as the bare map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandsSnapshot {
    pub hands: HashMap<PlayerId, Vec<Part>>,
}

/// All offers, newest first. Part ids in offers are public by design: an
/// offer is an announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub offers: Vec<MarketOffer>,
}

pub fn room_snapshot(room: &Room) -> RoomSnapshot {
    let players = room
        .order()
        .iter()
        .filter_map(|id| room.players().get(id))
        .map(|p| PlayerView {
            id: p.id,
            name: p.name.clone(),
            connected: p.connected,
            is_host: room.is_host(&p.id),
            hand_count: room.ledger().hand(&p.id).len(),
        })
        .collect();

    RoomSnapshot {
        code: room.code().as_str().to_string(),
        name: room.name().to_string(),
        passcode: room.passcode().unwrap_or_default().to_string(),
        max_players: room.max_players(),
        minutes: room.minutes(),
        bonus_rules: *room.bonus_rules(),
        started: room.started(),
        ends_at: room.ends_at(),
        host_id: room.host_id(),
        players,
    }
}

pub fn hands_snapshot(room: &Room) -> HandsSnapshot {
    HandsSnapshot {
        hands: room.ledger().hands().clone(),
    }
}

pub fn market_snapshot(room: &Room) -> MarketSnapshot {
    let mut offers: Vec<MarketOffer> = room.market().offers().values().cloned().collect();
    offers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    MarketSnapshot { offers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::room::RoomConfig;
    use crate::domain::{deck, RoomCode};
    use uuid::Uuid;

    fn room_with_players(n: usize) -> (Room, Vec<PlayerId>) {
        let mut room = Room::new(
            RoomCode::normalize("SNAP01"),
            RoomConfig {
                name: "Snapshot".to_string(),
                passcode: None,
                max_players: 8,
                minutes: 5,
                bonus_rules: BonusRules::default(),
            },
        );
        let players: Vec<PlayerId> = (0..n)
            .map(|i| {
                let id = Uuid::new_v4();
                room.add_player(id, format!("P{}", i), None).unwrap();
                id
            })
            .collect();
        (room, players)
    }

    #[test]
    fn test_room_snapshot_preserves_join_order() {
        let (room, players) = room_with_players(3);
        let snap = room_snapshot(&room);

        let ids: Vec<PlayerId> = snap.players.iter().map(|p| p.id).collect();
        assert_eq!(ids, players);
        assert!(snap.players[0].is_host);
        assert!(!snap.started);
        assert!(snap.ends_at.is_none());
    }

    #[test]
    fn test_room_snapshot_exposes_passcode_for_lobby() {
        let mut room = Room::new(
            RoomCode::normalize("SNAP02"),
            RoomConfig {
                name: "Locked".to_string(),
                passcode: Some("sekrit".to_string()),
                max_players: 4,
                minutes: 5,
                bonus_rules: BonusRules::default(),
            },
        );
        room.add_player(Uuid::new_v4(), "Alice".to_string(), Some("sekrit"))
            .unwrap();

        let snap = room_snapshot(&room);
        assert_eq!(snap.passcode, "sekrit");
        assert_eq!(room_snapshot(&room_with_players(1).0).passcode, "");
    }

    #[test]
    fn test_hands_snapshot_covers_all_players() {
        let (mut room, players) = room_with_players(2);
        room.start(&mut rand::thread_rng()).unwrap();

        let snap = hands_snapshot(&room);
        assert_eq!(snap.hands.len(), 2);
        assert_eq!(snap.hands[&players[0]].len(), deck::DECK_PARTS / 2);
        assert_eq!(snap.hands[&players[0]], room.ledger().hand(&players[0]));

        let public = room_snapshot(&room);
        assert!(public.players.iter().all(|p| p.hand_count == 104));
    }

    #[test]
    fn test_market_snapshot_newest_first() {
        let (mut room, players) = room_with_players(2);
        room.start(&mut rand::thread_rng()).unwrap();

        let hand: Vec<String> = room.ledger().hand(&players[0])[..2]
            .iter()
            .map(|p| p.part_id.clone())
            .collect();
        let first = room
            .create_offer(players[0], hand[..1].to_vec(), vec![])
            .unwrap()
            .id;
        let second = room
            .create_offer(players[0], hand[1..].to_vec(), vec![])
            .unwrap()
            .id;

        let snap = market_snapshot(&room);
        assert_eq!(snap.offers.len(), 2);
        let ids: Vec<_> = snap.offers.iter().map(|o| o.id).collect();
        assert!(ids.contains(&first) && ids.contains(&second));
        assert!(snap.offers[0].created_at >= snap.offers[1].created_at);
    }
}
