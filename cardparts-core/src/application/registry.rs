//! Room registry: the single owner of all live rooms.
//!
//! Every operation validates fully before mutating, so a failed call leaves
//! the registry untouched. The registry itself is synchronous; callers that
//! need concurrency serialize access around it.

use crate::domain::card::PartId;
use crate::domain::error::GameError;
use crate::domain::market::{AcceptedTrade, MarketOffer, MarketRequest, OfferId, RequestId};
use crate::domain::player::{PlayerId, Timestamp};
use crate::domain::room::{Room, RoomCode, RoomConfig};
use crate::domain::scoring::{self, FinalResult, Leaderboard};
use rand::Rng;
use std::collections::HashMap;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 8;
pub const MIN_MINUTES: u32 = 1;
pub const MAX_MINUTES: u32 = 120;

/// Fallback when a join name trims to nothing.
const DEFAULT_PLAYER_NAME: &str = "Player";

/// What a leave did to the room, for broadcast composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub player_name: String,
    pub was_host: bool,
    /// True when the room no longer exists: the host left, or the last
    /// player did.
    pub closed: bool,
}

/// Result of flipping one identity to disconnected in one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectEffect {
    pub code: RoomCode,
    pub was_host: bool,
    /// Present when a host-grace timer should be scheduled; carries the
    /// generation token the expiry must present.
    pub grace_generation: Option<u64>,
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted rooms at startup.
    pub fn restore(rooms: Vec<Room>) -> Self {
        let rooms = rooms
            .into_iter()
            .map(|room| (room.code().clone(), room))
            .collect();
        RoomRegistry { rooms }
    }

    pub fn room(&self, code: &RoomCode) -> Result<&Room, GameError> {
        self.rooms.get(code).ok_or(GameError::RoomNotFound)
    }

    fn room_mut(&mut self, code: &RoomCode) -> Result<&mut Room, GameError> {
        self.rooms.get_mut(code).ok_or(GameError::RoomNotFound)
    }

    pub fn codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Create a room under a freshly generated unique code. Player and
    /// minute limits are clamped to their allowed ranges. The creator joins
    /// like everyone else and becomes host as the first joiner.
    pub fn create_room<R: Rng>(&mut self, rng: &mut R, mut config: RoomConfig) -> &Room {
        config.max_players = config.max_players.clamp(MIN_PLAYERS, MAX_PLAYERS);
        config.minutes = config.minutes.clamp(MIN_MINUTES, MAX_MINUTES);
        if config.name.trim().is_empty() {
            config.name = "Card Room".to_string();
        }

        let mut code = RoomCode::random(rng);
        while self.rooms.contains_key(&code) {
            code = RoomCode::random(rng);
        }

        tracing::info!(room = %code, name = %config.name, "room created");
        self.rooms
            .entry(code.clone())
            .or_insert_with(|| Room::new(code, config))
    }

    /// Join a room. The identity comes from the transport: one connection,
    /// one identity, and a reconnect joins under a fresh one (see
    /// [`Self::rebind_identity`]).
    pub fn join_room(
        &mut self,
        code: &RoomCode,
        id: PlayerId,
        name: &str,
        passcode: Option<&str>,
    ) -> Result<(), GameError> {
        let room = self.room_mut(code)?;

        let name = match name.trim() {
            "" => DEFAULT_PLAYER_NAME.to_string(),
            trimmed => trimmed.to_string(),
        };
        room.add_player(id, name, passcode)?;

        tracing::info!(room = %code, player = %id, "player joined");
        Ok(())
    }

    /// Remove a player. The room closes when its host leaves or when it
    /// becomes empty; a host leave is always terminal, never a handoff.
    pub fn leave_room(
        &mut self,
        code: &RoomCode,
        player: &PlayerId,
    ) -> Result<LeaveOutcome, GameError> {
        let room = self.room_mut(code)?;
        let player_name = room.player_name(player).to_string();

        let effect = room.remove_player(player);
        let closed = effect.was_host || effect.now_empty;
        if closed {
            self.rooms.remove(code);
            tracing::info!(room = %code, "room closed");
        }

        Ok(LeaveOutcome {
            player_name,
            was_host: effect.was_host,
            closed,
        })
    }

    /// Host-only. Deals the deck and starts the countdown.
    pub fn start_game<R: Rng>(
        &mut self,
        rng: &mut R,
        code: &RoomCode,
        player: &PlayerId,
    ) -> Result<Timestamp, GameError> {
        let room = self.room_mut(code)?;
        if !room.is_host(player) {
            return Err(GameError::OnlyHost);
        }
        let ends_at = room.start(rng)?;
        tracing::info!(room = %code, %ends_at, "game started");
        Ok(ends_at)
    }

    // ===== Market passthroughs =====

    pub fn create_offer(
        &mut self,
        code: &RoomCode,
        owner: PlayerId,
        give: Vec<PartId>,
        want: Vec<PartId>,
    ) -> Result<MarketOffer, GameError> {
        let room = self.room_mut(code)?;
        room.create_offer(owner, give, want).cloned()
    }

    pub fn create_request(
        &mut self,
        code: &RoomCode,
        offer_id: OfferId,
        requester: PlayerId,
        give: Vec<PartId>,
    ) -> Result<MarketRequest, GameError> {
        let room = self.room_mut(code)?;
        room.create_request(offer_id, requester, give).cloned()
    }

    pub fn accept_request(
        &mut self,
        code: &RoomCode,
        offer_id: OfferId,
        request_id: RequestId,
        owner: PlayerId,
    ) -> Result<AcceptedTrade, GameError> {
        let room = self.room_mut(code)?;
        room.accept_request(offer_id, request_id, owner)
    }

    pub fn decline_request(
        &mut self,
        code: &RoomCode,
        offer_id: OfferId,
        request_id: RequestId,
        owner: PlayerId,
    ) -> Result<(), GameError> {
        self.room_mut(code)?.decline_request(offer_id, request_id, owner)
    }

    pub fn cancel_offer(
        &mut self,
        code: &RoomCode,
        offer_id: OfferId,
        owner: PlayerId,
    ) -> Result<(), GameError> {
        self.room_mut(code)?.cancel_offer(offer_id, owner)
    }

    // ===== Identity =====

    /// Rebind a stale identity to a fresh one after a reconnect. Returns the
    /// number of parts that moved with the hand.
    pub fn rebind_identity(
        &mut self,
        code: &RoomCode,
        old: &PlayerId,
        new: PlayerId,
    ) -> Result<usize, GameError> {
        self.room_mut(code)?.rebind(old, new)
    }

    /// Flip an identity to disconnected in every room that knows it. A
    /// disconnect never removes the player; their hand stays in the ledger
    /// awaiting a rebind. For the host of a started room the caller must
    /// schedule a grace expiry with the returned generation token.
    pub fn mark_disconnected(&mut self, player: &PlayerId) -> Vec<DisconnectEffect> {
        let mut effects = Vec::new();
        for (code, room) in &mut self.rooms {
            if !room.mark_disconnected(player) {
                continue;
            }
            let was_host = room.is_host(player);
            let grace_generation = if was_host && room.started() {
                Some(room.arm_host_grace())
            } else {
                None
            };
            tracing::info!(room = %code, %player, was_host, "player disconnected");
            effects.push(DisconnectEffect {
                code: code.clone(),
                was_host,
                grace_generation,
            });
        }
        effects
    }

    /// Fired when a host-grace timer elapses. Closes the room only if it
    /// still exists, the generation matches (no rebind or newer timer in
    /// between), and the host is still disconnected.
    pub fn expire_host_grace(&mut self, code: &RoomCode, generation: u64) -> bool {
        let Some(room) = self.rooms.get(code) else {
            return false;
        };
        if !room.grace_is_current(generation) || !room.host_disconnected() {
            return false;
        }
        self.rooms.remove(code);
        tracing::info!(room = %code, "host grace elapsed, room closed");
        true
    }

    // ===== Scoring =====

    pub fn live_score(&self, code: &RoomCode) -> Result<Leaderboard, GameError> {
        let room = self.room(code)?;
        if !room.started() {
            return Err(GameError::NotStarted);
        }
        Ok(scoring::live_score(room))
    }

    /// Final scoring with the winner tie-break. The room is left in place;
    /// closing it is a separate decision.
    pub fn finalize_score(&self, code: &RoomCode) -> Result<FinalResult, GameError> {
        let room = self.room(code)?;
        if !room.started() {
            return Err(GameError::NotStarted);
        }
        Ok(scoring::final_score(room))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deck::DECK_PARTS;
    use crate::domain::scoring::BonusRules;
    use uuid::Uuid;

    fn config() -> RoomConfig {
        RoomConfig {
            name: "Test Room".to_string(),
            passcode: None,
            max_players: 4,
            minutes: 10,
            bonus_rules: BonusRules::default(),
        }
    }

    fn registry_with_room() -> (RoomRegistry, RoomCode) {
        let mut registry = RoomRegistry::new();
        let code = registry
            .create_room(&mut rand::thread_rng(), config())
            .code()
            .clone();
        (registry, code)
    }

    fn join(registry: &mut RoomRegistry, code: &RoomCode, name: &str) -> PlayerId {
        let id = Uuid::new_v4();
        registry.join_room(code, id, name, None).unwrap();
        id
    }

    #[test]
    fn test_create_room_generates_unique_codes() {
        let mut registry = RoomRegistry::new();
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            registry.create_room(&mut rng, config());
        }
        assert_eq!(registry.len(), 50);
    }

    #[test]
    fn test_create_room_clamps_bounds() {
        let mut registry = RoomRegistry::new();
        let mut cfg = config();
        cfg.max_players = 99;
        cfg.minutes = 0;
        let room = registry.create_room(&mut rand::thread_rng(), cfg);
        assert_eq!(room.max_players(), MAX_PLAYERS);
        assert_eq!(room.minutes(), MIN_MINUTES);
    }

    #[test]
    fn test_join_unknown_room() {
        let mut registry = RoomRegistry::new();
        let result = registry.join_room(
            &RoomCode::normalize("NOPE00"),
            Uuid::new_v4(),
            "Alice",
            None,
        );
        assert_eq!(result.unwrap_err(), GameError::RoomNotFound);
    }

    #[test]
    fn test_blank_name_defaults() {
        let (mut registry, code) = registry_with_room();
        let id = Uuid::new_v4();
        registry.join_room(&code, id, "   ", None).unwrap();
        let room = registry.room(&code).unwrap();
        assert_eq!(room.player_name(&id), "Player");
    }

    #[test]
    fn test_host_leave_closes_room() {
        let (mut registry, code) = registry_with_room();
        let host = join(&mut registry, &code, "Alice");
        join(&mut registry, &code, "Bob");

        let outcome = registry.leave_room(&code, &host).unwrap();
        assert!(outcome.was_host);
        assert!(outcome.closed);
        assert_eq!(outcome.player_name, "Alice");
        assert_eq!(registry.room(&code), Err(GameError::RoomNotFound));
    }

    #[test]
    fn test_non_host_leave_keeps_room() {
        let (mut registry, code) = registry_with_room();
        join(&mut registry, &code, "Alice");
        let bob = join(&mut registry, &code, "Bob");

        let outcome = registry.leave_room(&code, &bob).unwrap();
        assert!(!outcome.was_host);
        assert!(!outcome.closed);
        assert!(registry.room(&code).is_ok());
    }

    #[test]
    fn test_start_requires_host() {
        let (mut registry, code) = registry_with_room();
        join(&mut registry, &code, "Alice");
        let bob = join(&mut registry, &code, "Bob");

        let mut rng = rand::thread_rng();
        let result = registry.start_game(&mut rng, &code, &bob);
        assert_eq!(result.unwrap_err(), GameError::OnlyHost);
    }

    #[test]
    fn test_start_deals_and_sets_deadline() {
        let (mut registry, code) = registry_with_room();
        let host = join(&mut registry, &code, "Alice");
        join(&mut registry, &code, "Bob");

        let before = Timestamp::now();
        let mut rng = rand::thread_rng();
        let ends_at = registry.start_game(&mut rng, &code, &host).unwrap();

        assert!(ends_at >= before.plus_minutes(10));
        let room = registry.room(&code).unwrap();
        assert_eq!(room.ledger().total_parts(), DECK_PARTS);
    }

    #[test]
    fn test_disconnect_non_host_arms_nothing() {
        let (mut registry, code) = registry_with_room();
        let host = join(&mut registry, &code, "Alice");
        let bob = join(&mut registry, &code, "Bob");
        let mut rng = rand::thread_rng();
        registry.start_game(&mut rng, &code, &host).unwrap();

        let effects = registry.mark_disconnected(&bob);
        assert_eq!(effects.len(), 1);
        assert!(!effects[0].was_host);
        assert!(effects[0].grace_generation.is_none());
    }

    #[test]
    fn test_disconnect_host_before_start_arms_nothing() {
        let (mut registry, code) = registry_with_room();
        let host = join(&mut registry, &code, "Alice");
        join(&mut registry, &code, "Bob");

        let effects = registry.mark_disconnected(&host);
        assert_eq!(effects.len(), 1);
        assert!(effects[0].was_host);
        assert!(effects[0].grace_generation.is_none());
    }

    #[test]
    fn test_host_grace_expiry_closes_room() {
        let (mut registry, code) = registry_with_room();
        let host = join(&mut registry, &code, "Alice");
        join(&mut registry, &code, "Bob");
        let mut rng = rand::thread_rng();
        registry.start_game(&mut rng, &code, &host).unwrap();

        let effects = registry.mark_disconnected(&host);
        let generation = effects[0].grace_generation.unwrap();

        assert!(registry.expire_host_grace(&code, generation));
        assert_eq!(registry.room(&code), Err(GameError::RoomNotFound));
    }

    #[test]
    fn test_host_grace_cancelled_by_rebind() {
        let (mut registry, code) = registry_with_room();
        let host = join(&mut registry, &code, "Alice");
        join(&mut registry, &code, "Bob");
        let mut rng = rand::thread_rng();
        registry.start_game(&mut rng, &code, &host).unwrap();

        let effects = registry.mark_disconnected(&host);
        let generation = effects[0].grace_generation.unwrap();

        // Host reconnects under a fresh identity before the timer fires.
        let fresh = Uuid::new_v4();
        registry.rebind_identity(&code, &host, fresh).unwrap();

        assert!(!registry.expire_host_grace(&code, generation));
        assert!(registry.room(&code).is_ok());
        assert!(registry.room(&code).unwrap().is_host(&fresh));
    }

    #[test]
    fn test_stale_grace_generation_ignored() {
        let (mut registry, code) = registry_with_room();
        let host = join(&mut registry, &code, "Alice");
        join(&mut registry, &code, "Bob");
        let mut rng = rand::thread_rng();
        registry.start_game(&mut rng, &code, &host).unwrap();

        let first = registry.mark_disconnected(&host)[0]
            .grace_generation
            .unwrap();
        // A second disconnect (reconnect churn) arms a newer generation.
        let second = registry.mark_disconnected(&host)[0]
            .grace_generation
            .unwrap();
        assert_ne!(first, second);

        assert!(!registry.expire_host_grace(&code, first));
        assert!(registry.room(&code).is_ok());
        assert!(registry.expire_host_grace(&code, second));
    }

    #[test]
    fn test_scores_require_started_game() {
        let (mut registry, code) = registry_with_room();
        join(&mut registry, &code, "Alice");

        assert_eq!(
            registry.live_score(&code).unwrap_err(),
            GameError::NotStarted
        );
        assert_eq!(
            registry.finalize_score(&code).unwrap_err(),
            GameError::NotStarted
        );
    }

    #[test]
    fn test_trade_flow_through_registry() {
        let (mut registry, code) = registry_with_room();
        let alice = join(&mut registry, &code, "Alice");
        let bob = join(&mut registry, &code, "Bob");
        let mut rng = rand::thread_rng();
        registry.start_game(&mut rng, &code, &alice).unwrap();

        let alice_gives: Vec<PartId> = registry.room(&code).unwrap().ledger().hand(&alice)[..1]
            .iter()
            .map(|p| p.part_id.clone())
            .collect();
        let bob_gives: Vec<PartId> = registry.room(&code).unwrap().ledger().hand(&bob)[..1]
            .iter()
            .map(|p| p.part_id.clone())
            .collect();

        let offer = registry
            .create_offer(&code, alice, alice_gives.clone(), vec![])
            .unwrap();
        let request = registry
            .create_request(&code, offer.id, bob, bob_gives.clone())
            .unwrap();
        let trade = registry
            .accept_request(&code, offer.id, request.id, alice)
            .unwrap();

        assert_eq!(trade.owner_gave, alice_gives);
        assert_eq!(trade.requester_gave, bob_gives);
        let ledger = registry.room(&code).unwrap().ledger();
        assert!(ledger.holds_all(&bob, &alice_gives));
        assert!(ledger.holds_all(&alice, &bob_gives));
    }

    #[test]
    fn test_restore_round_trip() {
        let (mut registry, code) = registry_with_room();
        let host = join(&mut registry, &code, "Alice");
        join(&mut registry, &code, "Bob");
        let mut rng = rand::thread_rng();
        registry.start_game(&mut rng, &code, &host).unwrap();

        let rooms: Vec<Room> = registry
            .codes()
            .iter()
            .map(|c| registry.room(c).unwrap().clone())
            .collect();

        let restored = RoomRegistry::restore(rooms);
        assert_eq!(restored.len(), 1);
        let room = restored.room(&code).unwrap();
        assert!(room.started());
        assert_eq!(room.ledger().total_parts(), DECK_PARTS);
    }
}
