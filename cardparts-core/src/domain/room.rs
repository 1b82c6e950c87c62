use crate::domain::card::PartId;
use crate::domain::error::GameError;
use crate::domain::ledger::PartLedger;
use crate::domain::market::{AcceptedTrade, Market, MarketOffer, MarketRequest, OfferId, RequestId};
use crate::domain::player::{Player, PlayerId, Timestamp};
use crate::domain::scoring::BonusRules;
use crate::domain::deck;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Alphabet for room codes. Ambiguous glyphs (0/O, 1/I) are excluded.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

/// Case-insensitive 6-character room code, canonicalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Canonicalize client input: trim and uppercase.
    pub fn normalize(input: &str) -> Self {
        RoomCode(input.trim().to_uppercase())
    }

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let code: String = (0..CODE_LEN)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        RoomCode(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters for creating a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConfig {
    pub name: String,
    #[serde(default)]
    pub passcode: Option<String>,
    pub max_players: usize,
    pub minutes: u32,
    #[serde(default)]
    pub bonus_rules: BonusRules,
}

/// Effect of a player leaving, for the caller to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveEffect {
    pub was_host: bool,
    pub now_empty: bool,
}

/// Room aggregate root: lifecycle, players, part ledger and market.
///
/// All mutation is room-scoped; every operation validates fully before
/// touching state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    code: RoomCode,
    name: String,
    passcode: Option<String>,
    max_players: usize,
    minutes: u32,
    bonus_rules: BonusRules,
    host_id: Option<PlayerId>,
    started: bool,
    ends_at: Option<Timestamp>,
    /// Join order; defines deal order and would-be host succession.
    order: Vec<PlayerId>,
    players: HashMap<PlayerId, Player>,
    ledger: PartLedger,
    market: Market,
    /// Generation token for the host-disconnect grace timer. Bumped on every
    /// arm and on every event that invalidates an outstanding timer, so a
    /// stale expiry can be recognized and dropped. Not persisted.
    #[serde(skip)]
    grace_generation: u64,
}

impl Room {
    pub fn new(code: RoomCode, config: RoomConfig) -> Self {
        Room {
            code,
            name: config.name,
            passcode: config.passcode.filter(|p| !p.is_empty()),
            max_players: config.max_players,
            minutes: config.minutes,
            bonus_rules: config.bonus_rules,
            host_id: None,
            started: false,
            ends_at: None,
            order: Vec::new(),
            players: HashMap::new(),
            ledger: PartLedger::new(),
            market: Market::new(),
            grace_generation: 0,
        }
    }

    // ===== Getters =====

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn passcode(&self) -> Option<&str> {
        self.passcode.as_deref()
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn bonus_rules(&self) -> &BonusRules {
        &self.bonus_rules
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.host_id
    }

    pub fn is_host(&self, id: &PlayerId) -> bool {
        self.host_id == Some(*id)
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn ends_at(&self) -> Option<Timestamp> {
        self.ends_at
    }

    pub fn order(&self) -> &[PlayerId] {
        &self.order
    }

    pub fn players(&self) -> &HashMap<PlayerId, Player> {
        &self.players
    }

    pub fn ledger(&self) -> &PartLedger {
        &self.ledger
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn player_name(&self, id: &PlayerId) -> &str {
        self.players.get(id).map(|p| p.name.as_str()).unwrap_or("?")
    }

    /// Find the display label of a part wherever it currently lives.
    pub fn part_label(&self, part_id: &PartId) -> String {
        self.ledger
            .hands()
            .values()
            .flatten()
            .find(|p| p.part_id == *part_id)
            .map(|p| p.label())
            .unwrap_or_else(|| part_id.clone())
    }

    // ===== Lifecycle =====

    /// Add a player. The first joiner becomes host.
    pub fn add_player(
        &mut self,
        id: PlayerId,
        name: String,
        passcode: Option<&str>,
    ) -> Result<(), GameError> {
        if self.started {
            return Err(GameError::AlreadyStarted);
        }
        if self.players.len() >= self.max_players {
            return Err(GameError::RoomFull);
        }
        if let Some(expected) = &self.passcode {
            if passcode != Some(expected.as_str()) {
                return Err(GameError::BadPasscode);
            }
        }
        let taken = self
            .players
            .values()
            .any(|p| p.name.eq_ignore_ascii_case(&name));
        if taken {
            return Err(GameError::NameTaken);
        }

        self.players.insert(id, Player::new(id, name));
        self.order.push(id);
        if self.host_id.is_none() {
            self.host_id = Some(id);
        }
        Ok(())
    }

    /// Remove a player: drops their hand, cancels their open offers and
    /// declines their pending requests. The caller decides what a host
    /// departure means for the room as a whole.
    pub fn remove_player(&mut self, id: &PlayerId) -> LeaveEffect {
        let was_host = self.is_host(id);
        self.players.remove(id);
        self.order.retain(|p| p != id);
        self.ledger.remove_hand(id);
        self.market.purge_player(id);
        if was_host {
            self.host_id = self.order.first().copied();
        }
        LeaveEffect {
            was_host,
            now_empty: self.players.is_empty(),
        }
    }

    /// Deal the deck and start the clock. One-time, non-reshufflable.
    pub fn start<R: Rng>(&mut self, rng: &mut R) -> Result<Timestamp, GameError> {
        if self.started {
            return Err(GameError::AlreadyStarted);
        }

        let hands = deck::shuffle_and_deal(rng, self.order.len());
        self.ledger.assign(&self.order.clone(), hands);

        self.started = true;
        let ends_at = Timestamp::now().plus_minutes(self.minutes);
        self.ends_at = Some(ends_at);
        Ok(ends_at)
    }

    // ===== Market =====

    pub fn create_offer(
        &mut self,
        owner: PlayerId,
        give: Vec<PartId>,
        want: Vec<PartId>,
    ) -> Result<&MarketOffer, GameError> {
        if !self.started {
            return Err(GameError::NotStarted);
        }
        self.market.create_offer(&self.ledger, owner, give, want)
    }

    pub fn create_request(
        &mut self,
        offer_id: OfferId,
        requester: PlayerId,
        give: Vec<PartId>,
    ) -> Result<&MarketRequest, GameError> {
        if !self.started {
            return Err(GameError::NotStarted);
        }
        self.market
            .create_request(&self.ledger, offer_id, requester, give)
    }

    pub fn accept_request(
        &mut self,
        offer_id: OfferId,
        request_id: RequestId,
        owner: PlayerId,
    ) -> Result<AcceptedTrade, GameError> {
        self.market
            .accept_request(&mut self.ledger, offer_id, request_id, owner)
    }

    pub fn decline_request(
        &mut self,
        offer_id: OfferId,
        request_id: RequestId,
        owner: PlayerId,
    ) -> Result<(), GameError> {
        self.market.decline_request(offer_id, request_id, owner)
    }

    pub fn cancel_offer(&mut self, offer_id: OfferId, owner: PlayerId) -> Result<(), GameError> {
        self.market.cancel_offer(offer_id, owner)
    }

    // ===== Disconnect / grace =====

    /// Flip a player to disconnected. Returns false if the identity is not
    /// a member of this room.
    pub fn mark_disconnected(&mut self, id: &PlayerId) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.mark_disconnected();
                true
            }
            None => false,
        }
    }

    /// Arm the host-disconnect grace timer: returns the generation token a
    /// delayed expiry must present to be honored.
    pub fn arm_host_grace(&mut self) -> u64 {
        self.grace_generation += 1;
        self.grace_generation
    }

    /// A pending expiry is only valid while no later arm/cancel happened.
    pub fn grace_is_current(&self, generation: u64) -> bool {
        self.grace_generation == generation
    }

    pub fn host_disconnected(&self) -> bool {
        self.host_id
            .and_then(|id| self.players.get(&id))
            .map(|p| !p.connected)
            .unwrap_or(false)
    }

    // ===== Rebind =====

    /// Remap a stale identity to a fresh one: hand, player record, market
    /// references, join order and host id all move in one mutation, so no
    /// reader can observe a half-migrated room. Returns the number of parts
    /// that moved with the hand.
    pub fn rebind(&mut self, old: &PlayerId, new: PlayerId) -> Result<usize, GameError> {
        if *old == new || old.is_nil() {
            return Err(GameError::BadOldId);
        }

        let moved = self.ledger.move_all(old, &new);

        if let Some(mut player) = self.players.remove(old) {
            player.id = new;
            player.mark_connected();
            self.players.insert(new, player);
        }

        self.market.rewrite_identity(old, new);

        for id in &mut self.order {
            if id == old {
                *id = new;
            }
        }
        if self.host_id == Some(*old) {
            self.host_id = Some(new);
        }

        // Any outstanding grace timer is now stale.
        self.grace_generation += 1;

        tracing::debug!(room = %self.code, %old, %new, moved, "identity rebound");
        Ok(moved)
    }
}
