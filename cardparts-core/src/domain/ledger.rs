use crate::domain::card::{Part, PartId};
use crate::domain::error::GameError;
use crate::domain::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Per-room mapping from player to the parts they hold.
///
/// The single source of truth for ownership: every swap goes through this
/// type, and a part id exists in exactly one hand at any time. Invariant
/// after the deal: the multiset of part ids across all hands equals the
/// original 208-part deck.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartLedger {
    hands: HashMap<PlayerId, Vec<Part>>,
}

impl PartLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign dealt hands to players, in deal order.
    pub fn assign(&mut self, players: &[PlayerId], hands: Vec<Vec<Part>>) {
        debug_assert_eq!(players.len(), hands.len());
        for (player, hand) in players.iter().zip(hands) {
            self.hands.insert(*player, hand);
        }
    }

    /// The parts currently held by a player (empty if unknown).
    pub fn hand(&self, player: &PlayerId) -> &[Part] {
        self.hands.get(player).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn hands(&self) -> &HashMap<PlayerId, Vec<Part>> {
        &self.hands
    }

    /// Whether `player` currently holds every id in `part_ids`.
    /// An empty id set is trivially held.
    pub fn holds_all(&self, player: &PlayerId, part_ids: &[PartId]) -> bool {
        if part_ids.is_empty() {
            return true;
        }
        let held: HashSet<&str> = self
            .hand(player)
            .iter()
            .map(|p| p.part_id.as_str())
            .collect();
        part_ids.iter().all(|id| held.contains(id.as_str()))
    }

    /// Atomically exchange parts between two players.
    ///
    /// Ownership of both sides is re-validated here, at the moment of
    /// mutation, because the id sets may come from a stale offer or request.
    /// On any failure neither hand is modified.
    pub fn swap(
        &mut self,
        a: &PlayerId,
        a_parts: &[PartId],
        b: &PlayerId,
        b_parts: &[PartId],
    ) -> Result<(), GameError> {
        if !self.holds_all(a, a_parts) || !self.holds_all(b, b_parts) {
            return Err(GameError::PartsUnavailable);
        }

        let moved_from_a = Self::take(self.hands.entry(*a).or_default(), a_parts);
        let moved_from_b = Self::take(self.hands.entry(*b).or_default(), b_parts);

        self.hands.entry(*a).or_default().extend(moved_from_b);
        self.hands.entry(*b).or_default().extend(moved_from_a);
        Ok(())
    }

    fn take(hand: &mut Vec<Part>, part_ids: &[PartId]) -> Vec<Part> {
        let wanted: HashSet<&str> = part_ids.iter().map(String::as_str).collect();
        let mut taken = Vec::with_capacity(part_ids.len());
        hand.retain(|part| {
            if wanted.contains(part.part_id.as_str()) {
                taken.push(part.clone());
                false
            } else {
                true
            }
        });
        taken
    }

    /// Move a player's entire hand to another identity (rebind). Returns the
    /// number of parts moved; a no-op when the old identity holds nothing.
    pub fn move_all(&mut self, old: &PlayerId, new: &PlayerId) -> usize {
        match self.hands.remove(old) {
            Some(hand) => {
                let moved = hand.len();
                self.hands.entry(*new).or_default().extend(hand);
                moved
            }
            None => 0,
        }
    }

    /// Drop a player's hand entirely (player left the room).
    pub fn remove_hand(&mut self, player: &PlayerId) {
        self.hands.remove(player);
    }

    /// Total number of parts across all hands.
    pub fn total_parts(&self) -> usize {
        self.hands.values().map(Vec::len).sum()
    }

    /// Sorted list of every part id in the ledger, for conservation checks.
    pub fn all_part_ids(&self) -> Vec<PartId> {
        let mut ids: Vec<PartId> = self
            .hands
            .values()
            .flat_map(|h| h.iter().map(|p| p.part_id.clone()))
            .collect();
        ids.sort();
        ids
    }
}
