use crate::domain::card::{Card, Part, QUADRANTS, RANKS, SUITS};
use rand::seq::SliceRandom;
use rand::Rng;

/// Total number of parts in a full deck: 52 cards x 4 quadrants.
pub const DECK_PARTS: usize = 208;

/// Build the full 52-card deck in canonical order.
pub fn build_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(52);
    for suit in SUITS {
        for rank in RANKS {
            deck.push(Card { rank, suit });
        }
    }
    deck
}

/// Build all 208 parts of the deck in canonical order.
pub fn build_deck_parts() -> Vec<Part> {
    let mut parts = Vec::with_capacity(DECK_PARTS);
    for card in build_deck() {
        for quadrant in QUADRANTS {
            parts.push(Part::new(card, quadrant));
        }
    }
    parts
}

/// Shuffle parts with a uniform random permutation (Fisher-Yates via
/// `SliceRandom`), then split them fairly across `player_count` hands:
/// base = floor(208 / N); the first `208 mod N` hands receive base + 1.
///
/// Returns one hand per player, in the same order the caller will assign
/// them (join order). Dealing is a one-time operation per room.
pub fn shuffle_and_deal<R: Rng>(rng: &mut R, player_count: usize) -> Vec<Vec<Part>> {
    debug_assert!(player_count > 0);

    let mut parts = build_deck_parts();
    parts.shuffle(rng);

    let base = DECK_PARTS / player_count;
    let remainder = DECK_PARTS % player_count;

    let mut hands = Vec::with_capacity(player_count);
    let mut rest = parts;
    for i in 0..player_count {
        let take = if i < remainder { base + 1 } else { base };
        let tail = rest.split_off(take);
        hands.push(rest);
        rest = tail;
    }
    hands
}
