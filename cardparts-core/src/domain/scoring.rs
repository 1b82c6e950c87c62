use crate::domain::card::{CardId, Part, Rank, Suit};
use crate::domain::player::{PlayerId, Timestamp};
use crate::domain::room::Room;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bonus rule toggles chosen at room creation.
///
/// Only `same_rank` (including the lucky-7 substitution) and `color` have
/// scoring semantics today; `sequence`, `trading_master` and `speed` are
/// accepted-but-inert configuration until their algorithms are defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BonusRules {
    pub same_rank: bool,
    pub color: bool,
    pub sequence: bool,
    pub trading_master: bool,
    pub speed: bool,
}

impl Default for BonusRules {
    fn default() -> Self {
        BonusRules {
            same_rank: true,
            color: true,
            sequence: false,
            trading_master: false,
            speed: false,
        }
    }
}

/// One bonus awarded to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bonus {
    #[serde(rename = "type")]
    pub kind: String,
    pub points: u32,
    pub desc: String,
}

/// A completed card: the player holds all four of its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCard {
    pub card_id: CardId,
    pub rank: Rank,
    pub suit: Suit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub player_id: PlayerId,
    pub player_name: String,
    pub connected: bool,
    pub total_cards: u32,
    pub bonuses: Vec<Bonus>,
    pub bonus_points: u32,
    pub total_points: u32,
    pub useless_parts: u32,
    /// Rank-value sum of completed cards; the final-score tie-break.
    pub value_sum: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub leaderboard: Vec<ScoreEntry>,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub winner: Option<ScoreEntry>,
    pub leaderboard: Vec<ScoreEntry>,
}

/// Group a hand by card id and keep the groups of exactly 4.
pub fn completed_cards(hand: &[Part]) -> Vec<CompletedCard> {
    let mut by_card: HashMap<&str, Vec<&Part>> = HashMap::new();
    for part in hand {
        by_card.entry(part.card_id.as_str()).or_default().push(part);
    }

    let mut completed: Vec<CompletedCard> = by_card
        .into_iter()
        .filter(|(_, parts)| parts.len() == 4)
        .map(|(card_id, parts)| CompletedCard {
            card_id: card_id.to_string(),
            rank: parts[0].rank,
            suit: parts[0].suit,
        })
        .collect();
    completed.sort_by(|a, b| a.card_id.cmp(&b.card_id));
    completed
}

fn score_hand(
    player_id: PlayerId,
    player_name: &str,
    connected: bool,
    hand: &[Part],
    rules: &BonusRules,
) -> ScoreEntry {
    let completed = completed_cards(hand);
    let total_cards = completed.len() as u32;

    let mut bonuses = Vec::new();
    let mut bonus_points = 0u32;

    if rules.same_rank {
        let mut rank_counts: HashMap<Rank, u32> = HashMap::new();
        for card in &completed {
            *rank_counts.entry(card.rank).or_default() += 1;
        }
        let mut ranks: Vec<Rank> = rank_counts
            .iter()
            .filter(|(_, &count)| count == 4)
            .map(|(&rank, _)| rank)
            .collect();
        ranks.sort_by_key(|r| r.value());
        for rank in ranks {
            // Lucky 7s substitute +7 for the usual +4, never both.
            if rank == Rank::Seven {
                bonuses.push(Bonus {
                    kind: "Lucky 7s".to_string(),
                    points: 7,
                    desc: "Four 7s (all suits)".to_string(),
                });
                bonus_points += 7;
            } else {
                bonuses.push(Bonus {
                    kind: "Same Rank".to_string(),
                    points: 4,
                    desc: format!("Four {}s (all suits)", rank),
                });
                bonus_points += 4;
            }
        }
    }

    if rules.color {
        let red = completed.iter().filter(|c| c.suit.is_red()).count();
        let black = completed.len() - red;
        // Threshold bonus, once per color, both colors can trigger.
        if red >= 6 {
            bonuses.push(Bonus {
                kind: "Color Bonus".to_string(),
                points: 6,
                desc: format!("{} red cards", red),
            });
            bonus_points += 6;
        }
        if black >= 6 {
            bonuses.push(Bonus {
                kind: "Color Bonus".to_string(),
                points: 6,
                desc: format!("{} black cards", black),
            });
            bonus_points += 6;
        }
    }

    let value_sum = completed.iter().map(|c| c.rank.value()).sum();
    let useless_parts = hand.len() as u32 - total_cards * 4;

    ScoreEntry {
        player_id,
        player_name: player_name.to_string(),
        connected,
        total_cards,
        bonuses,
        bonus_points,
        total_points: total_cards + bonus_points,
        useless_parts,
        value_sum,
    }
}

fn score_entries(room: &Room) -> Vec<ScoreEntry> {
    room.order()
        .iter()
        .filter_map(|id| room.players().get(id))
        .map(|player| {
            score_hand(
                player.id,
                &player.name,
                player.connected,
                room.ledger().hand(&player.id),
                room.bonus_rules(),
            )
        })
        .collect()
}

/// Live leaderboard: sorted by total points only. Pure read of room state.
pub fn live_score(room: &Room) -> Leaderboard {
    let mut entries = score_entries(room);
    entries.sort_by(|a, b| b.total_points.cmp(&a.total_points));
    Leaderboard {
        leaderboard: entries,
        timestamp: Timestamp::now(),
    }
}

/// Final scoring: same totals as the live path, but ties are broken by the
/// rank-value sum of completed cards. The live path deliberately omits this
/// tie-break; do not unify the two without a product decision.
pub fn final_score(room: &Room) -> FinalResult {
    let mut entries = score_entries(room);
    entries.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then(b.value_sum.cmp(&a.value_sum))
    });
    let winner = entries.first().cloned();
    FinalResult {
        winner,
        leaderboard: entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::card::{Card, Quadrant, QUADRANTS};
    use uuid::Uuid;

    fn parts_of(rank: Rank, suit: Suit) -> Vec<Part> {
        let card = Card { rank, suit };
        QUADRANTS.iter().map(|&q| Part::new(card, q)).collect()
    }

    fn entry_for(hand: &[Part], rules: &BonusRules) -> ScoreEntry {
        score_hand(Uuid::new_v4(), "Tester", true, hand, rules)
    }

    #[test]
    fn test_completed_cards_requires_all_four_parts() {
        let mut hand = parts_of(Rank::Queen, Suit::Hearts);
        hand.pop();
        assert!(completed_cards(&hand).is_empty());

        let full = parts_of(Rank::Queen, Suit::Hearts);
        let completed = completed_cards(&full);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].card_id, "Q♥");
    }

    #[test]
    fn test_same_rank_bonus() {
        let mut hand = Vec::new();
        for suit in [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs] {
            hand.extend(parts_of(Rank::Two, suit));
        }

        let entry = entry_for(&hand, &BonusRules::default());
        assert_eq!(entry.total_cards, 4);
        assert_eq!(entry.bonus_points, 4);
        assert_eq!(entry.total_points, 8);
        assert_eq!(entry.useless_parts, 0);
    }

    #[test]
    fn test_lucky_seven_substitutes() {
        let mut hand = Vec::new();
        for suit in [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs] {
            hand.extend(parts_of(Rank::Seven, suit));
        }

        let entry = entry_for(&hand, &BonusRules::default());
        assert_eq!(entry.total_cards, 4);
        assert_eq!(entry.bonus_points, 7);
        assert_eq!(entry.total_points, 11);
        assert_eq!(entry.bonuses.len(), 1);
        assert_eq!(entry.bonuses[0].kind, "Lucky 7s");
    }

    #[test]
    fn test_color_bonus_triggers_once() {
        // Six completed red cards: 3 hearts + 3 diamonds.
        let mut hand = Vec::new();
        for rank in [Rank::Two, Rank::Three, Rank::Four] {
            hand.extend(parts_of(rank, Suit::Hearts));
            hand.extend(parts_of(rank, Suit::Diamonds));
        }

        let entry = entry_for(&hand, &BonusRules::default());
        assert_eq!(entry.total_cards, 6);
        let color_bonuses: Vec<_> = entry
            .bonuses
            .iter()
            .filter(|b| b.kind == "Color Bonus")
            .collect();
        assert_eq!(color_bonuses.len(), 1);
        assert_eq!(entry.bonus_points, 6);
        assert_eq!(entry.total_points, 12);
    }

    #[test]
    fn test_five_of_color_no_bonus() {
        let mut hand = Vec::new();
        for rank in [Rank::Two, Rank::Three] {
            hand.extend(parts_of(rank, Suit::Hearts));
            hand.extend(parts_of(rank, Suit::Diamonds));
        }
        hand.extend(parts_of(Rank::Four, Suit::Hearts));

        let entry = entry_for(&hand, &BonusRules::default());
        assert_eq!(entry.total_cards, 5);
        assert!(entry.bonuses.iter().all(|b| b.kind != "Color Bonus"));
    }

    #[test]
    fn test_disabled_rules_score_nothing_extra() {
        let mut hand = Vec::new();
        for suit in [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs] {
            hand.extend(parts_of(Rank::Seven, suit));
        }
        let rules = BonusRules {
            same_rank: false,
            color: false,
            ..BonusRules::default()
        };

        let entry = entry_for(&hand, &rules);
        assert_eq!(entry.bonus_points, 0);
        assert_eq!(entry.total_points, 4);
    }

    #[test]
    fn test_useless_parts_counted() {
        let mut hand = parts_of(Rank::King, Suit::Spades);
        let strays = parts_of(Rank::Ace, Suit::Hearts);
        hand.extend(strays[..3].to_vec());

        let entry = entry_for(&hand, &BonusRules::default());
        assert_eq!(entry.total_cards, 1);
        assert_eq!(entry.useless_parts, 3);
    }

    #[test]
    fn test_value_sum_only_counts_completed() {
        let mut hand = parts_of(Rank::King, Suit::Spades);
        hand.extend(parts_of(Rank::Ace, Suit::Hearts)[..2].to_vec());

        let entry = entry_for(&hand, &BonusRules::default());
        assert_eq!(entry.value_sum, 13);
    }
}
