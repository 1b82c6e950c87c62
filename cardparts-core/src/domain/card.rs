use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a whole card, e.g. `"7♥"`.
pub type CardId = String;

/// Stable identifier of a card fragment, e.g. `"7♥:TL"`.
pub type PartId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

pub const SUITS: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

impl Suit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Suit::Spades => "♠",
            Suit::Hearts => "♥",
            Suit::Diamonds => "♦",
            Suit::Clubs => "♣",
        }
    }

    /// Hearts and diamonds are red; spades and clubs are black.
    pub fn is_red(&self) -> bool {
        matches!(self, Suit::Hearts | Suit::Diamonds)
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

pub const RANKS: [Rank; 13] = [
    Rank::Ace,
    Rank::Two,
    Rank::Three,
    Rank::Four,
    Rank::Five,
    Rank::Six,
    Rank::Seven,
    Rank::Eight,
    Rank::Nine,
    Rank::Ten,
    Rank::Jack,
    Rank::Queen,
    Rank::King,
];

impl Rank {
    pub fn label(&self) -> &'static str {
        match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
        }
    }

    /// Point value used by the final-score tie-break:
    /// Ace = 1, numerals at face value, J/Q/K = 11/12/13.
    pub fn value(&self) -> u32 {
        match self {
            Rank::Ace => 1,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten => 10,
            Rank::Jack => 11,
            Rank::Queen => 12,
            Rank::King => 13,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One of the four quadrants a card is cut into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    TL,
    TR,
    BL,
    BR,
}

pub const QUADRANTS: [Quadrant; 4] = [Quadrant::TL, Quadrant::TR, Quadrant::BL, Quadrant::BR];

impl Quadrant {
    pub fn label(&self) -> &'static str {
        match self {
            Quadrant::TL => "TL",
            Quadrant::TR => "TR",
            Quadrant::BL => "BL",
            Quadrant::BR => "BR",
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A whole card. Only used while building the deck; gameplay deals in parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn id(&self) -> CardId {
        format!("{}{}", self.rank, self.suit)
    }
}

/// One quarter of a card. Immutable once created; ownership is tracked
/// externally by whichever hand currently contains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    #[serde(rename = "partId")]
    pub part_id: PartId,
    #[serde(rename = "cardId")]
    pub card_id: CardId,
    pub quadrant: Quadrant,
    pub rank: Rank,
    pub suit: Suit,
}

impl Part {
    pub fn new(card: Card, quadrant: Quadrant) -> Self {
        let card_id = card.id();
        Part {
            part_id: format!("{}:{}", card_id, quadrant),
            card_id,
            quadrant,
            rank: card.rank,
            suit: card.suit,
        }
    }

    /// Short human label for activity-log lines, e.g. `"7♥TL"`.
    pub fn label(&self) -> String {
        format!("{}{}{}", self.rank, self.suit, self.quadrant)
    }
}
