pub mod card;
pub mod deck;
pub mod error;
pub mod ledger;
pub mod market;
pub mod player;
pub mod room;
pub mod scoring;

pub use card::{Card, CardId, Part, PartId, Quadrant, Rank, Suit};
pub use error::GameError;
pub use ledger::PartLedger;
pub use market::{
    AcceptedTrade, Market, MarketOffer, MarketRequest, OfferId, OfferStatus, RequestId,
    RequestStatus,
};
pub use player::{Player, PlayerId, Timestamp};
pub use room::{LeaveEffect, Room, RoomCode, RoomConfig};
pub use scoring::{Bonus, BonusRules, FinalResult, Leaderboard, ScoreEntry};
