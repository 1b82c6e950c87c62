//! Core domain for a timed card-trading game.
//!
//! A 52-card deck is cut into 208 quadrant parts, dealt across a room, and
//! traded back into whole cards through a two-phase market before the clock
//! runs out. This crate is pure domain logic: no I/O, no async, no
//! transport. The server crate drives it.

pub mod application;
pub mod domain;

pub use application::{
    registry::{DisconnectEffect, LeaveOutcome, RoomRegistry},
    snapshot::{self, HandsSnapshot, MarketSnapshot, RoomSnapshot},
};
pub use domain::{
    Card, GameError, Leaderboard, Market, MarketOffer, MarketRequest, OfferId, Part, PartId,
    PartLedger, Player, PlayerId, Rank, RequestId, Room, RoomCode, RoomConfig, Suit, Timestamp,
};
