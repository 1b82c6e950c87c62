pub mod registry;
pub mod snapshot;

pub use registry::{DisconnectEffect, LeaveOutcome, RoomRegistry};
pub use snapshot::{HandsSnapshot, MarketSnapshot, PlayerView, RoomSnapshot};
