use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Transport-level identity of a player. A reconnect produces a fresh
/// identity; continuity is restored by rebinding (see `Room::rebind`).
pub type PlayerId = Uuid;

/// Wall-clock timestamp in milliseconds since the Unix epoch.
///
/// Absolute (not monotonic) because deadlines like `Room::ends_at` are
/// shared with clients and survive persistence across restarts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Timestamp(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    /// The moment `minutes` from now.
    pub fn plus_minutes(&self, minutes: u32) -> Self {
        Timestamp(self.0 + u64::from(minutes) * 60_000)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A player inside a room. Created on join, removed on leave; the
/// `connected` flag flips on disconnect and rebind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub connected: bool,
    #[serde(rename = "lastSeen")]
    pub last_seen: Timestamp,
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Player {
            id,
            name,
            connected: true,
            last_seen: Timestamp::now(),
        }
    }

    pub fn mark_disconnected(&mut self) {
        self.connected = false;
        self.last_seen = Timestamp::now();
    }

    pub fn mark_connected(&mut self) {
        self.connected = true;
        self.last_seen = Timestamp::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_player_is_connected() {
        let player = Player::new(Uuid::new_v4(), "Alice".to_string());
        assert!(player.connected);
        assert_eq!(player.name, "Alice");
    }

    #[test]
    fn test_disconnect_updates_last_seen() {
        let mut player = Player::new(Uuid::new_v4(), "Bob".to_string());
        let before = player.last_seen;
        player.mark_disconnected();
        assert!(!player.connected);
        assert!(player.last_seen >= before);
    }

    #[test]
    fn test_timestamp_plus_minutes() {
        let t = Timestamp::from_millis(1_000);
        assert_eq!(t.plus_minutes(2).as_millis(), 121_000);
    }

    #[test]
    fn test_timestamp_serializes_as_number() {
        let t = Timestamp::from_millis(42);
        assert_eq!(serde_json::to_string(&t).unwrap(), "42");
    }
}
