//! Room persistence: one row per room, the full aggregate as JSON.
//!
//! Writes go through [`StoreWriter`], a write-behind task that debounces a
//! dirty set so a burst of trades costs one write per room, and game
//! mutations never wait on storage.

use crate::error::StoreError;
use cardparts_core::domain::player::Timestamp;
use cardparts_core::domain::room::Room;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

pub trait RoomStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<Room>, StoreError>;
    fn upsert(&self, code: &str, json: &str) -> Result<(), StoreError>;
    fn delete(&self, code: &str) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS rooms (
                code TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned lock means a panic mid-statement; the connection itself
        // is still usable for independent statements.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RoomStore for SqliteStore {
    fn load_all(&self) -> Result<Vec<Room>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT code, data FROM rooms")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut rooms = Vec::new();
        for row in rows {
            let (code, data) = row?;
            match serde_json::from_str::<Room>(&data) {
                Ok(room) => rooms.push(room),
                // A corrupt row loses one room, not the whole startup.
                Err(e) => tracing::warn!(room = %code, error = %e, "skipping unreadable room"),
            }
        }
        Ok(rooms)
    }

    fn upsert(&self, code: &str, json: &str) -> Result<(), StoreError> {
        self.lock().execute(
            "INSERT INTO rooms (code, data, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(code) DO UPDATE SET data = excluded.data,
                                             updated_at = excluded.updated_at",
            rusqlite::params![code, json, Timestamp::now().as_millis() as i64],
        )?;
        Ok(())
    }

    fn delete(&self, code: &str) -> Result<(), StoreError> {
        self.lock()
            .execute("DELETE FROM rooms WHERE code = ?1", rusqlite::params![code])?;
        Ok(())
    }
}

/// A committed mutation the store must eventually reflect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Upsert { code: String, json: String },
    Delete { code: String },
}

/// Write-behind persistence task. Events overwrite each other per room code
/// in the pending set; the set flushes on an interval and on shutdown.
pub struct StoreWriter {
    store: Arc<dyn RoomStore>,
    rx: UnboundedReceiver<StoreEvent>,
}

impl StoreWriter {
    pub fn new(store: Arc<dyn RoomStore>, rx: UnboundedReceiver<StoreEvent>) -> Self {
        StoreWriter { store, rx }
    }

    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(FLUSH_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // code -> Some(json) to upsert, None to delete
        let mut pending: HashMap<String, Option<String>> = HashMap::new();

        loop {
            tokio::select! {
                event = self.rx.recv() => match event {
                    Some(StoreEvent::Upsert { code, json }) => {
                        pending.insert(code, Some(json));
                    }
                    Some(StoreEvent::Delete { code }) => {
                        pending.insert(code, None);
                    }
                    None => {
                        Self::flush(&*self.store, &mut pending);
                        tracing::debug!("store writer stopped");
                        return;
                    }
                },
                _ = interval.tick() => {
                    Self::flush(&*self.store, &mut pending);
                }
            }
        }
    }

    fn flush(store: &dyn RoomStore, pending: &mut HashMap<String, Option<String>>) {
        for (code, entry) in pending.drain() {
            let result = match &entry {
                Some(json) => store.upsert(&code, json),
                None => store.delete(&code),
            };
            if let Err(e) = result {
                tracing::error!(room = %code, error = %e, "room persistence failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardparts_core::domain::room::{RoomCode, RoomConfig};
    use cardparts_core::domain::scoring::BonusRules;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn sample_room(code: &str) -> Room {
        let mut room = Room::new(
            RoomCode::normalize(code),
            RoomConfig {
                name: "Persisted".to_string(),
                passcode: None,
                max_players: 4,
                minutes: 10,
                bonus_rules: BonusRules::default(),
            },
        );
        room.add_player(Uuid::new_v4(), "Alice".to_string(), None)
            .unwrap();
        room
    }

    #[test]
    fn test_upsert_and_load_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let room = sample_room("AB23CD");
        let json = serde_json::to_string(&room).unwrap();

        store.upsert(room.code().as_str(), &json).unwrap();
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], room);

        // Second upsert replaces, not duplicates.
        store.upsert(room.code().as_str(), &json).unwrap();
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_removes_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let room = sample_room("AB23CD");
        let json = serde_json::to_string(&room).unwrap();
        store.upsert(room.code().as_str(), &json).unwrap();

        store.delete(room.code().as_str()).unwrap();
        assert!(store.load_all().unwrap().is_empty());
        // Deleting a missing row is fine.
        store.delete("XXXXXX").unwrap();
    }

    #[test]
    fn test_corrupt_row_skipped_on_load() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert("BAD000", "not json").unwrap();
        let room = sample_room("AB23CD");
        store
            .upsert(room.code().as_str(), &serde_json::to_string(&room).unwrap())
            .unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].code(), room.code());
    }

    #[tokio::test(start_paused = true)]
    async fn test_writer_debounces_and_flushes() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = StoreWriter::new(store.clone(), rx);
        let handle = tokio::spawn(writer.run());

        let room = sample_room("AB23CD");
        let json = serde_json::to_string(&room).unwrap();
        for _ in 0..5 {
            tx.send(StoreEvent::Upsert {
                code: room.code().as_str().to_string(),
                json: json.clone(),
            })
            .unwrap();
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.load_all().unwrap().len(), 1);

        tx.send(StoreEvent::Delete {
            code: room.code().as_str().to_string(),
        })
        .unwrap();
        drop(tx);
        handle.await.unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }
}
