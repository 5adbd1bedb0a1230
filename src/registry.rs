//! Registry of live rooms, keyed by their 4-character code.
//!
//! The map is its own concurrency-safe structure; looking up or creating
//! rooms never contends with any single room's internal lock.

use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;

use crate::room::Room;
use crate::types::*;

#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomCode, Arc<Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce a code that is not currently live. Safe under concurrent
    /// calls; the map itself is the collision oracle.
    pub fn generate_code(&self) -> RoomCode {
        let mut rng = rand::rng();
        loop {
            let code: String = (0..CODE_LEN)
                .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    /// Insert a new room with the host as sole player. The caller is
    /// expected to have just generated the code; a collision here is a
    /// logic error, not a user-facing one.
    pub fn create(&self, code: RoomCode, host: Player) -> Arc<Room> {
        let room = Arc::new(Room::new(code.clone(), host));
        if self.rooms.insert(code.clone(), room.clone()).is_some() {
            tracing::error!(code, "room code collision on create");
        }
        room
    }

    pub fn get(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, code: &str) -> bool {
        self.rooms.remove(code).is_some()
    }

    /// Resolve which room a connection belongs to. Linear scan over live
    /// rooms; the Arc handles are cloned out first so no map shard is held
    /// while awaiting a room lock.
    pub async fn find_by_connection(&self, connection_id: &str) -> Option<Arc<Room>> {
        let rooms: Vec<Arc<Room>> = self
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for room in rooms {
            if room.inner.lock().await.is_member(connection_id) {
                return Some(room);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str) -> Player {
        Player::new(id.to_string(), id.to_string(), None)
    }

    #[test]
    fn generated_codes_use_the_safe_alphabet() {
        let registry = RoomRegistry::new();
        for _ in 0..100 {
            let code = registry.generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
            for confusable in ['0', 'O', '1', 'I'] {
                assert!(!code.contains(confusable));
            }
        }
    }

    #[test]
    fn generated_code_never_matches_a_live_room() {
        let registry = RoomRegistry::new();
        for i in 0..200 {
            let code = registry.generate_code();
            assert!(registry.get(&code).is_none());
            registry.create(code, player(&format!("host{i}")));
        }
    }

    #[test]
    fn create_then_get_round_trips() {
        let registry = RoomRegistry::new();
        let room = registry.create("ABCD".to_string(), player("host"));
        assert_eq!(room.code, "ABCD");
        assert!(registry.get("ABCD").is_some());
        assert!(registry.get("ZZZZ").is_none());
        assert!(registry.remove("ABCD"));
        assert!(registry.get("ABCD").is_none());
    }

    #[tokio::test]
    async fn find_by_connection_scans_all_rooms() {
        let registry = RoomRegistry::new();
        registry.create("AAAA".to_string(), player("host-a"));
        let room_b = registry.create("BBBB".to_string(), player("host-b"));
        room_b
            .inner
            .lock()
            .await
            .join(player("guest"))
            .unwrap();

        let found = registry.find_by_connection("guest").await.unwrap();
        assert_eq!(found.code, "BBBB");
        assert!(registry.find_by_connection("nobody").await.is_none());
    }

    #[tokio::test]
    async fn concurrent_generation_avoids_live_codes() {
        let registry = Arc::new(RoomRegistry::new());
        let live: Vec<RoomCode> = (0..50)
            .map(|i| {
                let code = registry.generate_code();
                registry.create(code.clone(), player(&format!("host{i}")));
                code
            })
            .collect();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                (0..100).map(|_| registry.generate_code()).collect::<Vec<_>>()
            }));
        }
        for handle in handles {
            for code in handle.await.unwrap() {
                assert!(!live.contains(&code));
            }
        }
    }
}
