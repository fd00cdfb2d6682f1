//! User and room registries
//!
//! Plain lookup structures owned exclusively by the [`ChatServer`] actor.
//! Because only the actor touches them, every operation here is atomic
//! with respect to all sessions: the username claim race and per-room
//! membership mutation are serialized by the actor's command queue.
//!
//! [`ChatServer`]: crate::server::ChatServer

use std::collections::{HashMap, HashSet};

use crate::error::AppError;
use crate::types::{SessionId, Username};

/// The privileged default room; always exists, cannot be deleted.
pub const LOBBY: &str = "lobby";

/// Rooms created at startup.
pub const SEED_ROOMS: [&str; 3] = [LOBBY, "general", "admin"];

/// Username → session mapping with case-insensitive uniqueness
///
/// Keys are the lowercase form of the username; the display form is kept
/// alongside for listings.
#[derive(Debug, Default)]
pub struct UserRegistry {
    users: HashMap<String, (Username, SessionId)>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a username for a session
    ///
    /// Check-and-insert in one step: of two racing claims for the same
    /// name, exactly one succeeds and the other gets `NameTaken`.
    pub fn claim(&mut self, name: Username, id: SessionId) -> Result<(), AppError> {
        match self.users.entry(name.key()) {
            std::collections::hash_map::Entry::Occupied(_) => {
                Err(AppError::NameTaken(name.as_str().to_string()))
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert((name, id));
                Ok(())
            }
        }
    }

    /// Look up the session holding a username (case-insensitive)
    pub fn lookup(&self, name: &str) -> Option<SessionId> {
        self.users.get(&name.to_lowercase()).map(|(_, id)| *id)
    }

    /// Release a username; removing an absent name is a no-op
    pub fn remove(&mut self, name: &str) -> bool {
        self.users.remove(&name.to_lowercase()).is_some()
    }

    /// Snapshot of registered display names, sorted for stable output
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .users
            .values()
            .map(|(name, _)| name.as_str().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Room name → member set mapping
///
/// Room names are case-sensitive. Rooms survive losing their last member;
/// only an explicit delete removes one, and the lobby never goes away.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: HashMap<String, HashSet<SessionId>>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    /// Create a registry seeded with the default rooms
    pub fn new() -> Self {
        let rooms = SEED_ROOMS
            .iter()
            .map(|name| (name.to_string(), HashSet::new()))
            .collect();
        Self { rooms }
    }

    /// Create a room; returns false without side effect if it exists
    pub fn create(&mut self, name: &str) -> bool {
        match self.rooms.entry(name.to_string()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(HashSet::new());
                true
            }
        }
    }

    /// Delete a room, migrating all members to the lobby
    ///
    /// The move happens in one step: members land in the lobby set before
    /// the room entry disappears, so no session ever belongs to zero
    /// rooms. Returns the migrated members so the caller can notify them.
    pub fn delete(&mut self, name: &str) -> Result<Vec<SessionId>, AppError> {
        if name == LOBBY {
            return Err(AppError::LobbyProtected);
        }
        let members = self
            .rooms
            .remove(name)
            .ok_or_else(|| AppError::RoomNotFound(name.to_string()))?;
        let lobby = self.rooms.entry(LOBBY.to_string()).or_default();
        lobby.extend(members.iter().copied());
        Ok(members.into_iter().collect())
    }

    /// Add a session to a room, creating the room if absent
    pub fn join(&mut self, id: SessionId, name: &str) {
        self.rooms.entry(name.to_string()).or_default().insert(id);
    }

    /// Remove a session from a room; absent room or member is a no-op
    pub fn leave(&mut self, id: SessionId, name: &str) -> bool {
        self.rooms
            .get_mut(name)
            .map(|members| members.remove(&id))
            .unwrap_or(false)
    }

    /// Snapshot of one room's members
    pub fn members(&self, name: &str) -> Vec<SessionId> {
        self.rooms
            .get(name)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rooms.contains_key(name)
    }

    /// Snapshot of room names, sorted for stable output
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of (room name, member count) pairs, sorted by name
    pub fn overview(&self) -> Vec<(String, usize)> {
        let mut rows: Vec<(String, usize)> = self
            .rooms
            .iter()
            .map(|(name, members)| (name.clone(), members.len()))
            .collect();
        rows.sort();
        rows
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Username {
        Username::parse(s).unwrap()
    }

    #[test]
    fn test_claim_and_lookup() {
        let mut users = UserRegistry::new();
        let id = SessionId::new();

        users.claim(name("Alice"), id).unwrap();
        assert_eq!(users.lookup("alice"), Some(id));
        assert_eq!(users.lookup("ALICE"), Some(id));
        assert_eq!(users.lookup("bob"), None);
    }

    #[test]
    fn test_claim_conflict_case_insensitive() {
        let mut users = UserRegistry::new();
        users.claim(name("Alice"), SessionId::new()).unwrap();

        let err = users.claim(name("ALICE"), SessionId::new()).unwrap_err();
        assert!(matches!(err, AppError::NameTaken(_)));
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn test_remove_idempotent() {
        let mut users = UserRegistry::new();
        users.claim(name("Alice"), SessionId::new()).unwrap();

        assert!(users.remove("Alice"));
        assert!(!users.remove("Alice"));
        assert!(users.is_empty());
    }

    #[test]
    fn test_names_sorted_display_case() {
        let mut users = UserRegistry::new();
        users.claim(name("Charlie"), SessionId::new()).unwrap();
        users.claim(name("Alice"), SessionId::new()).unwrap();

        assert_eq!(users.names(), vec!["Alice".to_string(), "Charlie".to_string()]);
    }

    #[test]
    fn test_seed_rooms() {
        let rooms = RoomRegistry::new();
        assert!(rooms.contains("lobby"));
        assert!(rooms.contains("general"));
        assert!(rooms.contains("admin"));
        assert_eq!(rooms.len(), 3);
    }

    #[test]
    fn test_create_duplicate() {
        let mut rooms = RoomRegistry::new();
        assert!(rooms.create("games"));
        assert!(!rooms.create("games"));
        assert!(!rooms.create("lobby"));
    }

    #[test]
    fn test_join_creates_room() {
        let mut rooms = RoomRegistry::new();
        let id = SessionId::new();

        rooms.join(id, "newroom");
        assert!(rooms.contains("newroom"));
        assert_eq!(rooms.members("newroom"), vec![id]);
    }

    #[test]
    fn test_leave() {
        let mut rooms = RoomRegistry::new();
        let id = SessionId::new();

        rooms.join(id, "general");
        assert!(rooms.leave(id, "general"));
        assert!(!rooms.leave(id, "general"));
        assert!(rooms.members("general").is_empty());
        // Room survives losing its last member
        assert!(rooms.contains("general"));
    }

    #[test]
    fn test_delete_moves_members_to_lobby() {
        let mut rooms = RoomRegistry::new();
        let a = SessionId::new();
        let b = SessionId::new();
        rooms.join(a, "games");
        rooms.join(b, "games");

        let mut moved = rooms.delete("games").unwrap();
        moved.sort_by_key(|id| id.0);
        let mut expected = vec![a, b];
        expected.sort_by_key(|id| id.0);

        assert_eq!(moved, expected);
        assert!(!rooms.contains("games"));
        assert!(rooms.members("lobby").contains(&a));
        assert!(rooms.members("lobby").contains(&b));
    }

    #[test]
    fn test_delete_lobby_forbidden() {
        let mut rooms = RoomRegistry::new();
        assert!(matches!(rooms.delete("lobby"), Err(AppError::LobbyProtected)));
        assert!(rooms.contains("lobby"));
    }

    #[test]
    fn test_delete_missing_room() {
        let mut rooms = RoomRegistry::new();
        assert!(matches!(
            rooms.delete("nope"),
            Err(AppError::RoomNotFound(_))
        ));
    }

    #[test]
    fn test_names_sorted() {
        let rooms = RoomRegistry::new();
        assert_eq!(
            rooms.names(),
            vec!["admin".to_string(), "general".to_string(), "lobby".to_string()]
        );
    }
}
