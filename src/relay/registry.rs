use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{RelayError, RelayResult};

use super::RoomId;

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 50;

const SEEDED: [(&str, &str, &str); 3] = [
    ("general", "General", "General discussion"),
    ("random", "Random", "Off-topic conversations"),
    ("tech", "Tech", "Technology talk"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    /// Seeded rooms cannot be deleted.
    pub protected: bool,
}

/// Owns room metadata, in creation order.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: Vec<Room>,
    max_rooms: usize,
}

impl RoomRegistry {
    /// Registry holding `general`, `random` and `tech`. The seeded rooms are
    /// always present, even when `max_rooms` is smaller.
    pub fn seeded(max_rooms: usize) -> Self {
        let now = OffsetDateTime::now_utc();
        let rooms = SEEDED
            .iter()
            .map(|(id, name, description)| Room {
                id: (*id).to_owned(),
                name: (*name).to_owned(),
                description: Some((*description).to_owned()),
                created_at: now,
                protected: true,
            })
            .collect();

        Self { rooms, max_rooms }
    }

    pub fn create(&mut self, name: &str, description: Option<&str>) -> RelayResult<&Room> {
        let name = name.trim();
        let len = name.chars().count();
        if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
            return Err(RelayError::InvalidName {
                min: MIN_NAME_LEN,
                max: MAX_NAME_LEN,
            });
        }

        let folded = name.to_lowercase();
        if self.rooms.iter().any(|room| room.name.to_lowercase() == folded) {
            return Err(RelayError::DuplicateName);
        }

        if self.rooms.len() >= self.max_rooms {
            return Err(RelayError::RoomLimitReached);
        }

        let description = description
            .map(str::trim)
            .filter(|description| !description.is_empty())
            .map(str::to_owned);

        self.rooms.push(Room {
            id: Uuid::now_v7().to_string(),
            name: name.to_owned(),
            description,
            created_at: OffsetDateTime::now_utc(),
            protected: false,
        });

        Ok(&self.rooms[self.rooms.len() - 1])
    }

    pub fn get(&self, id: &str) -> Option<&Room> {
        self.rooms.iter().find(|room| room.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn list(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Removes the room's metadata only; the caller cascades to presence and
    /// the message log.
    pub fn delete(&mut self, id: &str) -> RelayResult<Room> {
        let index = self
            .rooms
            .iter()
            .position(|room| room.id == id)
            .ok_or(RelayError::RoomNotFound)?;

        if self.rooms[index].protected {
            return Err(RelayError::Protected);
        }

        Ok(self.rooms.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_protected_rooms_in_order() {
        let registry = RoomRegistry::seeded(100);
        let ids: Vec<_> = registry.list().map(|room| room.id.as_str()).collect();
        assert_eq!(ids, ["general", "random", "tech"]);
        assert!(registry.list().all(|room| room.protected));
    }

    #[test]
    fn names_are_unique_case_insensitively() {
        let mut registry = RoomRegistry::seeded(100);
        registry.create("  Sports ", None).unwrap();

        assert_eq!(
            registry.create("sPORTS", Some("again")).unwrap_err(),
            RelayError::DuplicateName
        );
        assert_eq!(
            registry.create("GENERAL", None).unwrap_err(),
            RelayError::DuplicateName
        );
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn rejects_short_names_after_trim() {
        let mut registry = RoomRegistry::seeded(10);
        for name in ["", " ", " x  "] {
            assert!(matches!(
                registry.create(name, None),
                Err(RelayError::InvalidName { .. })
            ));
        }
        assert_eq!(registry.len(), 3);

        let room = registry.create(" ab ", Some("   ")).unwrap();
        assert_eq!(room.name, "ab");
        assert_eq!(room.description, None);
    }

    #[test]
    fn enforces_room_cap() {
        let mut registry = RoomRegistry::seeded(4);
        registry.create("fourth", None).unwrap();
        assert_eq!(
            registry.create("fifth", None).unwrap_err(),
            RelayError::RoomLimitReached
        );
    }

    #[test]
    fn list_keeps_insertion_order() {
        let mut registry = RoomRegistry::seeded(100);
        registry.create("zeta", None).unwrap();
        registry.create("alpha", None).unwrap();
        let names: Vec<_> = registry.list().map(|room| room.name.as_str()).collect();
        assert_eq!(names, ["General", "Random", "Tech", "zeta", "alpha"]);
    }

    #[test]
    fn seeded_rooms_are_protected() {
        let mut registry = RoomRegistry::seeded(100);
        assert_eq!(registry.delete("general").unwrap_err(), RelayError::Protected);
        assert_eq!(registry.delete("nope").unwrap_err(), RelayError::RoomNotFound);

        let id = registry.create("Sports", None).unwrap().id.clone();
        let removed = registry.delete(&id).unwrap();
        assert_eq!(removed.name, "Sports");
        assert!(!registry.contains(&id));

        // the name frees up once the room is gone
        registry.create("sports", None).unwrap();
    }
}
