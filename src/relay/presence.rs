use std::collections::HashMap;

use serde::Serialize;
use time::OffsetDateTime;

use crate::error::{RelayError, RelayResult};

use super::{RoomId, SessionId};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(skip)]
    pub session_id: SessionId,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Joined {
    /// The session was already in this room; nothing changed.
    Already,
    /// The session entered the room, leaving `previous` first if it was
    /// somewhere else.
    Entered { previous: Option<(RoomId, Member)> },
}

/// Live session -> room mapping. A session is in at most one room, and a
/// room's member list holds exactly the sessions mapped to it.
#[derive(Debug)]
pub struct PresenceTracker {
    rooms: HashMap<RoomId, Vec<Member>>,
    sessions: HashMap<SessionId, RoomId>,
    max_members: usize,
}

impl PresenceTracker {
    pub fn new(max_members: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            sessions: HashMap::new(),
            max_members,
        }
    }

    pub fn open(&mut self, room_id: &str) {
        self.rooms.entry(room_id.to_owned()).or_default();
    }

    /// Forgets the room, returning everyone who was in it. Their sessions are
    /// left in no room.
    pub fn close(&mut self, room_id: &str) -> Vec<Member> {
        let evicted = self.rooms.remove(room_id).unwrap_or_default();
        for member in &evicted {
            self.sessions.remove(&member.session_id);
        }
        evicted
    }

    pub fn join(
        &mut self,
        session_id: SessionId,
        username: &str,
        room_id: &str,
    ) -> RelayResult<Joined> {
        if self.room_of(session_id) == Some(room_id) {
            return Ok(Joined::Already);
        }

        let members = self.rooms.get(room_id).ok_or(RelayError::RoomNotFound)?;
        if members.len() >= self.max_members {
            return Err(RelayError::RoomFull);
        }

        let previous = self.leave_current(session_id);

        let member = Member {
            session_id,
            username: username.to_owned(),
            joined_at: OffsetDateTime::now_utc(),
        };
        if let Some(members) = self.rooms.get_mut(room_id) {
            members.push(member);
        }
        self.sessions.insert(session_id, room_id.to_owned());

        Ok(Joined::Entered { previous })
    }

    /// No-op unless the session is currently in `room_id`.
    pub fn leave(&mut self, session_id: SessionId, room_id: &str) -> Option<Member> {
        if self.room_of(session_id) != Some(room_id) {
            return None;
        }
        self.leave_current(session_id).map(|(_, member)| member)
    }

    pub fn leave_current(&mut self, session_id: SessionId) -> Option<(RoomId, Member)> {
        let room_id = self.sessions.remove(&session_id)?;
        let members = self.rooms.get_mut(&room_id)?;
        let index = members
            .iter()
            .position(|member| member.session_id == session_id)?;
        let member = members.remove(index);
        Some((room_id, member))
    }

    pub fn room_of(&self, session_id: SessionId) -> Option<&str> {
        self.sessions.get(&session_id).map(String::as_str)
    }

    /// Members in join order.
    pub fn members_of(&self, room_id: &str) -> &[Member] {
        self.rooms
            .get(room_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn count(&self, room_id: &str) -> usize {
        self.members_of(room_id).len()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn tracker() -> PresenceTracker {
        let mut presence = PresenceTracker::new(200);
        presence.open("general");
        presence.open("tech");
        presence
    }

    fn usernames(presence: &PresenceTracker, room_id: &str) -> Vec<String> {
        presence
            .members_of(room_id)
            .iter()
            .map(|member| member.username.clone())
            .collect()
    }

    #[test]
    fn joining_another_room_leaves_the_first() {
        let mut presence = tracker();
        let alice = Uuid::now_v7();

        presence.join(alice, "alice", "general").unwrap();
        let joined = presence.join(alice, "alice", "tech").unwrap();

        let Joined::Entered { previous: Some((room_id, _)) } = joined else {
            panic!("expected to leave general");
        };
        assert_eq!(room_id, "general");
        assert!(presence.members_of("general").is_empty());
        assert_eq!(usernames(&presence, "tech"), ["alice"]);
        assert_eq!(presence.room_of(alice), Some("tech"));
    }

    #[test]
    fn rejoining_same_room_is_noop() {
        let mut presence = tracker();
        let alice = Uuid::now_v7();
        presence.join(alice, "alice", "general").unwrap();
        assert_eq!(presence.join(alice, "alice", "general").unwrap(), Joined::Already);
        assert_eq!(presence.count("general"), 1);
    }

    #[test]
    fn unknown_room_leaves_state_untouched() {
        let mut presence = tracker();
        let alice = Uuid::now_v7();
        presence.join(alice, "alice", "general").unwrap();

        assert_eq!(
            presence.join(alice, "alice", "missing").unwrap_err(),
            RelayError::RoomNotFound
        );
        assert_eq!(presence.room_of(alice), Some("general"));
    }

    #[test]
    fn full_room_rejects_newcomers() {
        let mut presence = PresenceTracker::new(1);
        presence.open("general");
        presence.join(Uuid::now_v7(), "alice", "general").unwrap();
        assert_eq!(
            presence.join(Uuid::now_v7(), "bob", "general").unwrap_err(),
            RelayError::RoomFull
        );
    }

    #[test]
    fn leave_is_idempotent() {
        let mut presence = tracker();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        presence.join(alice, "alice", "general").unwrap();
        presence.join(bob, "bob", "general").unwrap();

        assert!(presence.leave(alice, "tech").is_none());
        assert_eq!(presence.leave(alice, "general").unwrap().username, "alice");
        assert!(presence.leave(alice, "general").is_none());
        assert_eq!(usernames(&presence, "general"), ["bob"]);
    }

    #[test]
    fn closing_a_room_frees_its_sessions() {
        let mut presence = tracker();
        let alice = Uuid::now_v7();
        presence.join(alice, "alice", "tech").unwrap();

        let evicted = presence.close("tech");
        assert_eq!(evicted.len(), 1);
        assert_eq!(presence.room_of(alice), None);
        assert_eq!(
            presence.join(alice, "alice", "tech").unwrap_err(),
            RelayError::RoomNotFound
        );
    }
}
