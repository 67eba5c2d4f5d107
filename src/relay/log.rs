use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use time::OffsetDateTime;

use crate::error::{RelayError, RelayResult};

use super::{RoomId, SessionId};

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub room_id: RoomId,
    #[serde(skip)]
    pub author_session_id: SessionId,
    #[serde(rename = "username")]
    pub author_username: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

/// Per-room bounded history. Ids come from a single counter shared by all
/// rooms, so within a room they increase strictly with append order.
#[derive(Debug)]
pub struct MessageLog {
    logs: HashMap<RoomId, VecDeque<Message>>,
    capacity: usize,
    max_content: usize,
    next_id: u64,
}

impl MessageLog {
    pub fn new(capacity: usize, max_content: usize) -> Self {
        Self {
            logs: HashMap::new(),
            capacity,
            max_content,
            next_id: 1,
        }
    }

    pub fn open(&mut self, room_id: &str) {
        self.logs.entry(room_id.to_owned()).or_default();
    }

    /// Drops the room's history; returns how many messages were discarded.
    pub fn drop_room(&mut self, room_id: &str) -> usize {
        self.logs.remove(room_id).map_or(0, |log| log.len())
    }

    pub fn append(
        &mut self,
        room_id: &str,
        author_session_id: SessionId,
        author_username: &str,
        content: &str,
    ) -> RelayResult<&Message> {
        let content = validate_content(content, self.max_content)?;
        let log = self.logs.get_mut(room_id).ok_or(RelayError::RoomNotFound)?;

        let id = self.next_id;
        self.next_id += 1;

        log.push_back(Message {
            id,
            room_id: room_id.to_owned(),
            author_session_id,
            author_username: author_username.to_owned(),
            content: content.to_owned(),
            sent_at: OffsetDateTime::now_utc(),
        });
        self.truncate(room_id);

        self.logs
            .get(room_id)
            .and_then(VecDeque::back)
            .ok_or(RelayError::RoomNotFound)
    }

    /// The last `limit` messages, oldest first.
    pub fn recent(&self, room_id: &str, limit: usize) -> Vec<Message> {
        let Some(log) = self.logs.get(room_id) else {
            return Vec::new();
        };

        log.iter()
            .skip(log.len().saturating_sub(limit))
            .cloned()
            .collect()
    }

    pub fn len(&self, room_id: &str) -> usize {
        self.logs.get(room_id).map_or(0, VecDeque::len)
    }

    pub fn total(&self) -> usize {
        self.logs.values().map(VecDeque::len).sum()
    }

    /// Evicts oldest-first until the room is back within capacity.
    pub(crate) fn truncate(&mut self, room_id: &str) {
        let Some(log) = self.logs.get_mut(room_id) else {
            return;
        };

        let surplus = log.len().saturating_sub(self.capacity);
        log.drain(..surplus);
    }
}

/// Trims `content` and checks it against the length bound, counted in UTF-16
/// code units to match what browser clients measure.
fn validate_content(content: &str, max: usize) -> RelayResult<&str> {
    let content = content.trim();
    if content.is_empty() {
        return Err(RelayError::EmptyContent);
    }
    if content.encode_utf16().count() > max {
        return Err(RelayError::ContentTooLong { max });
    }
    Ok(content)
}
