use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{
    config::RelayLimits,
    error::{RelayError, RelayResult},
};

use super::{
    Joined, Member, MessageLog, PresenceTracker, Room, RoomRegistry, Session, SessionId,
    SessionState,
    protocol::{
        ClientEvent, CreateRoom, MembershipChange, RoomDeleted, RoomSnapshot, RoomSummary,
        SendMessage, ServerEvent,
    },
};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub sessions: usize,
    pub rooms: usize,
    pub messages: usize,
}

/// Every piece of relay state, mutated only through `&mut self`.
///
/// Each public method is one complete step: validate, mutate, emit, then drop
/// any session whose outbound queue overflowed along the way.
pub struct RelayService {
    limits: RelayLimits,
    registry: RoomRegistry,
    presence: PresenceTracker,
    log: MessageLog,
    sessions: HashMap<SessionId, Session>,
}

impl RelayService {
    pub fn new(limits: RelayLimits) -> Self {
        let registry = RoomRegistry::seeded(limits.max_rooms);
        let mut presence = PresenceTracker::new(limits.max_members);
        let mut log = MessageLog::new(limits.log_capacity, limits.max_content);
        for room in registry.list() {
            presence.open(&room.id);
            log.open(&room.id);
        }

        Self {
            limits,
            registry,
            presence,
            log,
            sessions: HashMap::new(),
        }
    }

    pub fn connect(
        &mut self,
        username: Option<&str>,
    ) -> RelayResult<(SessionId, mpsc::Receiver<ServerEvent>)> {
        let (session, events) = Session::connect(username, self.limits.outbox_capacity)?;
        let session_id = session.id;
        info!(session = %session_id, username = %session.username, "session connected");
        self.sessions.insert(session_id, session);
        Ok((session_id, events))
    }

    /// Transport closed. Unknown ids are ignored, so a session already dropped
    /// for lagging can report its disconnect safely.
    pub fn disconnect(&mut self, session_id: SessionId) {
        self.drop_session(session_id);
        self.settle();
    }

    pub fn handle(&mut self, session_id: SessionId, event: ClientEvent) {
        if self.session_state(session_id) == SessionState::Disconnected {
            return;
        }

        let result = match event {
            ClientEvent::GetRooms => {
                self.request_room_list(session_id);
                Ok(())
            }
            ClientEvent::JoinRoom(room) => self.request_join(session_id, &room.into_id()),
            ClientEvent::LeaveRoom(room) => {
                self.request_leave(session_id, &room.into_id());
                Ok(())
            }
            ClientEvent::SendMessage(SendMessage { room_id, content }) => {
                self.request_send(session_id, &room_id, &content)
            }
            ClientEvent::CreateRoom(CreateRoom { name, description }) => self
                .create_room(&name, description.as_deref())
                .map(|_| ()),
        };

        if let Err(err) = result {
            debug!(session = %session_id, code = err.code(), "request rejected");
            self.send_to(session_id, ServerEvent::error(&err));
        }
        self.settle();
    }

    /// Reports `err` to one session only; used for frames that never parsed.
    pub fn reject(&mut self, session_id: SessionId, err: &RelayError) {
        self.send_to(session_id, ServerEvent::error(err));
        self.settle();
    }

    /// Creating a room changes the global catalog, so every session gets the
    /// new list.
    pub fn create_room(&mut self, name: &str, description: Option<&str>) -> RelayResult<RoomSummary> {
        let room = self.registry.create(name, description)?.clone();
        self.presence.open(&room.id);
        self.log.open(&room.id);
        info!(room = %room.id, name = %room.name, "room created");

        let summary = self.summary(&room);
        self.broadcast_all(ServerEvent::RoomsList(self.room_list()));
        self.settle();
        Ok(summary)
    }

    pub fn delete_room(&mut self, room_id: &str) -> RelayResult<()> {
        let room = self.registry.delete(room_id)?;
        let evicted = self.presence.close(room_id);
        let dropped = self.log.drop_room(room_id);
        info!(room = %room.id, name = %room.name, evicted = evicted.len(), dropped, "room deleted");

        for member in evicted {
            self.send_to(
                member.session_id,
                ServerEvent::RoomDeleted(RoomDeleted {
                    room_id: room.id.clone(),
                }),
            );
        }
        self.broadcast_all(ServerEvent::RoomsList(self.room_list()));
        self.settle();
        Ok(())
    }

    pub fn room_list(&self) -> Vec<RoomSummary> {
        self.registry.list().map(|room| self.summary(room)).collect()
    }

    pub fn members_of(&self, room_id: &str) -> &[Member] {
        self.presence.members_of(room_id)
    }

    pub fn session_state(&self, session_id: SessionId) -> SessionState {
        if !self.sessions.contains_key(&session_id) {
            return SessionState::Disconnected;
        }
        SessionState::Active {
            room: self.presence.room_of(session_id).map(str::to_owned),
        }
    }

    pub fn stats(&self) -> Stats {
        Stats {
            sessions: self.sessions.len(),
            rooms: self.registry.len(),
            messages: self.log.total(),
        }
    }

    fn request_room_list(&mut self, session_id: SessionId) {
        self.send_to(session_id, ServerEvent::RoomsList(self.room_list()));
    }

    fn request_join(&mut self, session_id: SessionId, room_id: &str) -> RelayResult<()> {
        let username = self.username(session_id)?;
        let room = self
            .registry
            .get(room_id)
            .cloned()
            .ok_or(RelayError::RoomNotFound)?;

        let joined = self.presence.join(session_id, &username, room_id)?;
        debug!(session = %session_id, room = %room_id, "joined room");

        if let Joined::Entered {
            previous: Some((previous_room, member)),
        } = &joined
        {
            self.announce_left(previous_room, &member.username);
        }

        let snapshot = RoomSnapshot {
            room: self.summary(&room),
            messages: self.log.recent(room_id, self.limits.history_limit),
            users: self.members_of(room_id).to_vec(),
        };
        self.send_to(session_id, ServerEvent::RoomJoined(snapshot));

        if matches!(joined, Joined::Entered { .. }) {
            let change = self.membership_change(room_id, username);
            self.broadcast_room(room_id, ServerEvent::UserJoined(change), Some(session_id));
        }
        Ok(())
    }

    fn request_leave(&mut self, session_id: SessionId, room_id: &str) {
        if let Some(member) = self.presence.leave(session_id, room_id) {
            debug!(session = %session_id, room = %room_id, "left room");
            self.announce_left(room_id, &member.username);
        }
    }

    fn request_send(&mut self, session_id: SessionId, room_id: &str, content: &str) -> RelayResult<()> {
        let username = self.username(session_id)?;
        if !self.registry.contains(room_id) {
            return Err(RelayError::RoomNotFound);
        }
        if self.presence.room_of(session_id) != Some(room_id) {
            return Err(RelayError::NotInRoom);
        }

        let message = self
            .log
            .append(room_id, session_id, &username, content)?
            .clone();
        debug!(session = %session_id, room = %room_id, message = message.id, "message sent");

        self.broadcast_room(room_id, ServerEvent::NewMessage(message), None);
        Ok(())
    }

    fn drop_session(&mut self, session_id: SessionId) {
        let Some(session) = self.sessions.remove(&session_id) else {
            return;
        };
        info!(session = %session_id, username = %session.username, "session disconnected");

        if let Some((room_id, member)) = self.presence.leave_current(session_id) {
            self.announce_left(&room_id, &member.username);
        }
    }

    /// Drops lagging sessions until none remain; each drop can overflow
    /// another session's queue with its `user_left`.
    fn settle(&mut self) {
        loop {
            let lagging: Vec<SessionId> = self
                .sessions
                .values()
                .filter(|session| session.is_lagging())
                .map(|session| session.id)
                .collect();
            if lagging.is_empty() {
                return;
            }
            for session_id in lagging {
                self.drop_session(session_id);
            }
        }
    }

    fn announce_left(&mut self, room_id: &str, username: &str) {
        let change = self.membership_change(room_id, username.to_owned());
        self.broadcast_room(room_id, ServerEvent::UserLeft(change), None);
    }

    fn membership_change(&self, room_id: &str, username: String) -> MembershipChange {
        MembershipChange {
            room_id: room_id.to_owned(),
            username,
            users: self.members_of(room_id).to_vec(),
        }
    }

    fn summary(&self, room: &Room) -> RoomSummary {
        RoomSummary {
            id: room.id.clone(),
            name: room.name.clone(),
            description: room.description.clone(),
            created_at: room.created_at,
            user_count: self.presence.count(&room.id),
            message_count: self.log.len(&room.id),
        }
    }

    fn username(&self, session_id: SessionId) -> RelayResult<String> {
        self.sessions
            .get(&session_id)
            .map(|session| session.username.clone())
            .ok_or(RelayError::Unavailable)
    }

    fn send_to(&mut self, session_id: SessionId, event: ServerEvent) {
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.push(event);
        }
    }

    fn broadcast_room(&mut self, room_id: &str, event: ServerEvent, except: Option<SessionId>) {
        let recipients: Vec<SessionId> = self
            .presence
            .members_of(room_id)
            .iter()
            .map(|member| member.session_id)
            .filter(|session_id| Some(*session_id) != except)
            .collect();

        for session_id in recipients {
            self.send_to(session_id, event.clone());
        }
    }

    fn broadcast_all(&mut self, event: ServerEvent) {
        for session in self.sessions.values_mut() {
            session.push(event.clone());
        }
    }
}
