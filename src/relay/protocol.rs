//! JSON frames exchanged over `/ws`.
//!
//! Every frame is `{ "event": "<name>", "data": <payload> }`. Session ids are
//! `#[serde(skip)]`ped on every outbound type so they never leave the server.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::RelayError;

use super::{Member, Message, RoomId};

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    GetRooms,
    JoinRoom(RoomRef),
    LeaveRoom(RoomRef),
    SendMessage(SendMessage),
    CreateRoom(CreateRoom),
}

/// Clients send either a bare id (`"general"`) or `{ "roomId": "general" }`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum RoomRef {
    Id(RoomId),
    Object {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },
}

impl RoomRef {
    pub fn into_id(self) -> RoomId {
        match self {
            RoomRef::Id(room_id) | RoomRef::Object { room_id } => room_id,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub room_id: RoomId,
    pub content: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CreateRoom {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    RoomsList(Vec<RoomSummary>),
    RoomJoined(RoomSnapshot),
    UserJoined(MembershipChange),
    UserLeft(MembershipChange),
    NewMessage(Message),
    RoomDeleted(RoomDeleted),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn error(err: &RelayError) -> Self {
        ServerEvent::Error(ErrorPayload {
            code: err.code(),
            message: err.to_string(),
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub user_count: usize,
    pub message_count: usize,
}

/// What a session receives after a successful join.
#[derive(Serialize, Debug, Clone)]
pub struct RoomSnapshot {
    pub room: RoomSummary,
    pub messages: Vec<Message>,
    pub users: Vec<Member>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MembershipChange {
    pub room_id: RoomId,
    pub username: String,
    pub users: Vec<Member>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoomDeleted {
    pub room_id: RoomId,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
}
