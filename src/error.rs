use thiserror::Error;

pub type RelayResult<T> = Result<T, RelayError>;

/// Everything the relay can refuse. Only `MissingUsername` and `InvalidUsername`
/// end a connection; the rest are reported to the requester and the session
/// stays usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Username is required")]
    MissingUsername,

    #[error("Username must be at most {max} characters")]
    InvalidUsername { max: usize },

    #[error("Room not found")]
    RoomNotFound,

    #[error("Room name already exists")]
    DuplicateName,

    #[error("Room name must be between {min} and {max} characters")]
    InvalidName { min: usize, max: usize },

    #[error("Room cannot be deleted")]
    Protected,

    #[error("Not in room")]
    NotInRoom,

    #[error("Message cannot be empty")]
    EmptyContent,

    #[error("Message too long (max {max} characters)")]
    ContentTooLong { max: usize },

    #[error("Room limit reached")]
    RoomLimitReached,

    #[error("Room is full")]
    RoomFull,

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Relay unavailable")]
    Unavailable,
}

impl RelayError {
    /// Stable identifier clients can branch on; the display text may change.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::MissingUsername => "missing_username",
            RelayError::InvalidUsername { .. } => "invalid_username",
            RelayError::RoomNotFound => "room_not_found",
            RelayError::DuplicateName => "duplicate_name",
            RelayError::InvalidName { .. } => "invalid_name",
            RelayError::Protected => "protected",
            RelayError::NotInRoom => "not_in_room",
            RelayError::EmptyContent => "empty_content",
            RelayError::ContentTooLong { .. } => "content_too_long",
            RelayError::RoomLimitReached => "room_limit_reached",
            RelayError::RoomFull => "room_full",
            RelayError::MalformedEvent(_) => "malformed_event",
            RelayError::Unavailable => "unavailable",
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::MissingUsername | RelayError::InvalidUsername { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_errors_are_fatal() {
        assert!(RelayError::MissingUsername.is_fatal());
        assert!(RelayError::InvalidUsername { max: 32 }.is_fatal());
        assert!(!RelayError::RoomNotFound.is_fatal());
        assert!(!RelayError::ContentTooLong { max: 500 }.is_fatal());
    }

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(
            RelayError::ContentTooLong { max: 500 }.to_string(),
            "Message too long (max 500 characters)"
        );
        assert_eq!(RelayError::NotInRoom.code(), "not_in_room");
    }
}
