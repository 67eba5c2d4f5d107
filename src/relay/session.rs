use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;
use uuid::Uuid;

use crate::error::{RelayError, RelayResult};

use super::{RoomId, SessionId, protocol::ServerEvent};

const MAX_USERNAME_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Active { room: Option<RoomId> },
    Disconnected,
}

/// One live connection as the relay sees it.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub username: String,
    outbox: mpsc::Sender<ServerEvent>,
    lagging: bool,
}

impl Session {
    /// Handshake: a session only comes into existence with a usable username.
    pub fn connect(
        username: Option<&str>,
        outbox_capacity: usize,
    ) -> RelayResult<(Self, mpsc::Receiver<ServerEvent>)> {
        let username = validate_username(username)?;
        let (outbox, events) = mpsc::channel(outbox_capacity);

        let session = Self {
            id: Uuid::now_v7(),
            username: username.to_owned(),
            outbox,
            lagging: false,
        };
        Ok((session, events))
    }

    /// Queues `event` without waiting. Once the queue overflows or the
    /// connection is gone the session is lagging and receives nothing more.
    pub fn push(&mut self, event: ServerEvent) {
        if self.lagging {
            return;
        }

        match self.outbox.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(session = %self.id, username = %self.username, "outbound queue full, dropping session");
                self.lagging = true;
            }
            Err(TrySendError::Closed(_)) => self.lagging = true,
        }
    }

    pub fn is_lagging(&self) -> bool {
        self.lagging
    }
}

fn validate_username(username: Option<&str>) -> RelayResult<&str> {
    let username = username.map(str::trim).unwrap_or_default();
    if username.is_empty() {
        return Err(RelayError::MissingUsername);
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(RelayError::InvalidUsername {
            max: MAX_USERNAME_LEN,
        });
    }
    Ok(username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_is_required() {
        assert_eq!(validate_username(None).unwrap_err(), RelayError::MissingUsername);
        assert_eq!(
            validate_username(Some("   ")).unwrap_err(),
            RelayError::MissingUsername
        );
        assert_eq!(validate_username(Some(" alice ")).unwrap(), "alice");
        assert!(validate_username(Some(&"a".repeat(33))).is_err());
    }

    #[test]
    fn full_outbox_marks_session_lagging() {
        let (mut session, mut events) = Session::connect(Some("alice"), 1).unwrap();

        session.push(ServerEvent::RoomsList(Vec::new()));
        assert!(!session.is_lagging());
        session.push(ServerEvent::RoomsList(Vec::new()));
        assert!(session.is_lagging());

        // once lagging, nothing more is queued even if the reader catches up
        assert!(events.try_recv().is_ok());
        session.push(ServerEvent::RoomsList(Vec::new()));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn closed_connection_marks_session_lagging() {
        let (mut session, events) = Session::connect(Some("alice"), 4).unwrap();
        drop(events);
        session.push(ServerEvent::RoomsList(Vec::new()));
        assert!(session.is_lagging());
    }
}
