use tokio::{
    sync::{mpsc, oneshot},
    task::{JoinError, JoinHandle},
};
use tracing::{error, info, warn};

use crate::{
    config::RelayLimits,
    error::{RelayError, RelayResult},
};

use super::{
    RelayService, SessionId, Stats,
    protocol::{ClientEvent, RoomSummary, ServerEvent},
};

pub struct Connected {
    pub session_id: SessionId,
    pub events: mpsc::Receiver<ServerEvent>,
}

enum Command {
    Connect {
        username: Option<String>,
        reply: oneshot::Sender<RelayResult<Connected>>,
    },
    Event {
        session_id: SessionId,
        event: ClientEvent,
    },
    Reject {
        session_id: SessionId,
        error: RelayError,
    },
    Disconnect {
        session_id: SessionId,
    },
    ListRooms {
        reply: oneshot::Sender<Vec<RoomSummary>>,
    },
    CreateRoom {
        name: String,
        description: Option<String>,
        reply: oneshot::Sender<RelayResult<RoomSummary>>,
    },
    DeleteRoom {
        room_id: String,
        reply: oneshot::Sender<RelayResult<()>>,
    },
    Stats {
        reply: oneshot::Sender<Stats>,
    },
}

/// Cloneable entry point to the relay task. The task owns the
/// [`RelayService`] and applies commands strictly one at a time.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<Command>,
}

impl RelayHandle {
    pub fn spawn(limits: RelayLimits, command_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(command_capacity);
        let task = tokio::spawn(run(RelayService::new(limits), rx));
        tokio::spawn(watch(task));
        Self { tx }
    }

    pub async fn connect(&self, username: Option<String>) -> RelayResult<Connected> {
        self.request(|reply| Command::Connect { username, reply })
            .await?
    }

    pub async fn dispatch(&self, session_id: SessionId, event: ClientEvent) -> RelayResult<()> {
        self.send(Command::Event { session_id, event }).await
    }

    pub async fn reject(&self, session_id: SessionId, error: RelayError) -> RelayResult<()> {
        self.send(Command::Reject { session_id, error }).await
    }

    pub async fn disconnect(&self, session_id: SessionId) -> RelayResult<()> {
        self.send(Command::Disconnect { session_id }).await
    }

    pub async fn list_rooms(&self) -> RelayResult<Vec<RoomSummary>> {
        self.request(|reply| Command::ListRooms { reply }).await
    }

    pub async fn create_room(
        &self,
        name: String,
        description: Option<String>,
    ) -> RelayResult<RoomSummary> {
        self.request(|reply| Command::CreateRoom {
            name,
            description,
            reply,
        })
        .await?
    }

    pub async fn delete_room(&self, room_id: String) -> RelayResult<()> {
        self.request(|reply| Command::DeleteRoom { room_id, reply })
            .await?
    }

    pub async fn stats(&self) -> RelayResult<Stats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    async fn send(&self, command: Command) -> RelayResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| RelayError::Unavailable)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> RelayResult<T> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply)).await?;
        rx.await.map_err(|_| RelayError::Unavailable)
    }
}

async fn run(mut service: RelayService, mut rx: mpsc::Receiver<Command>) {
    info!("relay started");
    while let Some(command) = rx.recv().await {
        apply(&mut service, command);
    }
    info!("relay stopped");
}

/// Reports how the relay task ended. After a panic every handle answers
/// `Unavailable`, so the failure has to be visible in the logs.
async fn watch(task: JoinHandle<()>) -> Result<(), JoinError> {
    let result = task.await;
    if let Err(err) = &result {
        error!("relay task failed: {err}");
    }
    result
}

fn apply(service: &mut RelayService, command: Command) {
    match command {
        Command::Connect { username, reply } => {
            let result = service
                .connect(username.as_deref())
                .map(|(session_id, events)| Connected { session_id, events });
            if let Err(Ok(Connected { session_id, .. })) = reply.send(result) {
                // the connection task went away mid-handshake
                service.disconnect(session_id);
            }
        }
        Command::Event { session_id, event } => service.handle(session_id, event),
        Command::Reject { session_id, error } => {
            warn!(session = %session_id, code = error.code(), "rejected inbound frame");
            service.reject(session_id, &error);
        }
        Command::Disconnect { session_id } => service.disconnect(session_id),
        Command::ListRooms { reply } => {
            let _ = reply.send(service.room_list());
        }
        Command::CreateRoom {
            name,
            description,
            reply,
        } => {
            let _ = reply.send(service.create_room(&name, description.as_deref()));
        }
        Command::DeleteRoom { room_id, reply } => {
            let _ = reply.send(service.delete_room(&room_id));
        }
        Command::Stats { reply } => {
            let _ = reply.send(service.stats());
        }
    }
}
