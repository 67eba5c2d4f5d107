mod handle;
mod log;
mod presence;
pub mod protocol;
mod registry;
mod service;
mod session;

use uuid::Uuid;

pub use handle::{Connected, RelayHandle};
pub use log::Message;
pub use presence::Member;
pub use service::Stats;

use log::MessageLog;
use presence::{Joined, PresenceTracker};
use registry::{Room, RoomRegistry};
use service::RelayService;
use session::{Session, SessionState};

pub type RoomId = String;
pub type SessionId = Uuid;
