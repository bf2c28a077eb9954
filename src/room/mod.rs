//! 방 상태 머신과 레지스트리

pub mod gate;
pub mod message;
pub mod participant;
pub mod registry;
#[allow(clippy::module_inception)]
pub mod room;

pub use gate::NegotiationGate;
pub use message::{Message, MessageKind};
pub use participant::{Participant, Role};
pub use registry::{Resolution, RoomRegistry, TeardownPolicy};
pub use room::{JoinOutcome, Room, Routing, DEFAULT_WAITING_LIMIT, ROOM_CAPACITY};
