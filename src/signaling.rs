//! WebSocket rendezvous server: named two-party rooms and verbatim relay

mod actor;
mod messages;
mod server;
mod types;

pub use actor::RoomManagerHandle;
pub use messages::{ClientMessage, ServerMessage, SignalingMessage};
pub use server::{DEFAULT_SIGNALING_PORT, SignalingServer};
pub use types::{
    MAX_ROOM_PEERS, OutboundMessage, PeerId, PeerInfo, RoomName, Roster, SignalingError,
};
