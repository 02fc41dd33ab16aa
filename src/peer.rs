//! Room role negotiation and the offer/answer/candidate handshake

mod machine;
mod role;
mod session;
mod state;

pub use machine::{Event, Handshake, HandshakeConfig};
pub use role::PeerRole;
pub use session::ConnectionSession;
pub use state::{HandshakeError, HandshakeState};
