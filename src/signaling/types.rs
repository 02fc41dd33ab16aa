use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Utf8Bytes;

/// Rendezvous server errors
#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("invalid room name")]
    InvalidRoom,

    #[error("room full: {0}")]
    RoomFull(RoomName),

    #[error("not in a room")]
    NotInRoom,

    #[error("invalid peer id: {0:?}")]
    InvalidPeerId(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Two-party rooms only.
pub const MAX_ROOM_PEERS: usize = 2;

const PEER_ID_LEN: usize = 13;
const HEX_CHARS: &[u8] = b"0123456789abcdef";

/// Free-form room name chosen by the clients
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomName(String);

impl RoomName {
    pub fn parse(s: &str) -> Result<Self, SignalingError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SignalingError::InvalidRoom);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Peer ID: 13-byte fixed array ("peer_" + 8 hex)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId {
    bytes: [u8; PEER_ID_LEN],
    len: u8,
}

impl PeerId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; PEER_ID_LEN];
        bytes[..5].copy_from_slice(b"peer_");

        let mut rng = rand::rng();
        let value: u32 = rng.random();

        for i in 0..8 {
            let nibble = ((value >> (28 - i * 4)) & 0xF) as usize;
            bytes[5 + i] = HEX_CHARS[nibble];
        }
        Self {
            bytes,
            len: PEER_ID_LEN as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for PeerId {
    type Error = SignalingError;

    /// Ids longer than the fixed width are rejected, never cut.
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let src = s.as_bytes();
        if src.is_empty() || src.len() > PEER_ID_LEN {
            return Err(SignalingError::InvalidPeerId(s.to_string()));
        }
        let mut bytes = [0u8; PEER_ID_LEN];
        bytes[..src.len()].copy_from_slice(src);
        Ok(Self {
            bytes,
            len: src.len() as u8,
        })
    }
}

impl Serialize for PeerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PeerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PeerId::try_from(s.as_str()).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub id: PeerId,
    pub public_addr: Option<SocketAddr>,
}

/// Other members of a room at the moment of joining, keyed by peer id.
pub type Roster = HashMap<PeerId, PeerInfo>;

/// Wrapper for outbound WebSocket messages using tungstenite's Utf8Bytes.
#[derive(Debug, Clone)]
pub struct OutboundMessage(Utf8Bytes);

impl OutboundMessage {
    pub fn into_inner(self) -> Utf8Bytes {
        self.0
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        Self(Utf8Bytes::from(s))
    }
}

#[derive(Debug)]
pub(crate) struct PeerState {
    pub info: PeerInfo,
    /// Relayed payloads are cloned once per member, so this carries
    /// the cheap-to-clone Utf8Bytes wrapper.
    pub tx: mpsc::UnboundedSender<OutboundMessage>,
}

#[derive(Debug)]
pub(crate) struct Room {
    pub peers: HashMap<PeerId, PeerState>,
}

impl Room {
    pub fn broadcast(&self, msg: &OutboundMessage) {
        for peer in self.peers.values() {
            let _ = peer.tx.send(msg.clone());
        }
    }
}
