use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{PeerId, RoomName, Roster};

/// Messages sent from client to server
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join (or create) a named room
    #[serde(rename = "join")]
    Join { room: String },

    /// Relay an opaque payload to every member of the current room
    #[serde(rename = "message")]
    Message { to: String, message: Value },

    /// Leave the current room
    #[serde(rename = "leave")]
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Join accepted; `roster` lists the peers that were already present
    #[serde(rename = "joined")]
    Joined {
        room: RoomName,
        your_id: PeerId,
        roster: Roster,
    },

    /// Relayed payload. The sender receives its own copy too.
    #[serde(rename = "message")]
    Message {
        from: PeerId,
        to: String,
        message: Value,
    },

    /// Error response
    #[serde(rename = "error")]
    Error { message: String },
}

/// Handshake payload carried inside relayed `message` envelopes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    /// Announces a joiner that is about to send an offer
    Init,
    Offer {
        sdp: String,
    },
    Answer {
        sdp: String,
    },
    Candidate {
        candidate: String,
        sdp_mid: Option<String>,
        sdp_mline_index: Option<u16>,
    },
    /// The sender is gone; tear down the session
    Remove,
}

impl SignalingMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SignalingMessage::Init => "init",
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
            SignalingMessage::Candidate { .. } => "candidate",
            SignalingMessage::Remove => "remove",
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
