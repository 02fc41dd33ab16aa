use std::fmt;

use thiserror::Error;

use crate::chat::ChatError;
use crate::rtc::{MediaError, RtcError};
use crate::signaling::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    /// A session was requested but local media is not ready yet
    AwaitingLocalMedia,
    Created,
    OfferSent,
    /// Answering side, waiting for the remote offer
    AwaitingOffer,
    /// Answering side, answer sent
    OfferReceived,
    Connected,
    Closed,
}

impl HandshakeState {
    /// A peer connection exists for this state
    pub fn has_connection(self) -> bool {
        matches!(
            self,
            HandshakeState::Created
                | HandshakeState::OfferSent
                | HandshakeState::AwaitingOffer
                | HandshakeState::OfferReceived
                | HandshakeState::Connected
        )
    }

    pub fn is_active(self) -> bool {
        self.has_connection() || self == HandshakeState::AwaitingLocalMedia
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandshakeState::Idle => "idle",
            HandshakeState::AwaitingLocalMedia => "awaiting-local-media",
            HandshakeState::Created => "created",
            HandshakeState::OfferSent => "offer-sent",
            HandshakeState::AwaitingOffer => "awaiting-offer",
            HandshakeState::OfferReceived => "offer-received",
            HandshakeState::Connected => "connected",
            HandshakeState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("media acquisition failed: {0}")]
    Media(#[from] MediaError),

    #[error("negotiation failed: {0}")]
    Rtc(#[from] RtcError),

    #[error("{kind} received with no peer connection (state {state})")]
    NoSession {
        kind: &'static str,
        state: HandshakeState,
    },

    #[error("init from {from} while a session is already {state}")]
    SessionActive {
        from: PeerId,
        state: HandshakeState,
    },

    #[error("offer received in state {0}")]
    UnexpectedOffer(HandshakeState),

    #[error("answer received in state {0}")]
    UnexpectedAnswer(HandshakeState),

    #[error("{kind} from {from}, but the session belongs to {remote}")]
    ForeignPeer {
        kind: &'static str,
        from: PeerId,
        remote: PeerId,
    },

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("join result received twice")]
    AlreadyJoined,
}

impl HandshakeError {
    /// Errors that end the client rather than a single message
    pub fn is_fatal(&self) -> bool {
        matches!(self, HandshakeError::Media(_))
    }

    /// Failures of the negotiation chain itself, as opposed to bad input
    pub fn is_negotiation(&self) -> bool {
        matches!(self, HandshakeError::Rtc(_))
    }
}
