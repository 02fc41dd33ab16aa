//! Peer-connection and media seams
//!
//! The handshake only talks to these traits. `native` backs them with
//! webrtc-rs; tests substitute a recording fake.

mod media;
pub mod native;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub use media::{LocalStream, LocalTrack, MediaConstraints, MediaError, MediaSource, SyntheticMedia, TrackKind};

use crate::peer::Event;

/// Label of the chat data channel created by the offering side
pub const CHAT_CHANNEL_LABEL: &str = "chat";

#[derive(Debug, Error)]
pub enum RtcError {
    #[error("peer connection setup failed: {0}")]
    Setup(String),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("data channel error: {0}")]
    Channel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpKind::Offer => f.write_str("offer"),
            SdpKind::Answer => f.write_str("answer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

/// Callbacks raised by a peer connection or one of its data channels
pub enum RtcEvent {
    LocalCandidate(IceCandidate),
    /// Channel announced by the remote (offering) side
    DataChannel(Arc<dyn DataChannel>),
    ChannelOpen,
    ChannelMessage(String),
    ChannelClosed,
    RemoteTrack { kind: String },
}

impl fmt::Debug for RtcEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtcEvent::LocalCandidate(c) => f.debug_tuple("LocalCandidate").field(c).finish(),
            RtcEvent::DataChannel(dc) => f.debug_tuple("DataChannel").field(&dc.label()).finish(),
            RtcEvent::ChannelOpen => f.write_str("ChannelOpen"),
            RtcEvent::ChannelMessage(m) => f.debug_tuple("ChannelMessage").field(m).finish(),
            RtcEvent::ChannelClosed => f.write_str("ChannelClosed"),
            RtcEvent::RemoteTrack { kind } => {
                f.debug_struct("RemoteTrack").field("kind", kind).finish()
            }
        }
    }
}

/// Delivers RTC callbacks into the handshake inbox, stamped with the
/// generation of the session that registered them.
#[derive(Clone)]
pub struct RtcEventSender {
    generation: u64,
    tx: mpsc::UnboundedSender<Event>,
}

impl RtcEventSender {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn emit(&self, event: RtcEvent) {
        let _ = self.tx.send(Event::Rtc {
            generation: self.generation,
            event,
        });
    }
}

#[async_trait]
pub trait DataChannel: Send + Sync {
    fn label(&self) -> String;

    async fn send_text(&self, text: &str) -> Result<(), RtcError>;

    async fn close(&self) -> Result<(), RtcError>;
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn add_local_stream(&self, stream: &LocalStream) -> Result<(), RtcError>;

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>, RtcError>;

    async fn create_offer(&self) -> Result<SessionDescription, RtcError>;

    async fn create_answer(&self) -> Result<SessionDescription, RtcError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), RtcError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), RtcError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), RtcError>;

    async fn close(&self) -> Result<(), RtcError>;
}

/// Factory for peer connections; one call per session
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(&self, events: RtcEventSender) -> Result<Arc<dyn PeerConnection>, RtcError>;
}
