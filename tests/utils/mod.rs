#![allow(dead_code)]

pub mod fake_rtc;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::Level;

use tandem::chat::UiEvent;
use tandem::peer::{Event, Handshake, HandshakeConfig};
use tandem::rtc::{LocalStream, LocalTrack, TrackKind};
use tandem::signaling::{ClientMessage, PeerId, PeerInfo, RoomName, Roster, SignalingMessage};
use tandem::transport::{Joined, TransportEvent, TransportHandle};

pub use fake_rtc::{Call, FailAt, FakeConnector};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A handshake wired to a fake connector and in-memory channels
pub struct TestPeer {
    pub id: PeerId,
    pub handshake: Handshake,
    pub inbox: mpsc::UnboundedReceiver<Event>,
    pub outbound: mpsc::UnboundedReceiver<ClientMessage>,
    pub ui: mpsc::UnboundedReceiver<UiEvent>,
    pub connector: Arc<FakeConnector>,
}

impl TestPeer {
    pub fn new(id: &str) -> Self {
        Self::with_connector(id, FakeConnector::default())
    }

    pub fn with_connector(id: &str, connector: FakeConnector) -> Self {
        let connector = Arc::new(connector);
        let (out_tx, outbound) = mpsc::unbounded_channel();
        let (ui_tx, ui) = mpsc::unbounded_channel();
        let transport = TransportHandle::from_parts(RoomName::parse("default").unwrap(), out_tx);
        let (handshake, inbox) =
            Handshake::new(HandshakeConfig::default(), connector.clone(), transport, ui_tx);
        Self {
            id: PeerId::try_from(id).unwrap(),
            handshake,
            inbox,
            outbound,
            ui,
            connector,
        }
    }

    pub async fn media_ready(&mut self) {
        self.handshake
            .handle(Event::MediaReady(test_stream()))
            .await
            .expect("media");
    }

    pub async fn join(&mut self, others: &[&TestPeer]) {
        let roster: Roster = others
            .iter()
            .map(|p| {
                (
                    p.id,
                    PeerInfo {
                        id: p.id,
                        public_addr: None,
                    },
                )
            })
            .collect();
        self.handshake
            .handle(Event::Joined(Joined {
                room: RoomName::parse("default").unwrap(),
                local_id: self.id,
                roster,
            }))
            .await
            .expect("join");
    }

    pub async fn receive(
        &mut self,
        from: PeerId,
        message: SignalingMessage,
    ) -> Result<(), tandem::peer::HandshakeError> {
        self.handshake
            .handle(Event::Transport(TransportEvent::Signal { from, message }))
            .await
    }

    /// Feed queued RTC callbacks back into the handshake
    pub async fn pump(&mut self) {
        while let Ok(event) = self.inbox.try_recv() {
            let _ = self.handshake.handle(event).await;
        }
    }

    /// Signaling payloads sent so far
    pub fn sent(&mut self) -> Vec<SignalingMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.outbound.try_recv() {
            if let ClientMessage::Message { message, .. } = msg {
                out.push(serde_json::from_value(message).expect("valid payload"));
            }
        }
        out
    }

    pub fn ui_events(&mut self) -> Vec<UiEvent> {
        let mut out = Vec::new();
        while let Ok(e) = self.ui.try_recv() {
            out.push(e);
        }
        out
    }
}

pub fn test_stream() -> LocalStream {
    LocalStream {
        id: "stream_test".to_string(),
        tracks: vec![
            LocalTrack {
                id: "stream_test_audio".to_string(),
                kind: TrackKind::Audio,
            },
            LocalTrack {
                id: "stream_test_video".to_string(),
                kind: TrackKind::Video,
            },
        ],
    }
}

pub fn candidate(n: u32) -> SignalingMessage {
    SignalingMessage::Candidate {
        candidate: format!("candidate:{} 1 udp 2122260223 10.0.0.{} 5000 typ host", n, n),
        sdp_mid: Some("0".to_string()),
        sdp_mline_index: Some(0),
    }
}
