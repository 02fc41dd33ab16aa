//! Client side of the rendezvous protocol
//!
//! Outbound payloads are fire-and-forget. Inbound relays are filtered for
//! self-echo before they reach the handshake.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::signaling::{ClientMessage, PeerId, RoomName, Roster, ServerMessage, SignalingMessage};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed server message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("join rejected: {0}")]
    Rejected(String),

    #[error("connection closed before join completed")]
    Closed,
}

/// Result of joining a room
#[derive(Debug, Clone)]
pub struct Joined {
    pub room: RoomName,
    pub local_id: PeerId,
    pub roster: Roster,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Signal {
        from: PeerId,
        message: SignalingMessage,
    },
    Lost,
}

/// Outcome of decoding one inbound text frame
#[derive(Debug, PartialEq)]
pub enum Inbound {
    Signal {
        from: PeerId,
        message: SignalingMessage,
    },
    Echo,
    Discarded,
}

/// Classify a server frame for a client whose id is `local_id`
pub fn decode_inbound(local_id: &PeerId, text: &str) -> Inbound {
    let msg: ServerMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("Discarding malformed server message: {}", e);
            return Inbound::Discarded;
        }
    };

    match msg {
        ServerMessage::Message { from, .. } if from == *local_id => Inbound::Echo,
        ServerMessage::Message { from, message, .. } => {
            let kind = message
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("<missing>")
                .to_string();
            match serde_json::from_value::<SignalingMessage>(message) {
                Ok(message) => Inbound::Signal { from, message },
                Err(e) => {
                    warn!("Unknown message type \"{}\" from {}: {}", kind, from, e);
                    Inbound::Discarded
                }
            }
        }
        ServerMessage::Error { message } => {
            warn!("Server error: {}", message);
            Inbound::Discarded
        }
        ServerMessage::Joined { .. } => {
            warn!("Unexpected joined message after join");
            Inbound::Discarded
        }
    }
}

/// Sends signaling payloads to the room. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    room: RoomName,
    tx: mpsc::UnboundedSender<ClientMessage>,
}

impl TransportHandle {
    /// Build a handle over an arbitrary outbound queue
    pub fn from_parts(room: RoomName, tx: mpsc::UnboundedSender<ClientMessage>) -> Self {
        Self { room, tx }
    }

    pub fn send(&self, message: SignalingMessage) {
        debug!(">>> SENT: {}", message.kind());
        let out = ClientMessage::Message {
            to: self.room.to_string(),
            message: message.to_value(),
        };
        if self.tx.send(out).is_err() {
            warn!("Transport writer gone, dropped {}", message.kind());
        }
    }

    pub fn leave(&self) {
        let _ = self.tx.send(ClientMessage::Leave);
    }
}

/// Connect to the rendezvous server and join `room`.
///
/// Returns the join result, a handle for outbound payloads and the stream of
/// inbound events. The stream ends with a single `TransportEvent::Lost`.
pub async fn connect(
    url: &str,
    room: &str,
) -> Result<(Joined, TransportHandle, mpsc::UnboundedReceiver<TransportEvent>), TransportError> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(url).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let join = ClientMessage::Join {
        room: room.to_string(),
    };
    ws_tx
        .send(Message::Text(serde_json::to_string(&join)?.into()))
        .await?;

    let joined = loop {
        let msg = match ws_rx.next().await {
            Some(m) => m?,
            None => return Err(TransportError::Closed),
        };
        match msg {
            Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text)? {
                ServerMessage::Joined {
                    room,
                    your_id,
                    roster,
                } => {
                    break Joined {
                        room,
                        local_id: your_id,
                        roster,
                    };
                }
                ServerMessage::Error { message } => return Err(TransportError::Rejected(message)),
                ServerMessage::Message { .. } => continue,
            },
            Message::Close(_) => return Err(TransportError::Closed),
            _ => continue,
        }
    };

    info!(
        "Joined room {} as {} ({} peers present)",
        joined.room,
        joined.local_id,
        joined.roster.len()
    );

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientMessage>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<TransportEvent>();

    tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    warn!("Failed to encode outbound message: {}", e);
                    continue;
                }
            };
            if let Err(e) = ws_tx.send(Message::Text(json.into())).await {
                warn!("Send failed: {}", e);
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let local_id = joined.local_id;
    tokio::spawn(async move {
        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Text(text)) => match decode_inbound(&local_id, &text) {
                    Inbound::Signal { from, message } => {
                        debug!("<<< RECEIVED: {} from {}", message.kind(), from);
                        if event_tx
                            .send(TransportEvent::Signal { from, message })
                            .is_err()
                        {
                            return;
                        }
                    }
                    Inbound::Echo | Inbound::Discarded => {}
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket error: {}", e);
                    break;
                }
            }
        }
        info!("Signaling connection lost");
        let _ = event_tx.send(TransportEvent::Lost);
    });

    let handle = TransportHandle {
        room: joined.room.clone(),
        tx: out_tx,
    };
    Ok((joined, handle, event_rx))
}
