use std::collections::HashMap;
use std::net::SocketAddr;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::messages::{ServerMessage, SignalingMessage};
use super::types::{
    MAX_ROOM_PEERS, OutboundMessage, PeerId, PeerInfo, PeerState, Room, RoomName, Roster,
    SignalingError,
};

/// Commands sent to the room manager actor
pub(crate) enum RoomCommand {
    Join {
        room: RoomName,
        addr: SocketAddr,
        peer_tx: mpsc::UnboundedSender<OutboundMessage>,
        reply: oneshot::Sender<Result<(PeerId, Roster), SignalingError>>,
    },
    Relay {
        from: PeerId,
        to: String,
        message: Value,
    },
    Leave {
        peer_id: PeerId,
    },
}

fn encode(msg: &ServerMessage) -> OutboundMessage {
    let json = serde_json::to_string(msg).expect("ServerMessage serialization should never fail");
    OutboundMessage::from(json)
}

pub(crate) async fn room_manager_actor(mut rx: mpsc::Receiver<RoomCommand>) {
    let mut rooms: HashMap<RoomName, Room> = HashMap::new();
    let mut peer_rooms: HashMap<PeerId, RoomName> = HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RoomCommand::Join {
                room: name,
                addr,
                peer_tx,
                reply,
            } => {
                let room = rooms.entry(name.clone()).or_insert_with(|| {
                    info!("Room created: {}", name);
                    Room {
                        peers: HashMap::new(),
                    }
                });

                let result = if room.peers.len() >= MAX_ROOM_PEERS {
                    warn!("Join rejected, room {} is full", name);
                    Err(SignalingError::RoomFull(name))
                } else {
                    let peer_id = PeerId::generate();
                    let roster: Roster = room.peers.iter().map(|(id, p)| (*id, p.info)).collect();

                    room.peers.insert(
                        peer_id,
                        PeerState {
                            info: PeerInfo {
                                id: peer_id,
                                public_addr: Some(addr),
                            },
                            tx: peer_tx,
                        },
                    );
                    peer_rooms.insert(peer_id, name.clone());

                    info!(
                        "Peer {} joined room {} ({} already present)",
                        peer_id,
                        name,
                        roster.len()
                    );
                    Ok((peer_id, roster))
                };

                let _ = reply.send(result);
            }

            RoomCommand::Relay { from, to, message } => {
                let Some(room) = peer_rooms.get(&from).and_then(|name| rooms.get(name)) else {
                    debug!("Dropping relay from {}: not in a room", from);
                    continue;
                };
                room.broadcast(&encode(&ServerMessage::Message { from, to, message }));
            }

            RoomCommand::Leave { peer_id } => {
                let Some(name) = peer_rooms.remove(&peer_id) else {
                    continue;
                };
                if let Some(room) = rooms.get_mut(&name) {
                    room.peers.remove(&peer_id);

                    if room.peers.is_empty() {
                        rooms.remove(&name);
                        info!("Room {} removed (empty)", name);
                    } else {
                        room.broadcast(&encode(&ServerMessage::Message {
                            from: peer_id,
                            to: name.to_string(),
                            message: SignalingMessage::Remove.to_value(),
                        }));
                    }
                }
                info!("Peer {} left room {}", peer_id, name);
            }
        }
    }
}

/// Handle to communicate with the room manager actor
#[derive(Clone)]
pub struct RoomManagerHandle {
    pub(crate) tx: mpsc::Sender<RoomCommand>,
}

impl RoomManagerHandle {
    /// Join a room by name, creating it if needed
    pub async fn join_room(
        &self,
        room: RoomName,
        addr: SocketAddr,
        peer_tx: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Result<(PeerId, Roster), SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self
            .tx
            .send(RoomCommand::Join {
                room,
                addr,
                peer_tx,
                reply: reply_tx,
            })
            .await;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))?
    }

    /// Relay a payload to every member of the sender's room
    pub async fn relay(&self, from: PeerId, to: String, message: Value) {
        let _ = self
            .tx
            .send(RoomCommand::Relay { from, to, message })
            .await;
    }

    /// Leave the current room
    pub async fn leave_room(&self, peer_id: &PeerId) {
        let _ = self.tx.send(RoomCommand::Leave { peer_id: *peer_id }).await;
    }
}
