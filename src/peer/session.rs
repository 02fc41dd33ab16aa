use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::machine::Event;
use super::state::HandshakeError;
use crate::rtc::{
    DataChannel, IceCandidate, LocalStream, PeerConnection, PeerConnector, RtcError,
    RtcEventSender, SessionDescription,
};
use crate::signaling::PeerId;

/// One peer pairing: the peer connection, its chat channel, and the
/// remote candidates that arrived before the remote description.
pub struct ConnectionSession {
    generation: u64,
    pc: Arc<dyn PeerConnection>,
    data_channel: Option<Arc<dyn DataChannel>>,
    remote: Option<PeerId>,
    remote_description_set: bool,
    pending_candidates: Vec<IceCandidate>,
}

impl ConnectionSession {
    /// Create the peer connection and attach local media
    pub async fn open(
        connector: &dyn PeerConnector,
        generation: u64,
        inbox: mpsc::UnboundedSender<Event>,
        stream: &LocalStream,
    ) -> Result<Self, RtcError> {
        let pc = connector
            .connect(RtcEventSender::new(generation, inbox))
            .await?;
        if let Err(e) = pc.add_local_stream(stream).await {
            let _ = pc.close().await;
            return Err(e);
        }

        Ok(Self {
            generation,
            pc,
            data_channel: None,
            remote: None,
            remote_description_set: false,
            pending_candidates: Vec::new(),
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connection(&self) -> &Arc<dyn PeerConnection> {
        &self.pc
    }

    pub fn data_channel(&self) -> Option<&Arc<dyn DataChannel>> {
        self.data_channel.as_ref()
    }

    pub fn set_data_channel(&mut self, channel: Arc<dyn DataChannel>) {
        if let Some(old) = self.data_channel.replace(channel) {
            warn!("Replacing data channel {}", old.label());
        }
    }

    pub fn remote(&self) -> Option<PeerId> {
        self.remote
    }

    /// Accept a message from `from`, binding the session to it if unbound
    pub fn bind_remote(&mut self, from: PeerId, kind: &'static str) -> Result<(), HandshakeError> {
        match self.remote {
            Some(remote) if remote != from => Err(HandshakeError::ForeignPeer { kind, from, remote }),
            Some(_) => Ok(()),
            None => {
                debug!("Session bound to {}", from);
                self.remote = Some(from);
                Ok(())
            }
        }
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Set the remote description, then flush candidates buffered before it
    pub async fn set_remote_description(
        &mut self,
        desc: SessionDescription,
    ) -> Result<(), RtcError> {
        self.pc.set_remote_description(desc).await?;
        self.remote_description_set = true;

        let pending = std::mem::take(&mut self.pending_candidates);
        if !pending.is_empty() {
            debug!("Applying {} buffered remote candidates", pending.len());
        }
        for candidate in pending {
            if let Err(e) = self.pc.add_ice_candidate(candidate).await {
                warn!("Buffered candidate rejected: {}", e);
            }
        }
        Ok(())
    }

    /// Apply a remote candidate now, or hold it until the remote description is set
    pub async fn add_remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), RtcError> {
        if self.remote_description_set {
            self.pc.add_ice_candidate(candidate).await
        } else {
            self.pending_candidates.push(candidate);
            Ok(())
        }
    }

    pub async fn close(self) {
        if let Some(dc) = &self.data_channel {
            if let Err(e) = dc.close().await {
                debug!("Data channel close: {}", e);
            }
        }
        if let Err(e) = self.pc.close().await {
            warn!("Peer connection close failed: {}", e);
        }
    }
}
