//! webrtc-rs backed peer connections

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use super::{
    DataChannel, IceCandidate, LocalStream, PeerConnection, PeerConnector, RtcError, RtcEvent,
    RtcEventSender, SdpKind, SessionDescription, TrackKind,
};

fn negotiation(e: webrtc::Error) -> RtcError {
    RtcError::Negotiation(e.to_string())
}

/// Builds one RTCPeerConnection per session
#[derive(Debug, Clone, Default)]
pub struct WebRtcConnector {
    ice_servers: Vec<String>,
}

impl WebRtcConnector {
    pub fn new(ice_servers: Vec<String>) -> Self {
        Self { ice_servers }
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(&self, events: RtcEventSender) -> Result<Arc<dyn PeerConnection>, RtcError> {
        let setup = |e: webrtc::Error| RtcError::Setup(e.to_string());

        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(setup)?;
        let registry =
            register_default_interceptors(Registry::new(), &mut media_engine).map_err(setup)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = if self.ice_servers.is_empty() {
            vec![]
        } else {
            vec![RTCIceServer {
                urls: self.ice_servers.clone(),
                ..Default::default()
            }]
        };
        let config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(config).await.map_err(setup)?);

        let ice_events = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(c) = candidate else {
                    debug!("ICE gathering complete");
                    return;
                };
                match c.to_json() {
                    Ok(init) => events.emit(RtcEvent::LocalCandidate(IceCandidate {
                        candidate: init.candidate,
                        sdp_mid: init.sdp_mid,
                        sdp_mline_index: init.sdp_mline_index,
                    })),
                    Err(e) => debug!("Skipping unserializable candidate: {}", e),
                }
            })
        }));

        let dc_events = events.clone();
        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let events = dc_events.clone();
            Box::pin(async move {
                debug!("Remote data channel announced: {}", dc.label());
                wire_channel(&dc, &events);
                events.emit(RtcEvent::DataChannel(Arc::new(NativeDataChannel(dc))));
            })
        }));

        let track_events = events.clone();
        pc.on_track(Box::new(move |track, _, _| {
            let events = track_events.clone();
            Box::pin(async move {
                events.emit(RtcEvent::RemoteTrack {
                    kind: track.kind().to_string(),
                });
            })
        }));

        Ok(Arc::new(NativePeerConnection { pc, events }))
    }
}

/// Forward open/message/close callbacks of a channel into the handshake inbox
fn wire_channel(dc: &Arc<RTCDataChannel>, events: &RtcEventSender) {
    let open_events = events.clone();
    dc.on_open(Box::new(move || {
        let events = open_events.clone();
        Box::pin(async move {
            events.emit(RtcEvent::ChannelOpen);
        })
    }));

    let message_events = events.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let events = message_events.clone();
        Box::pin(async move {
            let text = String::from_utf8_lossy(&msg.data).into_owned();
            events.emit(RtcEvent::ChannelMessage(text));
        })
    }));

    let close_events = events.clone();
    dc.on_close(Box::new(move || {
        let events = close_events.clone();
        Box::pin(async move {
            events.emit(RtcEvent::ChannelClosed);
        })
    }));
}

struct NativePeerConnection {
    pc: Arc<RTCPeerConnection>,
    events: RtcEventSender,
}

fn to_native(desc: SessionDescription) -> Result<RTCSessionDescription, RtcError> {
    match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp),
    }
    .map_err(negotiation)
}

fn from_native(desc: RTCSessionDescription) -> Result<SessionDescription, RtcError> {
    let kind = match desc.sdp_type {
        RTCSdpType::Offer => SdpKind::Offer,
        RTCSdpType::Answer => SdpKind::Answer,
        other => {
            return Err(RtcError::Negotiation(format!(
                "unexpected description type {}",
                other
            )));
        }
    };
    Ok(SessionDescription {
        kind,
        sdp: desc.sdp,
    })
}

#[async_trait]
impl PeerConnection for NativePeerConnection {
    async fn add_local_stream(&self, stream: &LocalStream) -> Result<(), RtcError> {
        for track in &stream.tracks {
            let codec = match track.kind {
                TrackKind::Audio => RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    ..Default::default()
                },
                TrackKind::Video => RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    clock_rate: 90000,
                    ..Default::default()
                },
            };
            let local = Arc::new(TrackLocalStaticSample::new(
                codec,
                track.id.clone(),
                stream.id.clone(),
            ));
            self.pc
                .add_track(local as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(|e| RtcError::Setup(e.to_string()))?;
        }
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>, RtcError> {
        let dc = self
            .pc
            .create_data_channel(label, None)
            .await
            .map_err(|e| RtcError::Channel(e.to_string()))?;
        wire_channel(&dc, &self.events);
        Ok(Arc::new(NativeDataChannel(dc)))
    }

    async fn create_offer(&self) -> Result<SessionDescription, RtcError> {
        let offer = self.pc.create_offer(None).await.map_err(negotiation)?;
        from_native(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, RtcError> {
        let answer = self.pc.create_answer(None).await.map_err(negotiation)?;
        from_native(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), RtcError> {
        self.pc
            .set_local_description(to_native(desc)?)
            .await
            .map_err(negotiation)
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), RtcError> {
        self.pc
            .set_remote_description(to_native(desc)?)
            .await
            .map_err(negotiation)
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), RtcError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: None,
        };
        self.pc.add_ice_candidate(init).await.map_err(negotiation)
    }

    async fn close(&self) -> Result<(), RtcError> {
        self.pc
            .close()
            .await
            .map_err(|e| RtcError::Setup(e.to_string()))
    }
}

struct NativeDataChannel(Arc<RTCDataChannel>);

#[async_trait]
impl DataChannel for NativeDataChannel {
    fn label(&self) -> String {
        self.0.label().to_string()
    }

    async fn send_text(&self, text: &str) -> Result<(), RtcError> {
        self.0
            .send_text(text.to_string())
            .await
            .map(|_| ())
            .map_err(|e| RtcError::Channel(e.to_string()))
    }

    async fn close(&self) -> Result<(), RtcError> {
        self.0
            .close()
            .await
            .map_err(|e| RtcError::Channel(e.to_string()))
    }
}
