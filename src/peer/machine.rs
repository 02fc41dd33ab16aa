use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::role::PeerRole;
use super::session::ConnectionSession;
use super::state::{HandshakeError, HandshakeState};
use crate::chat::{ChatAdapter, ChatLine, UiEvent};
use crate::rtc::{
    CHAT_CHANNEL_LABEL, IceCandidate, LocalStream, MediaError, PeerConnector, RtcEvent,
    SessionDescription,
};
use crate::signaling::{PeerId, SignalingMessage};
use crate::transport::{Joined, TransportEvent, TransportHandle};

/// Everything the handshake actor reacts to
#[derive(Debug)]
pub enum Event {
    Joined(Joined),
    MediaReady(LocalStream),
    MediaFailed(MediaError),
    Transport(TransportEvent),
    Rtc { generation: u64, event: RtcEvent },
    /// One submitted line of chat input
    ChatInput(String),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Label for locally typed chat lines
    pub display_name: String,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            display_name: "You".to_string(),
        }
    }
}

/// How a session gets started once media is available
#[derive(Debug, Clone, Copy)]
enum Origin {
    Offer { remote: Option<PeerId> },
    Answer { remote: PeerId },
}

/// Signaling handshake actor.
///
/// Owns the role, local media, the single `ConnectionSession` and the chat.
/// All state changes happen inside `handle`, one event at a time.
pub struct Handshake {
    connector: Arc<dyn PeerConnector>,
    transport: TransportHandle,
    inbox: mpsc::UnboundedSender<Event>,
    chat: ChatAdapter,
    local_id: Option<PeerId>,
    role: Option<PeerRole>,
    media: Option<LocalStream>,
    deferred: Option<Origin>,
    session: Option<ConnectionSession>,
    state: HandshakeState,
    next_generation: u64,
    finished: bool,
}

impl Handshake {
    pub fn new(
        config: HandshakeConfig,
        connector: Arc<dyn PeerConnector>,
        transport: TransportHandle,
        ui: mpsc::UnboundedSender<UiEvent>,
    ) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        let handshake = Self {
            connector,
            transport,
            inbox,
            chat: ChatAdapter::new(config.display_name, ui),
            local_id: None,
            role: None,
            media: None,
            deferred: None,
            session: None,
            state: HandshakeState::Idle,
            next_generation: 0,
            finished: false,
        };
        (handshake, inbox_rx)
    }

    /// Sender for media results, chat input and shutdown
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.inbox.clone()
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn role(&self) -> Option<PeerRole> {
        self.role
    }

    pub fn local_id(&self) -> Option<PeerId> {
        self.local_id
    }

    pub fn session(&self) -> Option<&ConnectionSession> {
        self.session.as_ref()
    }

    pub fn transcript(&self) -> &[ChatLine] {
        self.chat.transcript()
    }

    pub fn chat_enabled(&self) -> bool {
        self.chat.is_enabled()
    }

    /// Set after transport loss, fatal media failure or shutdown
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drive the actor until the transport is lost, media fails or shutdown
    pub async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<Event>,
        mut transport: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Result<(), HandshakeError> {
        loop {
            let event = tokio::select! {
                Some(event) = inbox.recv() => event,
                event = transport.recv() => Event::Transport(event.unwrap_or(TransportEvent::Lost)),
            };

            if let Err(e) = self.handle(event).await {
                if e.is_fatal() {
                    error!("{}", e);
                    return Err(e);
                } else if e.is_negotiation() {
                    error!("{}", e);
                } else {
                    warn!("{}", e);
                }
            }

            if self.finished {
                info!("Handshake actor stopped in state {}", self.state);
                return Ok(());
            }
        }
    }

    pub async fn handle(&mut self, event: Event) -> Result<(), HandshakeError> {
        match event {
            Event::Joined(joined) => self.on_joined(joined).await,
            Event::MediaReady(stream) => self.on_media(stream).await,
            Event::MediaFailed(e) => {
                self.finished = true;
                self.teardown("local media unavailable").await;
                Err(HandshakeError::Media(e))
            }
            Event::Transport(TransportEvent::Signal { from, message }) => {
                self.on_signal(from, message).await
            }
            Event::Transport(TransportEvent::Lost) => {
                self.finished = true;
                self.teardown("signaling connection lost").await;
                Ok(())
            }
            Event::Rtc { generation, event } => self.on_rtc(generation, event).await,
            Event::ChatInput(mut text) => {
                let channel = self.session.as_ref().and_then(|s| s.data_channel());
                self.chat.submit(channel, &mut text).await?;
                Ok(())
            }
            Event::Shutdown => {
                self.finished = true;
                self.transport.leave();
                self.teardown("shut down").await;
                Ok(())
            }
        }
    }

    async fn on_joined(&mut self, joined: Joined) -> Result<(), HandshakeError> {
        if self.local_id.is_some() {
            return Err(HandshakeError::AlreadyJoined);
        }
        let role = PeerRole::from_roster(&joined.roster);
        self.local_id = Some(joined.local_id);
        self.role = Some(role);
        info!("Joined room {} as {}", joined.room, role);

        match role {
            PeerRole::Creator => {
                info!("First in room, waiting for peers.");
                self.chat.system(format!(
                    "Created room \"{}\". Waiting for users.",
                    joined.room
                ));
                Ok(())
            }
            PeerRole::Joiner => {
                self.transport.send(SignalingMessage::Init);
                self.chat.system(format!("Joined room \"{}\".", joined.room));
                let remote = joined.roster.keys().next().copied();
                self.start_session(Origin::Offer { remote }).await
            }
        }
    }

    async fn on_media(&mut self, stream: LocalStream) -> Result<(), HandshakeError> {
        info!(
            "Local media ready: {} ({} tracks)",
            stream.id,
            stream.tracks.len()
        );
        self.media = Some(stream);
        match self.deferred.take() {
            Some(origin) => self.create_session(origin).await,
            None => Ok(()),
        }
    }

    async fn start_session(&mut self, origin: Origin) -> Result<(), HandshakeError> {
        if self.media.is_none() {
            info!("Deferring peer connection until local media is ready");
            self.deferred = Some(origin);
            self.state = HandshakeState::AwaitingLocalMedia;
            return Ok(());
        }
        self.create_session(origin).await
    }

    async fn create_session(&mut self, origin: Origin) -> Result<(), HandshakeError> {
        let Some(stream) = self.media.as_ref() else {
            self.deferred = Some(origin);
            self.state = HandshakeState::AwaitingLocalMedia;
            return Ok(());
        };

        let generation = self.next_generation;
        self.next_generation += 1;

        let session = match ConnectionSession::open(
            self.connector.as_ref(),
            generation,
            self.inbox.clone(),
            stream,
        )
        .await
        {
            Ok(s) => s,
            Err(e) => {
                self.teardown("peer connection setup failed").await;
                return Err(e.into());
            }
        };
        self.session = Some(session);
        self.state = HandshakeState::Created;

        match origin {
            Origin::Offer { remote } => {
                info!("Starting RTC connection as offerer");
                if let (Some(session), Some(remote)) = (self.session.as_mut(), remote) {
                    session.bind_remote(remote, "roster")?;
                }
                if let Err(e) = self.send_offer().await {
                    self.teardown("negotiation failed").await;
                    return Err(e);
                }
                self.state = HandshakeState::OfferSent;
            }
            Origin::Answer { remote } => {
                info!("Starting RTC connection as answerer for {}", remote);
                if let Some(session) = self.session.as_mut() {
                    session.bind_remote(remote, "init")?;
                }
                self.state = HandshakeState::AwaitingOffer;
            }
        }
        Ok(())
    }

    /// Data channel, offer, local description, then transmit
    async fn send_offer(&mut self) -> Result<(), HandshakeError> {
        let Some(session) = self.session.as_mut() else {
            return Err(self.no_session("offer"));
        };
        let channel = session
            .connection()
            .create_data_channel(CHAT_CHANNEL_LABEL)
            .await?;
        session.set_data_channel(channel);

        let offer = session.connection().create_offer().await?;
        session
            .connection()
            .set_local_description(offer.clone())
            .await?;
        self.transport
            .send(SignalingMessage::Offer { sdp: offer.sdp });
        Ok(())
    }

    async fn on_signal(
        &mut self,
        from: PeerId,
        message: SignalingMessage,
    ) -> Result<(), HandshakeError> {
        debug!("{} from {} in state {}", message.kind(), from, self.state);
        match message {
            SignalingMessage::Init => {
                if self.state.is_active() {
                    return Err(HandshakeError::SessionActive {
                        from,
                        state: self.state,
                    });
                }
                self.chat.system("Peer joined.");
                self.start_session(Origin::Answer { remote: from }).await
            }

            SignalingMessage::Offer { sdp } => {
                self.bind("offer", from)?;
                if self.state != HandshakeState::AwaitingOffer {
                    return Err(HandshakeError::UnexpectedOffer(self.state));
                }
                if let Err(e) = self.answer_offer(sdp).await {
                    self.teardown("negotiation failed").await;
                    return Err(e);
                }
                self.state = HandshakeState::OfferReceived;
                Ok(())
            }

            SignalingMessage::Answer { sdp } => {
                self.bind("answer", from)?;
                if self.state != HandshakeState::OfferSent {
                    return Err(HandshakeError::UnexpectedAnswer(self.state));
                }
                let result = match self.session.as_mut() {
                    Some(session) => session
                        .set_remote_description(SessionDescription::answer(sdp))
                        .await
                        .map_err(HandshakeError::from),
                    None => Err(self.no_session("answer")),
                };
                if let Err(e) = result {
                    self.teardown("negotiation failed").await;
                    return Err(e);
                }
                info!("Remote answer applied, waiting for ICE");
                Ok(())
            }

            SignalingMessage::Candidate {
                candidate,
                sdp_mid,
                sdp_mline_index,
            } => {
                self.bind("candidate", from)?;
                let candidate = IceCandidate {
                    candidate,
                    sdp_mid,
                    sdp_mline_index,
                };
                match self.session.as_mut() {
                    Some(session) => Ok(session.add_remote_candidate(candidate).await?),
                    None => Err(self.no_session("candidate")),
                }
            }

            SignalingMessage::Remove => {
                if self.state == HandshakeState::Closed {
                    debug!("Remove from {} after close", from);
                    return Ok(());
                }
                if let Some(remote) = self.expected_remote() {
                    if remote != from {
                        return Err(HandshakeError::ForeignPeer {
                            kind: "remove",
                            from,
                            remote,
                        });
                    }
                }
                info!("Peer {} left", from);
                self.teardown("peer left").await;
                Ok(())
            }
        }
    }

    /// Remote description, answer, local description, then transmit
    async fn answer_offer(&mut self, sdp: String) -> Result<(), HandshakeError> {
        let Some(session) = self.session.as_mut() else {
            return Err(self.no_session("offer"));
        };
        session
            .set_remote_description(SessionDescription::offer(sdp))
            .await?;
        let answer = session.connection().create_answer().await?;
        session
            .connection()
            .set_local_description(answer.clone())
            .await?;
        self.transport
            .send(SignalingMessage::Answer { sdp: answer.sdp });
        Ok(())
    }

    /// Require a live peer connection bound to `from`
    fn bind(&mut self, kind: &'static str, from: PeerId) -> Result<(), HandshakeError> {
        if !self.state.has_connection() {
            return Err(self.no_session(kind));
        }
        match self.session.as_mut() {
            Some(session) => session.bind_remote(from, kind),
            None => Err(self.no_session(kind)),
        }
    }

    /// Peer bound to the live session, or to the one waiting on media
    fn expected_remote(&self) -> Option<PeerId> {
        match (self.session.as_ref(), self.deferred) {
            (Some(session), _) => session.remote(),
            (None, Some(Origin::Answer { remote })) => Some(remote),
            (None, Some(Origin::Offer { remote })) => remote,
            (None, None) => None,
        }
    }

    fn no_session(&self, kind: &'static str) -> HandshakeError {
        HandshakeError::NoSession {
            kind,
            state: self.state,
        }
    }

    async fn on_rtc(&mut self, generation: u64, event: RtcEvent) -> Result<(), HandshakeError> {
        let Some(session) = self.session.as_mut() else {
            debug!("Dropping {:?}: no session", event);
            return Ok(());
        };
        if session.generation() != generation {
            debug!("Dropping {:?} from stale session {}", event, generation);
            return Ok(());
        }

        match event {
            RtcEvent::LocalCandidate(c) => {
                self.transport.send(SignalingMessage::Candidate {
                    candidate: c.candidate,
                    sdp_mid: c.sdp_mid,
                    sdp_mline_index: c.sdp_mline_index,
                });
            }
            RtcEvent::DataChannel(channel) => {
                debug!("Data channel {} received", channel.label());
                session.set_data_channel(channel);
            }
            RtcEvent::ChannelOpen => {
                if self.state == HandshakeState::Connected {
                    debug!("Duplicate channel open ignored");
                } else {
                    info!("Data channel open, connected");
                    self.state = HandshakeState::Connected;
                    self.chat.enable();
                }
            }
            RtcEvent::ChannelMessage(text) => self.chat.receive(text),
            RtcEvent::ChannelClosed => {
                info!("Data channel closed");
                self.teardown("data channel closed").await;
            }
            RtcEvent::RemoteTrack { kind } => {
                info!("Receiving remote {} track", kind);
                self.chat.remote_track(kind);
            }
        }
        Ok(())
    }

    /// Destroy the session (if any) and land in `Closed`
    async fn teardown(&mut self, reason: &str) {
        self.deferred = None;
        if let Some(session) = self.session.take() {
            session.close().await;
        }
        if self.state != HandshakeState::Closed {
            info!("Session closed: {}", reason);
            self.state = HandshakeState::Closed;
            self.chat.closed(reason);
        }
    }
}
