use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tandem::rtc::{
    DataChannel, IceCandidate, LocalStream, PeerConnection, PeerConnector, RtcError, RtcEvent,
    RtcEventSender, SdpKind, SessionDescription,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    AddStream(String),
    CreateDataChannel(String),
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpKind),
    SetRemote(SdpKind),
    AddCandidate(IceCandidate),
    Close,
}

/// Step at which a fake connection rejects the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    CreateOffer,
    SetRemote,
}

#[derive(Default)]
pub struct FakeConnector {
    fail: Option<FailAt>,
    connections: Mutex<Vec<Arc<FakePeerConnection>>>,
}

impl FakeConnector {
    pub fn failing(at: FailAt) -> Self {
        Self {
            fail: Some(at),
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn connections(&self) -> Vec<Arc<FakePeerConnection>> {
        self.connections.lock().unwrap().clone()
    }

    pub fn last(&self) -> Arc<FakePeerConnection> {
        self.connections
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no peer connection created")
    }
}

#[async_trait]
impl PeerConnector for FakeConnector {
    async fn connect(&self, events: RtcEventSender) -> Result<Arc<dyn PeerConnection>, RtcError> {
        let pc = Arc::new(FakePeerConnection {
            events,
            fail: self.fail,
            calls: Mutex::new(Vec::new()),
            channel: Mutex::new(None),
        });
        self.connections.lock().unwrap().push(pc.clone());
        Ok(pc as Arc<dyn PeerConnection>)
    }
}

/// Records every call; setting a local description "discovers" one candidate
pub struct FakePeerConnection {
    events: RtcEventSender,
    fail: Option<FailAt>,
    calls: Mutex<Vec<Call>>,
    channel: Mutex<Option<Arc<FakeDataChannel>>>,
}

impl FakePeerConnection {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn added_candidates(&self) -> Vec<IceCandidate> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AddCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn generation(&self) -> u64 {
        self.events.generation()
    }

    /// Raise a callback as the real stack would
    pub fn emit(&self, event: RtcEvent) {
        self.events.emit(event);
    }

    /// Answering side: announce the channel the offerer created
    pub fn announce_channel(&self) -> Arc<FakeDataChannel> {
        let channel = Arc::new(FakeDataChannel::new("chat"));
        *self.channel.lock().unwrap() = Some(channel.clone());
        self.emit(RtcEvent::DataChannel(channel.clone()));
        channel
    }

    pub fn channel(&self) -> Option<Arc<FakeDataChannel>> {
        self.channel.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PeerConnection for FakePeerConnection {
    async fn add_local_stream(&self, stream: &LocalStream) -> Result<(), RtcError> {
        self.record(Call::AddStream(stream.id.clone()));
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>, RtcError> {
        self.record(Call::CreateDataChannel(label.to_string()));
        let channel = Arc::new(FakeDataChannel::new(label));
        *self.channel.lock().unwrap() = Some(channel.clone());
        Ok(channel as Arc<dyn DataChannel>)
    }

    async fn create_offer(&self) -> Result<SessionDescription, RtcError> {
        self.record(Call::CreateOffer);
        if self.fail == Some(FailAt::CreateOffer) {
            return Err(RtcError::Negotiation("no codecs".to_string()));
        }
        Ok(SessionDescription::offer("v=0\r\no=- offer"))
    }

    async fn create_answer(&self) -> Result<SessionDescription, RtcError> {
        self.record(Call::CreateAnswer);
        Ok(SessionDescription::answer("v=0\r\no=- answer"))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), RtcError> {
        self.record(Call::SetLocal(desc.kind));
        self.emit(RtcEvent::LocalCandidate(IceCandidate {
            candidate: format!("candidate:local-{} 1 udp 1 127.0.0.1 9 typ host", desc.kind),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
        }));
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), RtcError> {
        self.record(Call::SetRemote(desc.kind));
        if self.fail == Some(FailAt::SetRemote) {
            return Err(RtcError::Negotiation("bad sdp".to_string()));
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), RtcError> {
        self.record(Call::AddCandidate(candidate));
        Ok(())
    }

    async fn close(&self) -> Result<(), RtcError> {
        self.record(Call::Close);
        Ok(())
    }
}

pub struct FakeDataChannel {
    label: String,
    sent: Mutex<Vec<String>>,
}

impl FakeDataChannel {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataChannel for FakeDataChannel {
    fn label(&self) -> String {
        self.label.clone()
    }

    async fn send_text(&self, text: &str) -> Result<(), RtcError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<(), RtcError> {
        Ok(())
    }
}
