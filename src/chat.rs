//! Text chat over the session's data channel

use std::sync::Arc;

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::rtc::{DataChannel, RtcError};

pub const SYSTEM_LABEL: &str = "SYSTEM";
pub const PEER_LABEL: &str = "Peer";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat channel is not open")]
    ChannelNotOpen,

    #[error("send failed: {0}")]
    Send(#[from] RtcError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub sender: String,
    pub text: String,
    pub at: DateTime<Local>,
}

/// Notifications for whatever renders the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Line(ChatLine),
    ChatEnabled,
    ChatDisabled,
    /// Remote media started arriving ("audio" or "video")
    RemoteTrack { kind: String },
    Closed { reason: String },
}

pub struct ChatAdapter {
    local_name: String,
    enabled: bool,
    transcript: Vec<ChatLine>,
    ui: mpsc::UnboundedSender<UiEvent>,
}

impl ChatAdapter {
    pub fn new(local_name: impl Into<String>, ui: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self {
            local_name: local_name.into(),
            enabled: false,
            transcript: Vec::new(),
            ui,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Oldest first
    pub fn transcript(&self) -> &[ChatLine] {
        &self.transcript
    }

    pub fn enable(&mut self) {
        if !self.enabled {
            self.enabled = true;
            self.notify(UiEvent::ChatEnabled);
        }
    }

    pub fn disable(&mut self) {
        if self.enabled {
            self.enabled = false;
            self.notify(UiEvent::ChatDisabled);
        }
    }

    pub fn system(&mut self, text: impl Into<String>) {
        self.append(SYSTEM_LABEL.to_string(), text.into());
    }

    pub fn receive(&mut self, text: impl Into<String>) {
        self.append(PEER_LABEL.to_string(), text.into());
    }

    /// Enter-key submission: send, echo locally, clear `input`.
    ///
    /// Blank input is ignored and left as is.
    pub async fn submit(
        &mut self,
        channel: Option<&Arc<dyn DataChannel>>,
        input: &mut String,
    ) -> Result<(), ChatError> {
        let channel = match channel {
            Some(ch) if self.enabled => ch,
            _ => return Err(ChatError::ChannelNotOpen),
        };
        if input.trim().is_empty() {
            return Ok(());
        }

        channel.send_text(input).await?;
        let text = std::mem::take(input);
        self.append(self.local_name.clone(), text);
        Ok(())
    }

    pub fn remote_track(&mut self, kind: impl Into<String>) {
        self.notify(UiEvent::RemoteTrack { kind: kind.into() });
    }

    pub fn closed(&mut self, reason: impl Into<String>) {
        self.disable();
        self.notify(UiEvent::Closed {
            reason: reason.into(),
        });
    }

    fn append(&mut self, sender: String, text: String) {
        let line = ChatLine {
            sender,
            text,
            at: Local::now(),
        };
        self.transcript.push(line.clone());
        self.notify(UiEvent::Line(line));
    }

    fn notify(&self, event: UiEvent) {
        if self.ui.send(event).is_err() {
            debug!("UI receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DataChannel for RecordingChannel {
        fn label(&self) -> String {
            "chat".to_string()
        }

        async fn send_text(&self, text: &str) -> Result<(), RtcError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn close(&self) -> Result<(), RtcError> {
            Ok(())
        }
    }

    fn adapter() -> (ChatAdapter, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChatAdapter::new("You", tx), rx)
    }

    #[tokio::test]
    async fn submit_before_open_sends_nothing() {
        let (mut chat, _rx) = adapter();
        let recorder = Arc::new(RecordingChannel::default());
        let channel: Arc<dyn DataChannel> = recorder.clone();
        let mut input = "hello".to_string();

        let result = chat.submit(Some(&channel), &mut input).await;

        assert!(matches!(result, Err(ChatError::ChannelNotOpen)));
        assert!(recorder.sent.lock().unwrap().is_empty());
        assert_eq!(input, "hello");
        assert!(chat.transcript().is_empty());
    }

    #[tokio::test]
    async fn submit_sends_echoes_and_clears() {
        let (mut chat, _rx) = adapter();
        let recorder = Arc::new(RecordingChannel::default());
        let channel: Arc<dyn DataChannel> = recorder.clone();
        chat.enable();
        let mut input = "hello".to_string();

        chat.submit(Some(&channel), &mut input).await.unwrap();

        assert_eq!(*recorder.sent.lock().unwrap(), vec!["hello".to_string()]);
        assert!(input.is_empty());
        assert_eq!(chat.transcript().len(), 1);
        assert_eq!(chat.transcript()[0].sender, "You");
        assert_eq!(chat.transcript()[0].text, "hello");
    }

    #[tokio::test]
    async fn enabled_without_channel_is_not_open() {
        let (mut chat, _rx) = adapter();
        chat.enable();
        let mut input = "hello".to_string();
        let result = chat.submit(None, &mut input).await;
        assert!(matches!(result, Err(ChatError::ChannelNotOpen)));
    }

    #[test]
    fn transcript_keeps_insertion_order() {
        let (mut chat, _rx) = adapter();
        chat.system("Created room");
        chat.receive("hi");
        chat.receive("there");

        let senders: Vec<&str> = chat.transcript().iter().map(|l| l.sender.as_str()).collect();
        let texts: Vec<&str> = chat.transcript().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(senders, vec![SYSTEM_LABEL, PEER_LABEL, PEER_LABEL]);
        assert_eq!(texts, vec!["Created room", "hi", "there"]);
        assert!(chat.transcript()[0].at <= chat.transcript()[2].at);
    }

    #[test]
    fn enable_notifies_once() {
        let (mut chat, mut rx) = adapter();
        chat.enable();
        chat.enable();
        assert_eq!(rx.try_recv().unwrap(), UiEvent::ChatEnabled);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_disables_and_reports() {
        let (mut chat, mut rx) = adapter();
        chat.enable();
        chat.closed("peer left");
        assert!(!chat.is_enabled());
        assert_eq!(rx.try_recv().unwrap(), UiEvent::ChatEnabled);
        assert_eq!(rx.try_recv().unwrap(), UiEvent::ChatDisabled);
        assert_eq!(
            rx.try_recv().unwrap(),
            UiEvent::Closed {
                reason: "peer left".to_string()
            }
        );
    }
}
