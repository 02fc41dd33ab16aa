use std::fmt;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no media device: {0}")]
    DeviceUnavailable(String),

    #[error("at least one of audio or video must be requested")]
    NothingRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => f.write_str("audio"),
            TrackKind::Video => f.write_str("video"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    pub id: String,
    pub kind: TrackKind,
}

/// Acquired local media, attached to every peer connection the client creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStream {
    pub id: String,
    pub tracks: Vec<LocalTrack>,
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<LocalStream, MediaError>;
}

/// Device-less source: yields one track per requested kind
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticMedia;

#[async_trait]
impl MediaSource for SyntheticMedia {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<LocalStream, MediaError> {
        if !constraints.audio && !constraints.video {
            return Err(MediaError::NothingRequested);
        }

        let suffix: u32 = rand::rng().random();
        let stream_id = format!("stream_{:08x}", suffix);

        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(LocalTrack {
                id: format!("{}_audio", stream_id),
                kind: TrackKind::Audio,
            });
        }
        if constraints.video {
            tracks.push(LocalTrack {
                id: format!("{}_video", stream_id),
                kind: TrackKind::Video,
            });
        }

        Ok(LocalStream {
            id: stream_id,
            tracks,
        })
    }
}
