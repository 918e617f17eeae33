//! Media sink traits
//!
//! Sinks are called on the thread that produced the frame (capture or encode
//! context) and must return quickly.

use std::sync::Arc;

use super::frame::{AudioFrame, EncodedFrame, VideoFrame};
use super::registry::MediaKind;

/// Receiver of raw video frames
pub trait VideoSink: Send + Sync {
    fn video_frame_captured(&self, frame: &VideoFrame);
}

/// Receiver of raw PCM audio
pub trait AudioSink: Send + Sync {
    fn audio_frame_captured(&self, frame: &AudioFrame);
}

/// Receiver of encoded audio or video frames
pub trait EncodedFrameSink: Send + Sync {
    fn encoded_frame(&self, frame: &EncodedFrame);
}

/// A sink handle tagged with the kind of media it receives
///
/// Identity is the underlying `Arc`: unregistering requires a handle to the
/// same allocation that was registered.
#[derive(Clone)]
pub enum MediaSink {
    Video(Arc<dyn VideoSink>),
    Audio(Arc<dyn AudioSink>),
    EncodedVideo(Arc<dyn EncodedFrameSink>),
    EncodedAudio(Arc<dyn EncodedFrameSink>),
}

impl MediaSink {
    /// Kind of media this sink receives
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaSink::Video(_) => MediaKind::Video,
            MediaSink::Audio(_) => MediaKind::Audio,
            MediaSink::EncodedVideo(_) => MediaKind::EncodedVideo,
            MediaSink::EncodedAudio(_) => MediaKind::EncodedAudio,
        }
    }

    /// Whether both handles refer to the same sink for the same media kind
    pub fn same_sink(&self, other: &MediaSink) -> bool {
        match (self, other) {
            (MediaSink::Video(a), MediaSink::Video(b)) => Arc::ptr_eq(a, b),
            (MediaSink::Audio(a), MediaSink::Audio(b)) => Arc::ptr_eq(a, b),
            (MediaSink::EncodedVideo(a), MediaSink::EncodedVideo(b))
            | (MediaSink::EncodedAudio(a), MediaSink::EncodedAudio(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for MediaSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MediaSink::{:?}", self.kind())
    }
}
