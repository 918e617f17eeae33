//! Thread-safe sink fan-out
//!
//! Each list is copy-on-write: mutation swaps in a new `Arc<Vec<_>>` under the
//! write lock, dispatch clones the current `Arc` under the read lock and then
//! iterates without holding any lock. Consequences:
//!
//! - A sink registered during a dispatch pass may miss that pass's frame.
//! - A sink unregistered during a pass may still receive that one frame, but
//!   no pass that starts after `unregister` returns can reach it.
//! - Sinks may register/unregister (themselves or others) from inside a
//!   callback without deadlocking.

use std::sync::Arc;

use parking_lot::RwLock;

use super::frame::{AudioFrame, EncodedFrame, FrameType, VideoFrame};
use super::sink::{AudioSink, EncodedFrameSink, MediaSink, VideoSink};

/// Kinds of media a sink can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
    EncodedVideo,
    EncodedAudio,
}

/// Copy-on-write list of sink handles compared by pointer identity
pub struct SinkList<S: ?Sized> {
    sinks: RwLock<Arc<Vec<Arc<S>>>>,
}

impl<S: ?Sized> SinkList<S> {
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Add a sink; returns `false` if this exact sink is already present
    pub fn register(&self, sink: Arc<S>) -> bool {
        let mut guard = self.sinks.write();
        if guard.iter().any(|s| Arc::ptr_eq(s, &sink)) {
            return false;
        }
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(sink);
        *guard = Arc::new(next);
        true
    }

    /// Remove a sink; returns `false` if it was not present
    pub fn unregister(&self, sink: &Arc<S>) -> bool {
        let mut guard = self.sinks.write();
        if !guard.iter().any(|s| Arc::ptr_eq(s, sink)) {
            return false;
        }
        let next: Vec<Arc<S>> = guard
            .iter()
            .filter(|s| !Arc::ptr_eq(s, sink))
            .cloned()
            .collect();
        *guard = Arc::new(next);
        true
    }

    /// Point-in-time copy of the registered set
    pub fn snapshot(&self) -> Arc<Vec<Arc<S>>> {
        Arc::clone(&self.sinks.read())
    }

    /// Call `f` for every sink in a snapshot; returns the number of sinks reached
    pub fn dispatch<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&S),
    {
        let snapshot = self.snapshot();
        for sink in snapshot.iter() {
            f(sink.as_ref());
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }

    /// Remove every sink
    pub fn clear(&self) {
        *self.sinks.write() = Arc::new(Vec::new());
    }
}

impl<S: ?Sized> Default for SinkList<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink lists for every media kind
#[derive(Default)]
pub struct MediaSinkRegistry {
    video: SinkList<dyn VideoSink>,
    audio: SinkList<dyn AudioSink>,
    encoded_video: SinkList<dyn EncodedFrameSink>,
    encoded_audio: SinkList<dyn EncodedFrameSink>,
}

impl MediaSinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink under its media kind
    pub fn register(&self, sink: MediaSink) -> bool {
        let kind = sink.kind();
        let added = match sink {
            MediaSink::Video(s) => self.video.register(s),
            MediaSink::Audio(s) => self.audio.register(s),
            MediaSink::EncodedVideo(s) => self.encoded_video.register(s),
            MediaSink::EncodedAudio(s) => self.encoded_audio.register(s),
        };
        if added {
            tracing::debug!(kind = ?kind, sinks = self.count(kind), "Sink registered");
        }
        added
    }

    /// Unregister a sink; no dispatch starting after this returns will reach it
    pub fn unregister(&self, sink: &MediaSink) -> bool {
        let removed = match sink {
            MediaSink::Video(s) => self.video.unregister(s),
            MediaSink::Audio(s) => self.audio.unregister(s),
            MediaSink::EncodedVideo(s) => self.encoded_video.unregister(s),
            MediaSink::EncodedAudio(s) => self.encoded_audio.unregister(s),
        };
        if removed {
            tracing::debug!(kind = ?sink.kind(), sinks = self.count(sink.kind()), "Sink unregistered");
        }
        removed
    }

    /// Deliver a raw video frame to every video sink
    pub fn dispatch_video(&self, frame: &VideoFrame) -> usize {
        self.video.dispatch(|s| s.video_frame_captured(frame))
    }

    /// Deliver PCM audio to every audio sink
    pub fn dispatch_audio(&self, frame: &AudioFrame) -> usize {
        self.audio.dispatch(|s| s.audio_frame_captured(frame))
    }

    /// Deliver an encoded frame to the sinks for its frame type
    ///
    /// Data frames go to both encoded lists.
    pub fn dispatch_encoded(&self, frame: &EncodedFrame) -> usize {
        match frame.frame_type {
            FrameType::Video => self.encoded_video.dispatch(|s| s.encoded_frame(frame)),
            FrameType::Audio => self.encoded_audio.dispatch(|s| s.encoded_frame(frame)),
            FrameType::Data => {
                self.encoded_video.dispatch(|s| s.encoded_frame(frame))
                    + self.encoded_audio.dispatch(|s| s.encoded_frame(frame))
            }
        }
    }

    /// Number of sinks registered for a media kind
    pub fn count(&self, kind: MediaKind) -> usize {
        match kind {
            MediaKind::Video => self.video.len(),
            MediaKind::Audio => self.audio.len(),
            MediaKind::EncodedVideo => self.encoded_video.len(),
            MediaKind::EncodedAudio => self.encoded_audio.len(),
        }
    }

    /// Whether anything is registered for a media kind
    pub fn has_sinks(&self, kind: MediaKind) -> bool {
        self.count(kind) > 0
    }

    /// Remove all sinks of every kind
    pub fn clear(&self) {
        self.video.clear();
        self.audio.clear();
        self.encoded_video.clear();
        self.encoded_audio.clear();
    }
}
