//! Broadcast components
//!
//! A broadcast is driven by up to three components, prepared and started in a
//! fixed order: audio capture device, audio encoder, video encoder. Every
//! component implements [`BroadcastComponent`]; the concrete variants here wrap
//! caller-supplied capture sources and codecs (see [`codec`]).
//!
//! Operations report through a returned [`Status`] instead of `Result`: a status
//! carrying an error is a failure.

use std::sync::Arc;

use crate::config::StreamConfig;
use crate::media::MediaSink;
use crate::status::{Status, StatusCallback};

pub mod audio_device;
pub mod audio_encoder;
pub mod codec;
pub mod lifecycle;
pub mod video_encoder;

pub use audio_device::AudioDevice;
pub use audio_encoder::AudioEncoder;
pub use codec::{AudioCodec, AudioSource, VideoCodec};
pub use lifecycle::Lifecycle;
pub use video_encoder::AdaptiveVideoEncoder;

/// Role a component plays in a broadcast, in start order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentRole {
    AudioDevice,
    AudioEncoder,
    VideoEncoder,
}

impl ComponentRole {
    /// All roles in prepare/start order
    pub const START_ORDER: [ComponentRole; 3] = [
        ComponentRole::AudioDevice,
        ComponentRole::AudioEncoder,
        ComponentRole::VideoEncoder,
    ];
}

impl std::fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentRole::AudioDevice => write!(f, "audio device"),
            ComponentRole::AudioEncoder => write!(f, "audio encoder"),
            ComponentRole::VideoEncoder => write!(f, "video encoder"),
        }
    }
}

/// Capability contract shared by capture devices and encoders
pub trait BroadcastComponent: Send + Sync {
    /// Role this component fills
    fn role(&self) -> ComponentRole;

    /// Current status
    fn get_status(&self) -> Status;

    /// Configure for a broadcast; moves to `Ready` on success
    fn prepare_for_broadcast(&self, config: &StreamConfig) -> Status;

    /// Begin producing output; moves to `Running` on success
    fn start_broadcasting(&self) -> Status;

    /// Stop producing output; moves to `Idle`
    ///
    /// Must succeed without side effects when already stopped.
    fn stop_broadcasting(&self) -> Status;

    /// Register a media sink; `false` if this component doesn't emit that kind
    fn register_sink(&self, _sink: MediaSink) -> bool {
        false
    }

    /// Unregister a media sink
    fn unregister_sink(&self, _sink: &MediaSink) -> bool {
        false
    }

    /// Receiver for runtime events (bitrate changes, codec errors)
    fn set_status_observer(&self, _observer: Option<Arc<dyn StatusCallback>>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        let names: Vec<String> = ComponentRole::START_ORDER
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(names, vec!["audio device", "audio encoder", "video encoder"]);
    }
}
