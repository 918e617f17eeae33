//! Broadcast configuration
//!
//! [`MediaConfig`] describes capture and encoding settings; [`StreamConfig`]
//! adds the server connection on top of it. Both are plain value objects built
//! with by-value setters and compared structurally.

pub mod media;
pub mod stream;

pub use media::{AudioChannels, BroadcastOrientation, BroadcastScaleMode, FrameSizePreset, MediaConfig};
pub use stream::{StreamConfig, DEFAULT_PORT};
