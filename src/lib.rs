//! livecast: live audio/video broadcast engine
//!
//! This library provides the control plane of a mobile-style live broadcaster:
//! - Session lifecycle coordinating capture devices and encoders, with rollback
//!   when a component fails to prepare or start
//! - Backlog-driven adaptive bitrate and frame-skip control for the video encoder
//! - Thread-safe fan-out of raw and encoded frames to registered sinks
//! - A structured metadata/event channel (AMF0-encoded) for stream-wide and
//!   module-targeted data events, including ping round-trip measurement
//!
//! Codecs, capture hardware and the network transport are supplied by the caller
//! through the traits in [`component`] and [`data`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use livecast::{BroadcastSession, Status, StreamConfig};
//!
//! let session = BroadcastSession::new();
//! let config = StreamConfig::new("media.example.com", "live", "my_stream");
//!
//! let status = session.start_broadcast(
//!     &config,
//!     Some(Arc::new(|status: &Status| println!("status: {:?}", status))),
//! );
//! assert!(status.is_running());
//!
//! session.end_broadcast(None);
//! ```

pub mod abr;
pub mod component;
pub mod config;
pub mod data;
pub mod error;
pub mod media;
pub mod session;
pub mod stats;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types for convenience
pub use abr::{AdaptiveBitrateController, ControllerEvent, ControllerSettings, FrameDecision};
pub use component::{BroadcastComponent, ComponentRole};
pub use config::{MediaConfig, StreamConfig};
pub use data::{DataEventRouter, DataList, DataMap, DataScope, StructuredValue};
pub use error::{Error, Result};
pub use media::{MediaSink, MediaSinkRegistry};
pub use session::{BroadcastSession, StreamMetadata};
pub use status::{BroadcastEvent, BroadcastState, Status, StatusCallback, StatusCell};
