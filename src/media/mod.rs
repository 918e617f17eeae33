//! Media frames and sink fan-out
//!
//! This module provides:
//! - Raw (captured) and encoded frame types
//! - Sink traits for the four kinds of media a component can emit
//! - [`MediaSinkRegistry`], the thread-safe fan-out used by every component

pub mod frame;
pub mod registry;
pub mod sink;

pub use frame::{AudioFrame, EncodedFrame, FrameType, PixelFormat, VideoFrame};
pub use registry::{MediaKind, MediaSinkRegistry, SinkList};
pub use sink::{AudioSink, EncodedFrameSink, MediaSink, VideoSink};
