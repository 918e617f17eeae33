//! Frame types passed between capture, encoders and sinks
//!
//! Payloads are `Bytes` so fanning a frame out to many sinks only bumps a
//! reference count.

use bytes::Bytes;

/// Layout of a raw video frame's pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// Planar Y'CbCr 4:2:0
    #[default]
    I420,
    /// Bi-planar Y'CbCr 4:2:0
    Nv12,
    /// Packed 32-bit BGRA
    Bgra,
}

/// An uncompressed video frame from a capture device
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Presentation timestamp in milliseconds
    pub timestamp: u32,
    pub data: Bytes,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, timestamp: u32, data: Bytes) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::default(),
            timestamp,
            data,
        }
    }
}

/// A block of interleaved 16-bit PCM samples
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub sample_rate: u32,
    pub channels: u32,
    /// Presentation timestamp in milliseconds
    pub timestamp: u32,
    pub samples: Bytes,
}

impl AudioFrame {
    pub fn new(sample_rate: u32, channels: u32, timestamp: u32, samples: Bytes) -> Self {
        Self {
            sample_rate,
            channels,
            timestamp,
            samples,
        }
    }

    /// Number of samples per channel in this block
    pub fn sample_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / 2 / self.channels as usize
    }
}

/// Type of encoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Video,
    Audio,
    /// Script data (metadata)
    Data,
}

/// An encoded frame ready for transmission
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub frame_type: FrameType,
    /// Timestamp in milliseconds
    pub timestamp: u32,
    pub data: Bytes,
    /// Whether this is a key frame (video only)
    pub is_keyframe: bool,
    /// Whether this is a codec configuration record
    pub is_header: bool,
}

impl EncodedFrame {
    /// Create a video frame
    pub fn video(timestamp: u32, data: Bytes, is_keyframe: bool, is_header: bool) -> Self {
        Self {
            frame_type: FrameType::Video,
            timestamp,
            data,
            is_keyframe,
            is_header,
        }
    }

    /// Create an audio frame
    pub fn audio(timestamp: u32, data: Bytes, is_header: bool) -> Self {
        Self {
            frame_type: FrameType::Audio,
            timestamp,
            data,
            is_keyframe: false,
            is_header,
        }
    }

    /// Create a data frame
    pub fn data(timestamp: u32, data: Bytes) -> Self {
        Self {
            frame_type: FrameType::Data,
            timestamp,
            data,
            is_keyframe: false,
            is_header: false,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
