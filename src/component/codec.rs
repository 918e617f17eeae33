//! Hardware and codec seams
//!
//! Platform capture and the actual codecs live outside this crate; components
//! are generic over these traits.

use crate::config::MediaConfig;
use crate::error::Result;
use crate::media::{AudioFrame, EncodedFrame, VideoFrame};

/// A video encoder implementation
pub trait VideoCodec: Send {
    /// Configure for the given frame size, rate and initial bitrate
    fn configure(&mut self, config: &MediaConfig) -> Result<()>;

    /// Change the target bitrate while encoding
    fn set_bitrate(&mut self, bitrate: u32) -> Result<()>;

    /// Encode one frame; `None` while the codec is still buffering input
    fn encode(&mut self, frame: &VideoFrame) -> Result<Option<EncodedFrame>>;

    /// Drain buffered output at end of broadcast
    fn flush(&mut self) -> Result<Vec<EncodedFrame>> {
        Ok(Vec::new())
    }
}

/// An audio encoder implementation
pub trait AudioCodec: Send {
    /// Configure for the given channel count, sample rate and bitrate (0 = codec default)
    fn configure(&mut self, channels: u32, sample_rate: u32, bitrate: u32) -> Result<()>;

    /// Encode one block of PCM
    fn encode(&mut self, frame: &AudioFrame) -> Result<Option<EncodedFrame>>;

    fn flush(&mut self) -> Result<Vec<EncodedFrame>> {
        Ok(Vec::new())
    }
}

/// A platform microphone
///
/// Captured PCM is pushed into [`AudioDevice::deliver_samples`](super::AudioDevice::deliver_samples)
/// from the platform's capture thread.
pub trait AudioSource: Send {
    /// Open the device; returns the sample rate actually selected
    fn open(&mut self, channels: u32, sample_rate: u32) -> Result<u32>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;
}
