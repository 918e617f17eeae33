//! Per-encoder frame and byte counters

use std::time::{Duration, Instant};

use crate::abr::FrameDecision;

/// What happened to one captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Encoded and handed to sinks with this many bytes
    Delivered { bytes: usize, keyframe: bool },
    /// Discarded by the skip pattern
    Skipped,
    /// Discarded while delivery was paused
    Dropped,
    /// Accepted by the codec with no output yet
    Buffered,
}

impl From<FrameDecision> for FrameOutcome {
    fn from(decision: FrameDecision) -> Self {
        match decision {
            FrameDecision::Deliver => FrameOutcome::Buffered,
            FrameDecision::Skip => FrameOutcome::Skipped,
            FrameDecision::Drop => FrameOutcome::Dropped,
        }
    }
}

/// Encoder statistics
#[derive(Debug, Clone)]
pub struct EncoderStats {
    /// When the current broadcast started
    pub started_at: Instant,
    /// Frames received from capture
    pub captured_frames: u64,
    /// Encoded frames handed to sinks
    pub delivered_frames: u64,
    /// Key frames among the delivered ones
    pub keyframes: u64,
    /// Frames discarded by the skip pattern
    pub skipped_frames: u64,
    /// Frames discarded while paused
    pub dropped_frames: u64,
    /// Encoded bytes handed to sinks
    pub bytes_encoded: u64,
    /// Bitrate the codec is configured with (bits/sec)
    pub current_bitrate: u32,
    /// Bitrate changes applied by the controller
    pub bitrate_changes: u64,
}

impl Default for EncoderStats {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            captured_frames: 0,
            delivered_frames: 0,
            keyframes: 0,
            skipped_frames: 0,
            dropped_frames: 0,
            bytes_encoded: 0,
            current_bitrate: 0,
            bitrate_changes: 0,
        }
    }
}

impl EncoderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting a new broadcast at the given bitrate
    pub fn restart(&mut self, bitrate: u32) {
        *self = Self {
            current_bitrate: bitrate,
            ..Self::default()
        };
    }

    /// Account for one captured frame
    pub fn record(&mut self, outcome: FrameOutcome) {
        self.captured_frames += 1;
        match outcome {
            FrameOutcome::Delivered { bytes, keyframe } => {
                self.delivered_frames += 1;
                self.bytes_encoded += bytes as u64;
                if keyframe {
                    self.keyframes += 1;
                }
            }
            FrameOutcome::Skipped => self.skipped_frames += 1,
            FrameOutcome::Dropped => self.dropped_frames += 1,
            FrameOutcome::Buffered => {}
        }
    }

    /// Account for output the codec produced without a new input frame
    pub fn record_output(&mut self, bytes: usize, keyframe: bool) {
        self.delivered_frames += 1;
        self.bytes_encoded += bytes as u64;
        if keyframe {
            self.keyframes += 1;
        }
    }

    /// Record a bitrate change
    pub fn bitrate_changed(&mut self, bitrate: u32) {
        if bitrate != self.current_bitrate {
            self.current_bitrate = bitrate;
            self.bitrate_changes += 1;
        }
    }

    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Measured output bitrate in bits per second
    pub fn measured_bitrate(&self) -> u64 {
        Self::bitrate_over(self.bytes_encoded, self.duration())
    }

    /// Bits per second for `bytes` over `duration` (0 for sub-second durations)
    pub fn bitrate_over(bytes: u64, duration: Duration) -> u64 {
        let secs = duration.as_secs();
        if secs > 0 {
            (bytes * 8) / secs
        } else {
            0
        }
    }

    /// Share of captured frames that were skipped or dropped
    pub fn discard_ratio(&self) -> f64 {
        if self.captured_frames == 0 {
            return 0.0;
        }
        (self.skipped_frames + self.dropped_frames) as f64 / self.captured_frames as f64
    }
}
