//! Encoder statistics

pub mod metrics;

pub use metrics::{EncoderStats, FrameOutcome};
