//! Adaptive bitrate control
//!
//! The video encoder feeds the controller a backlog measure (frames queued for
//! transmission but not yet acknowledged). When the backlog reaches
//! `multiplier x frame rate` the controller reduces the bitrate and starts
//! skipping frames; past a hard ceiling it pauses delivery altogether. Once the
//! backlog stays below the threshold for a full observation window it resumes
//! and steps the bitrate back toward the configured value.
//!
//! Throttling is the normal response to a slow network and is never reported as
//! an error: every change surfaces as a [`BroadcastEvent`](crate::status::BroadcastEvent).

pub mod controller;
pub mod monitor;
pub mod settings;

pub use controller::{AdaptiveBitrateController, ControllerEvent, FrameDecision};
pub use monitor::{spawn_backlog_monitor, BacklogCounter, BacklogObserver, BacklogSource};
pub use settings::ControllerSettings;
