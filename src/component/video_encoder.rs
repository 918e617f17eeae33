//! Video encoder with adaptive bitrate control

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::codec::VideoCodec;
use super::lifecycle::Lifecycle;
use super::{BroadcastComponent, ComponentRole};
use crate::abr::{
    AdaptiveBitrateController, BacklogObserver, ControllerEvent, ControllerSettings, FrameDecision,
};
use crate::config::StreamConfig;
use crate::error::Result;
use crate::media::{EncodedFrame, MediaKind, MediaSink, MediaSinkRegistry, VideoFrame, VideoSink};
use crate::stats::{EncoderStats, FrameOutcome};
use crate::status::{BroadcastState, Status, StatusCallback};

/// Video encoder component
///
/// Every captured frame passes through the [`AdaptiveBitrateController`]
/// before reaching the codec. Raw frames are also fanned out to video sinks
/// (preview, recording) regardless of the controller's decision.
pub struct AdaptiveVideoEncoder<C: VideoCodec> {
    lifecycle: Lifecycle,
    codec: Mutex<C>,
    controller: Mutex<Option<AdaptiveBitrateController>>,
    sinks: MediaSinkRegistry,
    stats: Mutex<EncoderStats>,
    enabled: Mutex<bool>,
}

impl<C: VideoCodec> AdaptiveVideoEncoder<C> {
    pub fn new(codec: C) -> Self {
        Self {
            lifecycle: Lifecycle::new(ComponentRole::VideoEncoder),
            codec: Mutex::new(codec),
            controller: Mutex::new(None),
            sinks: MediaSinkRegistry::new(),
            stats: Mutex::new(EncoderStats::new()),
            enabled: Mutex::new(true),
        }
    }

    /// Run a captured frame through the controller and, if admitted, the codec
    ///
    /// Frames arriving while not running are ignored (`Drop`). Codec errors are
    /// published to the status observer as well as returned.
    pub fn encode_frame(&self, frame: &VideoFrame) -> Result<FrameDecision> {
        self.sinks.dispatch_video(frame);

        if !self.lifecycle.is_running() || !*self.enabled.lock() {
            return Ok(FrameDecision::Drop);
        }

        let decision = self
            .controller
            .lock()
            .as_mut()
            .map_or(FrameDecision::Deliver, |c| c.admit_frame());

        if decision != FrameDecision::Deliver {
            self.stats.lock().record(decision.into());
            return Ok(decision);
        }

        let encoded = self.codec.lock().encode(frame);
        match encoded {
            Ok(Some(encoded)) => {
                self.stats.lock().record(FrameOutcome::Delivered {
                    bytes: encoded.len(),
                    keyframe: encoded.is_keyframe,
                });
                self.sinks.dispatch_encoded(&encoded);
            }
            Ok(None) => self.stats.lock().record(FrameOutcome::Buffered),
            Err(e) => {
                tracing::warn!(error = %e, timestamp = frame.timestamp, "Video encode failed");
                self.lifecycle
                    .publish(Status::with_error(self.lifecycle.state(), e.clone()));
                return Err(e);
            }
        }
        Ok(decision)
    }

    /// Feed a backlog sample taken at `now`
    ///
    /// Bitrate changes are applied to the codec before the resulting events are
    /// published; the observer is called without any encoder lock held.
    pub fn observe_backlog(&self, backlog: usize, now: Instant) -> Vec<ControllerEvent> {
        if !self.lifecycle.is_running() {
            return Vec::new();
        }

        let events = {
            let mut guard = self.controller.lock();
            let Some(controller) = guard.as_mut() else {
                return Vec::new();
            };
            let events = controller.observe(backlog, now);

            // Codec updates happen under the controller lock, in controller order
            let bitrate_changed = events.iter().any(|e| {
                matches!(
                    e,
                    ControllerEvent::BitrateReduced { .. }
                        | ControllerEvent::BitrateIncreased { .. }
                )
            });
            if bitrate_changed {
                let bitrate = controller.current_bitrate();
                if let Err(e) = self.codec.lock().set_bitrate(bitrate) {
                    tracing::warn!(bitrate, error = %e, "Failed to apply bitrate");
                }
                self.stats.lock().bitrate_changed(bitrate);
            }
            events
        };

        for event in &events {
            match event {
                ControllerEvent::LowBandwidth { backlog } => {
                    tracing::warn!(backlog, "Low bandwidth detected")
                }
                ControllerEvent::BitrateReduced { previous, new } => {
                    tracing::warn!(previous, new, "Video bitrate reduced")
                }
                ControllerEvent::BitrateIncreased { previous, new } => {
                    tracing::info!(previous, new, "Video bitrate increased")
                }
                ControllerEvent::EncoderPaused => {
                    tracing::warn!(backlog, "Video frame delivery paused")
                }
                ControllerEvent::EncoderResumed => {
                    tracing::info!(backlog, "Video frame delivery resumed")
                }
            }
            self.lifecycle
                .publish(event.to_status(BroadcastState::Running));
        }
        events
    }

    /// Bitrate the codec is currently configured with
    pub fn current_bitrate(&self) -> Option<u32> {
        self.controller.lock().as_ref().map(|c| c.current_bitrate())
    }

    /// Settings the controller was built with for the current broadcast
    pub fn controller_settings(&self) -> Option<ControllerSettings> {
        self.controller.lock().as_ref().map(|c| c.settings().clone())
    }

    /// Replace the controller settings for the current broadcast
    ///
    /// Resets the controller to the unthrottled state. Ignored if not prepared.
    pub fn set_controller_settings(&self, settings: ControllerSettings) {
        let mut guard = self.controller.lock();
        if guard.is_some() {
            *guard = Some(AdaptiveBitrateController::new(settings));
        }
    }

    pub fn stats(&self) -> EncoderStats {
        self.stats.lock().clone()
    }

    fn deliver_flushed(&self, frames: Vec<EncodedFrame>) {
        for frame in frames {
            self.stats.lock().record_output(frame.len(), frame.is_keyframe);
            self.sinks.dispatch_encoded(&frame);
        }
    }
}

impl<C: VideoCodec> BroadcastComponent for AdaptiveVideoEncoder<C> {
    fn role(&self) -> ComponentRole {
        ComponentRole::VideoEncoder
    }

    fn get_status(&self) -> Status {
        self.lifecycle.status()
    }

    fn prepare_for_broadcast(&self, config: &StreamConfig) -> Status {
        self.lifecycle.prepare(|| {
            let media = &config.media;
            *self.enabled.lock() = media.video_enabled;
            if !media.video_enabled {
                *self.controller.lock() = None;
                return Ok(());
            }

            self.codec.lock().configure(media)?;
            let settings = ControllerSettings::from_media_config(media);
            tracing::debug!(
                size = %media.frame_size_label(),
                bitrate = settings.target_bitrate,
                threshold = settings.backlog_threshold,
                skip = settings.skip_count,
                "Video encoder configured"
            );
            self.stats.lock().restart(settings.target_bitrate);
            *self.controller.lock() = Some(AdaptiveBitrateController::new(settings));
            Ok(())
        })
    }

    fn start_broadcasting(&self) -> Status {
        self.lifecycle.start(|| Ok(()))
    }

    fn stop_broadcasting(&self) -> Status {
        self.lifecycle.stop(|| {
            let flushed = if *self.enabled.lock() {
                self.codec.lock().flush()
            } else {
                Ok(Vec::new())
            };
            *self.controller.lock() = None;
            self.deliver_flushed(flushed?);
            Ok(())
        })
    }

    fn register_sink(&self, sink: MediaSink) -> bool {
        match sink.kind() {
            MediaKind::Video | MediaKind::EncodedVideo => self.sinks.register(sink),
            _ => false,
        }
    }

    fn unregister_sink(&self, sink: &MediaSink) -> bool {
        self.sinks.unregister(sink)
    }

    fn set_status_observer(&self, observer: Option<Arc<dyn StatusCallback>>) {
        self.lifecycle.set_observer(observer);
    }
}

impl<C: VideoCodec> VideoSink for AdaptiveVideoEncoder<C> {
    fn video_frame_captured(&self, frame: &VideoFrame) {
        // Errors are already published to the observer
        let _ = self.encode_frame(frame);
    }
}

impl<C: VideoCodec> BacklogObserver for AdaptiveVideoEncoder<C> {
    fn update_backlog(&self, backlog: usize) {
        self.observe_backlog(backlog, Instant::now());
    }
}
