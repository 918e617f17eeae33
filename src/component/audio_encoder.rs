//! Audio encoder component

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::codec::AudioCodec;
use super::lifecycle::Lifecycle;
use super::{BroadcastComponent, ComponentRole};
use crate::config::StreamConfig;
use crate::error::Result;
use crate::media::{AudioFrame, AudioSink, MediaKind, MediaSink, MediaSinkRegistry};
use crate::stats::{EncoderStats, FrameOutcome};
use crate::status::{Status, StatusCallback};

/// Audio encoder
///
/// Register it as an audio sink on the capture device; encoded output goes to
/// encoded-audio sinks.
pub struct AudioEncoder<C: AudioCodec> {
    lifecycle: Lifecycle,
    codec: Mutex<C>,
    sinks: MediaSinkRegistry,
    stats: Mutex<EncoderStats>,
    enabled: AtomicBool,
}

impl<C: AudioCodec> AudioEncoder<C> {
    pub fn new(codec: C) -> Self {
        Self {
            lifecycle: Lifecycle::new(ComponentRole::AudioEncoder),
            codec: Mutex::new(codec),
            sinks: MediaSinkRegistry::new(),
            stats: Mutex::new(EncoderStats::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Encode a block of PCM and fan the output out to encoded-audio sinks
    ///
    /// Returns `false` if the block was ignored (not running or audio disabled).
    pub fn encode_samples(&self, frame: &AudioFrame) -> Result<bool> {
        if !self.lifecycle.is_running() || !self.enabled.load(Ordering::Acquire) {
            return Ok(false);
        }

        let encoded = self.codec.lock().encode(frame);
        match encoded {
            Ok(Some(encoded)) => {
                self.stats.lock().record(FrameOutcome::Delivered {
                    bytes: encoded.len(),
                    keyframe: false,
                });
                self.sinks.dispatch_encoded(&encoded);
            }
            Ok(None) => self.stats.lock().record(FrameOutcome::Buffered),
            Err(e) => {
                tracing::warn!(error = %e, timestamp = frame.timestamp, "Audio encode failed");
                self.lifecycle
                    .publish(Status::with_error(self.lifecycle.state(), e.clone()));
                return Err(e);
            }
        }
        Ok(true)
    }

    pub fn stats(&self) -> EncoderStats {
        self.stats.lock().clone()
    }
}

impl<C: AudioCodec> BroadcastComponent for AudioEncoder<C> {
    fn role(&self) -> ComponentRole {
        ComponentRole::AudioEncoder
    }

    fn get_status(&self) -> Status {
        self.lifecycle.status()
    }

    fn prepare_for_broadcast(&self, config: &StreamConfig) -> Status {
        self.lifecycle.prepare(|| {
            let media = &config.media;
            self.enabled.store(media.audio_enabled, Ordering::Release);
            if !media.audio_enabled {
                return Ok(());
            }

            self.codec.lock().configure(
                media.audio_channels,
                media.audio_sample_rate,
                media.audio_bitrate,
            )?;
            self.stats.lock().restart(media.audio_bitrate);
            Ok(())
        })
    }

    fn start_broadcasting(&self) -> Status {
        self.lifecycle.start(|| Ok(()))
    }

    fn stop_broadcasting(&self) -> Status {
        self.lifecycle.stop(|| {
            if !self.enabled.load(Ordering::Acquire) {
                return Ok(());
            }
            let flushed = self.codec.lock().flush()?;
            for frame in flushed {
                self.stats.lock().record_output(frame.len(), false);
                self.sinks.dispatch_encoded(&frame);
            }
            Ok(())
        })
    }

    fn register_sink(&self, sink: MediaSink) -> bool {
        match sink.kind() {
            MediaKind::EncodedAudio => self.sinks.register(sink),
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

impl<C: AudioCodec> AudioSink for AudioEncoder<C> {
    fn audio_frame_captured(&self, frame: &AudioFrame) {
        let _ = self.encode_samples(frame);
    }
}
