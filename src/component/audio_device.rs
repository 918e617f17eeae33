//! Audio capture component

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::codec::AudioSource;
use super::lifecycle::Lifecycle;
use super::{BroadcastComponent, ComponentRole};
use crate::config::StreamConfig;
use crate::media::{AudioFrame, MediaKind, MediaSink, MediaSinkRegistry};
use crate::status::{Status, StatusCallback};

/// Microphone capture
///
/// The platform capture thread pushes PCM into [`deliver_samples`](Self::deliver_samples);
/// while running and not muted the samples are fanned out to audio sinks (the
/// audio encoder among them).
pub struct AudioDevice<S: AudioSource> {
    lifecycle: Lifecycle,
    source: Mutex<S>,
    sinks: MediaSinkRegistry,
    paused: AtomicBool,
    enabled: AtomicBool,
    sample_rate: AtomicU32,
}

impl<S: AudioSource> AudioDevice<S> {
    pub fn new(source: S) -> Self {
        Self {
            lifecycle: Lifecycle::new(ComponentRole::AudioDevice),
            source: Mutex::new(source),
            sinks: MediaSinkRegistry::new(),
            paused: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
            sample_rate: AtomicU32::new(0),
        }
    }

    /// Mute or unmute; muted samples are discarded
    pub fn set_paused(&self, paused: bool) {
        if self.paused.swap(paused, Ordering::AcqRel) != paused {
            tracing::info!(paused, "Audio capture mute changed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Sample rate selected by the source (0 before prepare)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    /// Fan captured PCM out to the audio sinks; returns the number reached
    pub fn deliver_samples(&self, frame: &AudioFrame) -> usize {
        if !self.lifecycle.is_running() || self.is_paused() {
            return 0;
        }
        self.sinks.dispatch_audio(frame)
    }
}

impl<S: AudioSource> BroadcastComponent for AudioDevice<S> {
    fn role(&self) -> ComponentRole {
        ComponentRole::AudioDevice
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

            let rate = self
                .source
                .lock()
                .open(media.audio_channels, media.audio_sample_rate)?;
            self.sample_rate.store(rate, Ordering::Release);
            tracing::debug!(
                channels = media.audio_channels,
                sample_rate = rate,
                "Audio device opened"
            );
            Ok(())
        })
    }

    fn start_broadcasting(&self) -> Status {
        self.lifecycle.start(|| {
            if self.enabled.load(Ordering::Acquire) {
                self.source.lock().start()?;
            }
            Ok(())
        })
    }

    fn stop_broadcasting(&self) -> Status {
        self.lifecycle.stop(|| {
            if self.enabled.load(Ordering::Acquire) {
                self.source.lock().stop()?;
            }
            Ok(())
        })
    }

    fn register_sink(&self, sink: MediaSink) -> bool {
        match sink.kind() {
            MediaKind::Audio => self.sinks.register(sink),
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
