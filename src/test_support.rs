//! Test doubles shared by the unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::component::{
    AudioCodec, AudioSource, BroadcastComponent, ComponentRole, Lifecycle, VideoCodec,
};
use crate::config::{MediaConfig, StreamConfig};
use crate::data::{amf0, DataMap, DataScope, DataTransport, StructuredValue};
use crate::error::{Error, Result};
use crate::media::{
    AudioFrame, AudioSink, EncodedFrame, EncodedFrameSink, VideoFrame, VideoSink,
};
use crate::status::{Status, StatusCallback};

/// Route `tracing` output through the test harness; `RUST_LOG` controls it
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
pub struct CountingVideoSink {
    frames: AtomicUsize,
}

impl CountingVideoSink {
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

impl VideoSink for CountingVideoSink {
    fn video_frame_captured(&self, _frame: &VideoFrame) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct CountingAudioSink {
    frames: AtomicUsize,
}

impl CountingAudioSink {
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

impl AudioSink for CountingAudioSink {
    fn audio_frame_captured(&self, _frame: &AudioFrame) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct CountingEncodedSink {
    frames: AtomicUsize,
}

impl CountingEncodedSink {
    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }
}

impl EncodedFrameSink for CountingEncodedSink {
    fn encoded_frame(&self, _frame: &EncodedFrame) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every status it receives
#[derive(Default)]
pub struct RecordingCallback {
    statuses: Mutex<Vec<Status>>,
    errors: AtomicUsize,
}

impl RecordingCallback {
    pub fn statuses(&self) -> Vec<Status> {
        self.statuses.lock().clone()
    }

    /// Number of `on_error` calls
    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

impl StatusCallback for RecordingCallback {
    fn on_status(&self, status: &Status) {
        self.statuses.lock().push(status.clone());
    }

    fn on_error(&self, status: &Status) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.statuses.lock().push(status.clone());
    }
}

/// Transport that decodes and keeps every payload
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<(DataScope, Bytes)>>,
    connects: Mutex<Vec<DataMap>>,
    fail: Mutex<bool>,
    fail_connect: Mutex<bool>,
}

impl MockTransport {
    pub fn fail_sends(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn fail_connect(&self, fail: bool) {
        *self.fail_connect.lock() = fail;
    }

    /// Connect command objects received so far
    pub fn connects(&self) -> Vec<DataMap> {
        self.connects.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn last_decoded(&self) -> Option<(DataScope, Vec<StructuredValue>)> {
        let (scope, payload) = self.sent.lock().last().cloned()?;
        let values = amf0::decode_all(payload).ok()?;
        Some((scope, values))
    }
}

impl DataTransport for MockTransport {
    fn connect(&self, _config: &StreamConfig, properties: &DataMap) -> Result<()> {
        if *self.fail_connect.lock() {
            return Err(Error::Transport("connection refused".into()));
        }
        self.connects.lock().push(properties.clone());
        Ok(())
    }

    fn send(&self, scope: DataScope, payload: Bytes) -> Result<()> {
        if *self.fail.lock() {
            return Err(Error::Transport("connection closed".into()));
        }
        self.sent.lock().push((scope, payload));
        Ok(())
    }
}

#[derive(Default)]
struct VideoCodecState {
    configured_bitrate: Option<u32>,
    fail_configure: bool,
    fail_encode: bool,
    queued: usize,
}

/// Video codec emitting one encoded frame per input; clones share state
#[derive(Clone, Default)]
pub struct MockVideoCodec {
    state: Arc<Mutex<VideoCodecState>>,
}

impl MockVideoCodec {
    pub fn configured_bitrate(&self) -> Option<u32> {
        self.state.lock().configured_bitrate
    }

    pub fn fail_configure(&self, fail: bool) {
        self.state.lock().fail_configure = fail;
    }

    pub fn fail_encode(&self, fail: bool) {
        self.state.lock().fail_encode = fail;
    }

    /// Make the next flush return `count` frames
    pub fn queue_flush(&self, count: usize) {
        self.state.lock().queued = count;
    }
}

impl VideoCodec for MockVideoCodec {
    fn configure(&mut self, config: &MediaConfig) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_configure {
            return Err(Error::Codec("unsupported profile".into()));
        }
        state.configured_bitrate = Some(config.video_bitrate);
        Ok(())
    }

    fn set_bitrate(&mut self, bitrate: u32) -> Result<()> {
        self.state.lock().configured_bitrate = Some(bitrate);
        Ok(())
    }

    fn encode(&mut self, frame: &VideoFrame) -> Result<Option<EncodedFrame>> {
        if self.state.lock().fail_encode {
            return Err(Error::Codec("encode failed".into()));
        }
        Ok(Some(EncodedFrame::video(
            frame.timestamp,
            frame.data.clone(),
            frame.timestamp == 0,
            false,
        )))
    }

    fn flush(&mut self) -> Result<Vec<EncodedFrame>> {
        let count = std::mem::take(&mut self.state.lock().queued);
        Ok((0..count)
            .map(|i| EncodedFrame::video(i as u32, Bytes::from_static(&[0u8; 4]), false, false))
            .collect())
    }
}

#[derive(Default)]
struct AudioSourceState {
    capturing: bool,
    fail_open: bool,
}

/// Microphone double; clones share state
#[derive(Clone, Default)]
pub struct MockAudioSource {
    state: Arc<Mutex<AudioSourceState>>,
}

impl MockAudioSource {
    pub fn is_capturing(&self) -> bool {
        self.state.lock().capturing
    }

    pub fn fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }
}

impl AudioSource for MockAudioSource {
    fn open(&mut self, _channels: u32, sample_rate: u32) -> Result<u32> {
        if self.state.lock().fail_open {
            return Err(Error::Codec("microphone unavailable".into()));
        }
        Ok(if sample_rate == 0 { 48_000 } else { sample_rate })
    }

    fn start(&mut self) -> Result<()> {
        self.state.lock().capturing = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.state.lock().capturing = false;
        Ok(())
    }
}

/// Audio codec compressing PCM 8:1; clones share state
#[derive(Clone, Default)]
pub struct MockAudioCodec {
    fail_configure: Arc<Mutex<bool>>,
}

impl MockAudioCodec {
    pub fn fail_configure(&self, fail: bool) {
        *self.fail_configure.lock() = fail;
    }
}

impl AudioCodec for MockAudioCodec {
    fn configure(&mut self, _channels: u32, _sample_rate: u32, _bitrate: u32) -> Result<()> {
        if *self.fail_configure.lock() {
            return Err(Error::Codec("unsupported sample rate".into()));
        }
        Ok(())
    }

    fn encode(&mut self, frame: &AudioFrame) -> Result<Option<EncodedFrame>> {
        let encoded = Bytes::from(vec![0u8; frame.samples.len() / 8]);
        Ok(Some(EncodedFrame::audio(frame.timestamp, encoded, false)))
    }
}

/// Ordered log of component calls shared by several mocks
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    fn record(&self, role: ComponentRole, call: &str) {
        self.entries.lock().push(format!("{}: {}", role, call));
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

#[derive(Default)]
struct Failures {
    prepare: Option<Error>,
    start: Option<Error>,
    stop: Option<Error>,
}

/// Component counting its lifecycle calls, with injectable failures
pub struct MockComponent {
    lifecycle: Lifecycle,
    log: CallLog,
    prepares: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    failures: Mutex<Failures>,
    prepare_delay: Mutex<Option<Duration>>,
}

impl MockComponent {
    pub fn new(role: ComponentRole, log: &CallLog) -> Self {
        Self {
            lifecycle: Lifecycle::new(role),
            log: log.clone(),
            prepares: AtomicUsize::new(0),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            failures: Mutex::new(Failures::default()),
            prepare_delay: Mutex::new(None),
        }
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn fail_prepare_with(&self, error: Error) {
        self.failures.lock().prepare = Some(error);
    }

    pub fn fail_start_with(&self, error: Error) {
        self.failures.lock().start = Some(error);
    }

    pub fn fail_stop_with(&self, error: Error) {
        self.failures.lock().stop = Some(error);
    }

    pub fn clear_failures(&self) {
        *self.failures.lock() = Failures::default();
    }

    /// Sleep inside prepare, to hold a transition open
    pub fn set_prepare_delay(&self, delay: Duration) {
        *self.prepare_delay.lock() = Some(delay);
    }

    fn result(failure: &Option<Error>) -> Result<()> {
        match failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl BroadcastComponent for MockComponent {
    fn role(&self) -> ComponentRole {
        self.lifecycle.role()
    }

    fn get_status(&self) -> Status {
        self.lifecycle.status()
    }

    fn prepare_for_broadcast(&self, _config: &StreamConfig) -> Status {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        self.log.record(self.role(), "prepare");
        let delay = *self.prepare_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let outcome = Self::result(&self.failures.lock().prepare);
        self.lifecycle.prepare(|| outcome)
    }

    fn start_broadcasting(&self) -> Status {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.log.record(self.role(), "start");
        let outcome = Self::result(&self.failures.lock().start);
        self.lifecycle.start(|| outcome)
    }

    fn stop_broadcasting(&self) -> Status {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.log.record(self.role(), "stop");
        let outcome = Self::result(&self.failures.lock().stop);
        self.lifecycle.stop(|| outcome)
    }

    fn set_status_observer(&self, observer: Option<Arc<dyn StatusCallback>>) {
        self.lifecycle.set_observer(observer);
    }
}
