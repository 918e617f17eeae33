//! Simulated broadcast over a congested link
//!
//! Run with: cargo run --example simulated_broadcast [SECONDS]
//!
//! Wires a session with synthetic capture and codecs to a fake network link
//! whose capacity collapses for a few seconds mid-stream. Watch the encoder
//! report low bandwidth, cut its bitrate, skip frames, pause if the backlog
//! keeps growing, then step back up once the link recovers.
//!
//! Logging is controlled with RUST_LOG, e.g.
//!   RUST_LOG=livecast=debug cargo run --example simulated_broadcast

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use livecast::abr::{spawn_backlog_monitor, BacklogCounter};
use livecast::component::{
    AdaptiveVideoEncoder, AudioCodec, AudioDevice, AudioEncoder, AudioSource, VideoCodec,
};
use livecast::data::{amf0, DataScope, DataTransport};
use livecast::media::{AudioFrame, EncodedFrame, EncodedFrameSink, MediaSink, VideoFrame};
use livecast::{BroadcastSession, DataMap, MediaConfig, Status, StreamConfig};

const FRAME_RATE: u32 = 30;

/// Emits frames sized to the current bitrate
struct SyntheticVideoCodec {
    bitrate: u32,
    frame_rate: u32,
}

impl VideoCodec for SyntheticVideoCodec {
    fn configure(&mut self, config: &MediaConfig) -> livecast::Result<()> {
        self.bitrate = config.video_bitrate;
        self.frame_rate = config.video_frame_rate.max(1);
        Ok(())
    }

    fn set_bitrate(&mut self, bitrate: u32) -> livecast::Result<()> {
        self.bitrate = bitrate;
        Ok(())
    }

    fn encode(&mut self, frame: &VideoFrame) -> livecast::Result<Option<EncodedFrame>> {
        let size = (self.bitrate / 8 / self.frame_rate) as usize;
        let keyframe = frame.timestamp % 2000 < 34;
        Ok(Some(EncodedFrame::video(
            frame.timestamp,
            Bytes::from(vec![0u8; size]),
            keyframe,
            false,
        )))
    }
}

struct SilentMicrophone;

impl AudioSource for SilentMicrophone {
    fn open(&mut self, _channels: u32, sample_rate: u32) -> livecast::Result<u32> {
        Ok(if sample_rate == 0 { 44_100 } else { sample_rate })
    }

    fn start(&mut self) -> livecast::Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> livecast::Result<()> {
        Ok(())
    }
}

struct SyntheticAudioCodec;

impl AudioCodec for SyntheticAudioCodec {
    fn configure(&mut self, _channels: u32, _sample_rate: u32, _bitrate: u32) -> livecast::Result<()> {
        Ok(())
    }

    fn encode(&mut self, frame: &AudioFrame) -> livecast::Result<Option<EncodedFrame>> {
        let encoded = Bytes::from(vec![0u8; frame.samples.len() / 10]);
        Ok(Some(EncodedFrame::audio(frame.timestamp, encoded, false)))
    }
}

/// Network link: every encoded frame joins the send queue
struct SimulatedLink {
    queue: Arc<BacklogCounter>,
}

impl EncodedFrameSink for SimulatedLink {
    fn encoded_frame(&self, _frame: &EncodedFrame) {
        self.queue.frame_enqueued();
    }
}

/// Prints the connect request and outgoing data events
struct PrintingTransport;

impl DataTransport for PrintingTransport {
    fn connect(&self, config: &StreamConfig, properties: &DataMap) -> livecast::Result<()> {
        println!("connect {}: {:?}", config.connect_url(), properties);
        Ok(())
    }

    fn send(&self, scope: DataScope, payload: Bytes) -> livecast::Result<()> {
        let values = amf0::decode_all(payload)?;
        println!("[{}] data event: {:?}", scope, values);
        Ok(())
    }
}

/// Frames the link flushes on frame tick `tick`
fn link_capacity(tick: u32, elapsed: Duration, total: Duration) -> usize {
    let congested = elapsed >= total / 4 && elapsed < total / 2;
    match (congested, tick % 3) {
        (false, _) => 4,
        (true, 0) => 1,
        (true, _) => 0,
    }
}

fn print_status(status: &Status) {
    if let Some(error) = &status.error {
        println!("[{}] error: {}", status.state, error);
    } else if let Some(bitrate) = status.new_bitrate() {
        println!(
            "[{}] {:?}: {} -> {} bps",
            status.state,
            status.event,
            status.previous_bitrate().unwrap_or_default(),
            bitrate
        );
    } else {
        println!("[{}] {:?}", status.state, status.event);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let seconds: u64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 16,
    };
    let total = Duration::from_secs(seconds);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("livecast=info".parse()?),
        )
        .init();

    let video_encoder = Arc::new(AdaptiveVideoEncoder::new(SyntheticVideoCodec {
        bitrate: 0,
        frame_rate: FRAME_RATE,
    }));
    let audio_device = Arc::new(AudioDevice::new(SilentMicrophone));
    let audio_encoder = Arc::new(AudioEncoder::new(SyntheticAudioCodec));

    let session = BroadcastSession::new()
        .with_component(audio_device.clone())
        .with_component(audio_encoder.clone())
        .with_component(video_encoder.clone())
        .with_transport(Arc::new(PrintingTransport));

    let queue = Arc::new(BacklogCounter::new());
    let link = Arc::new(SimulatedLink {
        queue: Arc::clone(&queue),
    });
    session.register_sink(MediaSink::Audio(audio_encoder.clone()));
    session.register_sink(MediaSink::EncodedVideo(link.clone()));
    session.register_sink(MediaSink::EncodedAudio(link));

    let config = StreamConfig::new("localhost", "live", "simulated").media(
        MediaConfig::default()
            .frame_rate(FRAME_RATE)
            .bitrate(2_500_000)
            .audio(2, 44_100, 96_000),
    );

    let status = session.start_broadcast(&config, Some(Arc::new(print_status)));
    if let Some(error) = status.error {
        return Err(error.into());
    }

    let monitor = spawn_backlog_monitor(
        Arc::clone(&queue),
        Arc::downgrade(&video_encoder),
        Duration::from_millis(250),
    );

    let started = tokio::time::Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_millis(1000 / FRAME_RATE as u64));
    let mut tick: u32 = 0;
    while started.elapsed() < total {
        ticker.tick().await;
        let timestamp = tick * (1000 / FRAME_RATE);

        let frame = VideoFrame::new(1280, 720, timestamp, Bytes::from_static(&[0u8; 64]));
        video_encoder.encode_frame(&frame)?;

        let pcm = AudioFrame::new(44_100, 2, timestamp, Bytes::from(vec![0u8; 5880]));
        audio_device.deliver_samples(&pcm);

        queue.frames_acknowledged(link_capacity(tick, started.elapsed(), total));

        if tick % (FRAME_RATE * 4) == 0 {
            let mut cue = DataMap::new();
            cue.set_integer("position", i64::from(timestamp));
            session.send_data_event(DataScope::Stream, "onCuePoint", Some(cue), None)?;
        }
        tick += 1;
    }

    monitor.abort();
    let status = session.end_broadcast(None);
    println!("Broadcast ended: {}", status.state);

    let stats = video_encoder.stats();
    println!();
    println!("=== Video encoder ===");
    println!("captured:  {}", stats.captured_frames);
    println!("delivered: {}", stats.delivered_frames);
    println!("skipped:   {}", stats.skipped_frames);
    println!("dropped:   {}", stats.dropped_frames);
    println!("bitrate changes: {}", stats.bitrate_changes);
    println!("measured bitrate: {} bps", stats.measured_bitrate());

    Ok(())
}
