//! Capture and encoding configuration

/// Known frame sizes
///
/// Not every capture device supports every preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameSizePreset {
    Size352x288,
    Size640x480,
    Size1280x720,
    Size1920x1080,
    Size3840x2160,
}

impl FrameSizePreset {
    /// All presets, smallest first
    pub const ALL: [FrameSizePreset; 5] = [
        FrameSizePreset::Size352x288,
        FrameSizePreset::Size640x480,
        FrameSizePreset::Size1280x720,
        FrameSizePreset::Size1920x1080,
        FrameSizePreset::Size3840x2160,
    ];

    /// Frame size as (width, height)
    pub fn size(self) -> (u32, u32) {
        match self {
            FrameSizePreset::Size352x288 => (352, 288),
            FrameSizePreset::Size640x480 => (640, 480),
            FrameSizePreset::Size1280x720 => (1280, 720),
            FrameSizePreset::Size1920x1080 => (1920, 1080),
            FrameSizePreset::Size3840x2160 => (3840, 2160),
        }
    }

    /// Recommended video bitrate (bits/sec) for this frame size
    pub fn recommended_bitrate(self) -> u32 {
        match self {
            FrameSizePreset::Size352x288 => 500_000,
            FrameSizePreset::Size640x480 => 1_500_000,
            FrameSizePreset::Size1280x720 => 3_750_000,
            FrameSizePreset::Size1920x1080 => 5_000_000,
            FrameSizePreset::Size3840x2160 => 15_000_000,
        }
    }

    /// Preset whose width is closest to `width` (ties go to the smaller preset)
    pub fn closest_by_width(width: u32) -> FrameSizePreset {
        let mut best = FrameSizePreset::Size352x288;
        let mut best_delta = u32::MAX;
        for preset in Self::ALL {
            let delta = preset.size().0.abs_diff(width);
            if delta < best_delta {
                best = preset;
                best_delta = delta;
            }
        }
        best
    }
}

/// Orientation of the broadcast video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastOrientation {
    /// Follow the device orientation at broadcast start
    #[default]
    SameAsDevice,
    AlwaysLandscape,
    AlwaysPortrait,
}

/// How captured frames that don't match the broadcast frame size are adjusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastScaleMode {
    /// Scale down to fit within the frame
    #[default]
    AspectFit,
    /// Scale up to completely fill the frame
    AspectFill,
}

/// Audio channel counts
pub struct AudioChannels;

impl AudioChannels {
    pub const MONO: u32 = 1;
    pub const STEREO: u32 = 2;
}

/// Default low-bandwidth bitrate scaling factor
pub const DEFAULT_LOW_BANDWIDTH_SCALING_FACTOR: f32 = 0.75;

/// Default frame buffer size multiplier
pub const DEFAULT_FRAME_BUFFER_SIZE_MULTIPLIER: u32 = 4;

/// Default low-bandwidth skip count (deliver 1 of every 2 frames)
pub const DEFAULT_LOW_BANDWIDTH_SKIP_COUNT: u32 = 2;

/// Capture and encoding settings
#[derive(Debug, Clone, PartialEq)]
pub struct MediaConfig {
    /// Capture and encode video
    pub video_enabled: bool,

    /// Capture and encode audio
    pub audio_enabled: bool,

    /// Video frame width in pixels
    pub video_width: u32,

    /// Video frame height in pixels
    pub video_height: u32,

    /// Desired frame rate; the delivered rate drops under low bandwidth
    pub video_frame_rate: u32,

    /// Frames between two key frames
    pub video_key_frame_interval: u32,

    /// Desired video bitrate (bits/sec); reduced under low bandwidth
    pub video_bitrate: u32,

    /// Factor applied to the bitrate under low bandwidth, in [0, 1]
    ///
    /// 0 lets the encoder choose; 1 never throttles the bitrate.
    video_bitrate_low_bandwidth_scaling_factor: f32,

    /// Frames to buffer before throttling = multiplier x frame rate (0 = encoder chooses)
    pub video_frame_buffer_size_multiplier: u32,

    /// Under low bandwidth deliver 1 of every `n` frames (1 = never skip)
    ///
    /// Clamped to key frame interval - 1 when applied.
    pub video_frame_rate_low_bandwidth_skip_count: u32,

    /// Orientation of the broadcast video
    pub broadcast_video_orientation: BroadcastOrientation,

    /// Scale mode for captured frames
    pub broadcast_scale_mode: BroadcastScaleMode,

    /// Number of audio channels
    pub audio_channels: u32,

    /// Audio sample rate in Hz (0 = select from hardware)
    pub audio_sample_rate: u32,

    /// Audio bitrate in bits/sec (0 = select from hardware)
    pub audio_bitrate: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        let preset = FrameSizePreset::Size1280x720;
        let (width, height) = preset.size();
        Self {
            video_enabled: true,
            audio_enabled: true,
            video_width: width,
            video_height: height,
            video_frame_rate: 30,
            video_key_frame_interval: 30,
            video_bitrate: preset.recommended_bitrate(),
            video_bitrate_low_bandwidth_scaling_factor: DEFAULT_LOW_BANDWIDTH_SCALING_FACTOR,
            video_frame_buffer_size_multiplier: DEFAULT_FRAME_BUFFER_SIZE_MULTIPLIER,
            video_frame_rate_low_bandwidth_skip_count: DEFAULT_LOW_BANDWIDTH_SKIP_COUNT,
            broadcast_video_orientation: BroadcastOrientation::default(),
            broadcast_scale_mode: BroadcastScaleMode::default(),
            audio_channels: AudioChannels::STEREO,
            audio_sample_rate: 0,
            audio_bitrate: 0,
        }
    }
}

impl MediaConfig {
    /// Create a config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config with the frame size and recommended bitrate of a preset
    pub fn with_preset(preset: FrameSizePreset) -> Self {
        let mut config = Self::default();
        config.load_preset(preset);
        config
    }

    /// Apply a preset's frame size and recommended bitrate
    pub fn load_preset(&mut self, preset: FrameSizePreset) {
        let (width, height) = preset.size();
        self.video_width = width;
        self.video_height = height;
        self.video_bitrate = preset.recommended_bitrate();
    }

    /// Preset matching the frame size exactly, in either orientation
    pub fn to_preset(&self) -> Option<FrameSizePreset> {
        let size = self.frame_size();
        FrameSizePreset::ALL
            .into_iter()
            .find(|p| p.size() == size || p.size() == (size.1, size.0))
    }

    /// Preset closest to the frame's long edge, so portrait sizes match their landscape preset
    pub fn to_closest_preset(&self) -> FrameSizePreset {
        FrameSizePreset::closest_by_width(self.video_width.max(self.video_height))
    }

    /// Set frame size
    pub fn frame_size_of(mut self, width: u32, height: u32) -> Self {
        self.video_width = width;
        self.video_height = height;
        self
    }

    /// Set frame rate
    pub fn frame_rate(mut self, fps: u32) -> Self {
        self.video_frame_rate = fps;
        self
    }

    /// Set key frame interval
    pub fn key_frame_interval(mut self, frames: u32) -> Self {
        self.video_key_frame_interval = frames;
        self
    }

    /// Set video bitrate
    pub fn bitrate(mut self, bps: u32) -> Self {
        self.video_bitrate = bps;
        self
    }

    /// Set frame buffer size multiplier
    pub fn frame_buffer_size_multiplier(mut self, multiplier: u32) -> Self {
        self.video_frame_buffer_size_multiplier = multiplier;
        self
    }

    /// Set low-bandwidth skip count
    pub fn low_bandwidth_skip_count(mut self, count: u32) -> Self {
        self.video_frame_rate_low_bandwidth_skip_count = count;
        self
    }

    /// Set low-bandwidth scaling factor (values outside [0, 1] are ignored)
    pub fn low_bandwidth_scaling_factor(mut self, factor: f32) -> Self {
        self.set_low_bandwidth_scaling_factor(factor);
        self
    }

    /// Set audio format
    pub fn audio(mut self, channels: u32, sample_rate: u32, bitrate: u32) -> Self {
        self.audio_channels = channels;
        self.audio_sample_rate = sample_rate;
        self.audio_bitrate = bitrate;
        self
    }

    /// Disable video capture and encoding
    pub fn disable_video(mut self) -> Self {
        self.video_enabled = false;
        self
    }

    /// Disable audio capture and encoding
    pub fn disable_audio(mut self) -> Self {
        self.audio_enabled = false;
        self
    }

    /// Current low-bandwidth scaling factor
    pub fn video_bitrate_low_bandwidth_scaling_factor(&self) -> f32 {
        self.video_bitrate_low_bandwidth_scaling_factor
    }

    /// Set the low-bandwidth scaling factor
    ///
    /// Returns `false` and keeps the prior value if `factor` is outside [0, 1].
    pub fn set_low_bandwidth_scaling_factor(&mut self, factor: f32) -> bool {
        if (0.0..=1.0).contains(&factor) {
            self.video_bitrate_low_bandwidth_scaling_factor = factor;
            true
        } else {
            false
        }
    }

    /// Frame size as (width, height)
    pub fn frame_size(&self) -> (u32, u32) {
        (self.video_width, self.video_height)
    }

    /// Human-readable frame size, e.g. "1280x720"
    pub fn frame_size_label(&self) -> String {
        format!("{}x{}", self.video_width, self.video_height)
    }

    pub fn is_portrait(&self) -> bool {
        self.video_height > self.video_width
    }

    pub fn is_landscape(&self) -> bool {
        self.video_width > self.video_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MediaConfig::default();

        assert_eq!(config.frame_size(), (1280, 720));
        assert_eq!(config.video_frame_rate, 30);
        assert_eq!(config.video_key_frame_interval, 30);
        assert_eq!(config.video_bitrate_low_bandwidth_scaling_factor(), 0.75);
        assert_eq!(config.video_frame_buffer_size_multiplier, 4);
        assert_eq!(config.video_frame_rate_low_bandwidth_skip_count, 2);
        assert_eq!(config.audio_channels, AudioChannels::STEREO);
        assert_eq!(config.audio_sample_rate, 0);
        assert!(config.video_enabled && config.audio_enabled);
    }

    #[test]
    fn test_scaling_factor_out_of_range_ignored() {
        let mut config = MediaConfig::default();

        assert!(config.set_low_bandwidth_scaling_factor(0.5));
        assert_eq!(config.video_bitrate_low_bandwidth_scaling_factor(), 0.5);

        assert!(!config.set_low_bandwidth_scaling_factor(1.5));
        assert!(!config.set_low_bandwidth_scaling_factor(-0.1));
        assert!(!config.set_low_bandwidth_scaling_factor(f32::NAN));
        assert_eq!(config.video_bitrate_low_bandwidth_scaling_factor(), 0.5);

        let config = MediaConfig::default().low_bandwidth_scaling_factor(2.0);
        assert_eq!(config.video_bitrate_low_bandwidth_scaling_factor(), 0.75);
    }

    #[test]
    fn test_presets() {
        let config = MediaConfig::with_preset(FrameSizePreset::Size640x480);
        assert_eq!(config.frame_size(), (640, 480));
        assert_eq!(config.video_bitrate, 1_500_000);
        assert_eq!(config.to_preset(), Some(FrameSizePreset::Size640x480));

        // Portrait frame of a known size still maps to the preset
        let portrait = MediaConfig::default().frame_size_of(720, 1280);
        assert_eq!(portrait.to_preset(), Some(FrameSizePreset::Size1280x720));
        assert!(portrait.is_portrait());

        let odd = MediaConfig::default().frame_size_of(1000, 600);
        assert_eq!(odd.to_preset(), None);
        assert_eq!(odd.to_closest_preset(), FrameSizePreset::Size1280x720);

        let portrait = MediaConfig::default().frame_size_of(1080, 1920);
        assert_eq!(portrait.to_closest_preset(), FrameSizePreset::Size1920x1080);
    }

    #[test]
    fn test_closest_by_width() {
        assert_eq!(FrameSizePreset::closest_by_width(0), FrameSizePreset::Size352x288);
        assert_eq!(FrameSizePreset::closest_by_width(700), FrameSizePreset::Size640x480);
        assert_eq!(FrameSizePreset::closest_by_width(1900), FrameSizePreset::Size1920x1080);
        assert_eq!(FrameSizePreset::closest_by_width(10_000), FrameSizePreset::Size3840x2160);
    }

    #[test]
    fn test_builder_chaining() {
        let config = MediaConfig::default()
            .frame_size_of(1920, 1080)
            .frame_rate(60)
            .key_frame_interval(120)
            .bitrate(6_000_000)
            .frame_buffer_size_multiplier(2)
            .low_bandwidth_skip_count(3)
            .audio(AudioChannels::MONO, 48_000, 128_000)
            .disable_audio();

        assert_eq!(config.frame_size_label(), "1920x1080");
        assert!(config.is_landscape());
        assert_eq!(config.video_frame_rate, 60);
        assert_eq!(config.video_key_frame_interval, 120);
        assert_eq!(config.video_bitrate, 6_000_000);
        assert_eq!(config.video_frame_buffer_size_multiplier, 2);
        assert_eq!(config.video_frame_rate_low_bandwidth_skip_count, 3);
        assert_eq!(config.audio_channels, 1);
        assert_eq!(config.audio_sample_rate, 48_000);
        assert!(!config.audio_enabled);
    }

    #[test]
    fn test_structural_equality() {
        let a = MediaConfig::default().bitrate(1_000_000);
        let b = a.clone();
        assert_eq!(a, b);
        assert_ne!(a, MediaConfig::default());
    }
}
