//! Controller settings derived from a media configuration

use std::time::Duration;

use crate::config::MediaConfig;

/// Buffer multiplier used when the configuration leaves it to the implementation
pub const DEFAULT_BUFFER_MULTIPLIER: u32 = 4;

/// Scaling factor used when the configuration leaves it to the implementation
pub const AUTO_SCALING_FACTOR: f32 = 0.5;

/// Backlog must stay below the threshold this long before each recovery step
pub const DEFAULT_RECOVERY_WINDOW: Duration = Duration::from_secs(2);

/// Recovery step as a fraction of the target bitrate
pub const RECOVERY_STEP_FRACTION: u32 = 10;

/// Pause ceiling as a multiple of the backlog threshold
pub const PAUSE_CEILING_FACTOR: usize = 2;

/// Resolved, clamped controller parameters
///
/// All clamping of out-of-range configuration happens here, at the point of
/// use, rather than when the configuration is edited.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    /// Configured bitrate; recovery never exceeds it
    pub target_bitrate: u32,

    /// Bitrate applied while throttled (`ceil(target x factor)`)
    pub reduced_bitrate: u32,

    /// Backlog at which throttling starts
    pub backlog_threshold: usize,

    /// Backlog at which frame delivery is suspended
    pub pause_threshold: usize,

    /// Deliver 1 of every `skip_count` frames while throttled (<= 1 = no skipping)
    pub skip_count: u32,

    /// How long the backlog must stay low before each recovery step
    pub recovery_window: Duration,

    /// Bitrate added per recovery step
    pub recovery_step: u32,
}

impl ControllerSettings {
    /// Resolve settings from a media configuration
    pub fn from_media_config(config: &MediaConfig) -> Self {
        let multiplier = match config.video_frame_buffer_size_multiplier {
            0 => DEFAULT_BUFFER_MULTIPLIER,
            m => m,
        };
        let backlog_threshold =
            (multiplier as usize).saturating_mul(config.video_frame_rate.max(1) as usize);

        let target_bitrate = config.video_bitrate;
        let factor = match config.video_bitrate_low_bandwidth_scaling_factor().clamp(0.0, 1.0) {
            f if f == 0.0 => AUTO_SCALING_FACTOR,
            f => f,
        };
        let reduced_bitrate = Self::scaled_bitrate(target_bitrate, factor);

        Self {
            target_bitrate,
            reduced_bitrate,
            backlog_threshold,
            pause_threshold: backlog_threshold.saturating_mul(PAUSE_CEILING_FACTOR),
            skip_count: Self::clamp_skip_count(
                config.video_frame_rate_low_bandwidth_skip_count,
                config.video_key_frame_interval,
            ),
            recovery_window: DEFAULT_RECOVERY_WINDOW,
            recovery_step: (target_bitrate / RECOVERY_STEP_FRACTION).max(1),
        }
    }

    /// Limit a skip count so every key frame interval delivers at least one frame
    pub fn clamp_skip_count(requested: u32, key_frame_interval: u32) -> u32 {
        requested.min(key_frame_interval.saturating_sub(1))
    }

    /// `ceil(bitrate x factor)`, never above `bitrate`
    pub fn scaled_bitrate(bitrate: u32, factor: f32) -> u32 {
        let scaled = (bitrate as f64 * factor as f64).ceil();
        (scaled as u32).min(bitrate)
    }

    /// Set the observation window
    pub fn recovery_window(mut self, window: Duration) -> Self {
        self.recovery_window = window;
        self
    }

    /// Set the per-step bitrate increase (at least 1)
    pub fn recovery_step(mut self, step: u32) -> Self {
        self.recovery_step = step.max(1);
        self
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_media_config(&MediaConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_media_config() {
        let settings = ControllerSettings::default();

        assert_eq!(settings.target_bitrate, 3_750_000);
        assert_eq!(settings.reduced_bitrate, 2_812_500);
        assert_eq!(settings.backlog_threshold, 120);
        assert_eq!(settings.pause_threshold, 240);
        assert_eq!(settings.skip_count, 2);
        assert_eq!(settings.recovery_window, Duration::from_secs(2));
        assert_eq!(settings.recovery_step, 375_000);
    }

    #[test]
    fn test_zero_multiplier_uses_default() {
        let config = MediaConfig::default()
            .frame_buffer_size_multiplier(0)
            .frame_rate(15);
        let settings = ControllerSettings::from_media_config(&config);
        assert_eq!(settings.backlog_threshold, 60);
    }

    #[test]
    fn test_zero_factor_selects_automatic_reduction() {
        let config = MediaConfig::default()
            .bitrate(1_000_000)
            .low_bandwidth_scaling_factor(0.0);
        let settings = ControllerSettings::from_media_config(&config);
        assert_eq!(settings.reduced_bitrate, 500_000);
    }

    #[test]
    fn test_factor_one_never_reduces() {
        let config = MediaConfig::default()
            .bitrate(1_000_000)
            .low_bandwidth_scaling_factor(1.0);
        let settings = ControllerSettings::from_media_config(&config);
        assert_eq!(settings.reduced_bitrate, 1_000_000);
    }

    #[test]
    fn test_skip_count_clamped_to_key_frame_interval() {
        for k in 0..40u32 {
            for requested in 0..60u32 {
                let config = MediaConfig::default()
                    .key_frame_interval(k)
                    .low_bandwidth_skip_count(requested);
                let settings = ControllerSettings::from_media_config(&config);
                assert!(settings.skip_count <= k.saturating_sub(1));
                assert!(settings.skip_count <= requested);
            }
        }
    }

    #[test]
    fn test_zero_frame_rate_still_has_threshold() {
        let config = MediaConfig::default().frame_rate(0);
        let settings = ControllerSettings::from_media_config(&config);
        assert_eq!(settings.backlog_threshold, 4);
    }

    #[test]
    fn test_builders() {
        let settings = ControllerSettings::default()
            .recovery_window(Duration::from_millis(100))
            .recovery_step(0);
        assert_eq!(settings.recovery_window, Duration::from_millis(100));
        assert_eq!(settings.recovery_step, 1);
    }
}
