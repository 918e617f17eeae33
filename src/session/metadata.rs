//! Stream metadata (`onMetaData`)

use crate::config::StreamConfig;
use crate::data::DataMap;

/// Data event name the metadata is sent under
pub const METADATA_EVENT: &str = "onMetaData";

/// Encoder name reported in metadata
pub const ENCODER_NAME: &str = concat!("livecast/", env!("CARGO_PKG_VERSION"));

/// Stream description sent to the server when a broadcast starts
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamMetadata {
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
    pub video_frame_rate: Option<f32>,
    pub video_bitrate_kbps: Option<u32>,
    pub audio_bitrate_kbps: Option<u32>,
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: Option<u32>,
    pub audio_is_stereo: Option<bool>,
    pub encoder: Option<String>,
}

impl StreamMetadata {
    /// Describe the broadcast a config will produce
    ///
    /// Disabled media types are left out; "implementation selects" zeros are
    /// reported as unknown.
    pub fn from_config(config: &StreamConfig) -> Self {
        let media = &config.media;
        let mut metadata = Self {
            encoder: Some(ENCODER_NAME.to_string()),
            ..Self::default()
        };

        if media.video_enabled {
            metadata.video_width = Some(media.video_width);
            metadata.video_height = Some(media.video_height);
            metadata.video_frame_rate = Some(media.video_frame_rate as f32);
            metadata.video_bitrate_kbps = Some(media.video_bitrate / 1000);
        }

        if media.audio_enabled {
            metadata.audio_channels = Some(media.audio_channels);
            metadata.audio_is_stereo = Some(media.audio_channels == 2);
            metadata.audio_sample_rate = Some(media.audio_sample_rate).filter(|r| *r > 0);
            metadata.audio_bitrate_kbps = Some(media.audio_bitrate / 1000).filter(|b| *b > 0);
        }

        metadata
    }

    /// Encode as a data map with standard property names
    pub fn to_data_map(&self) -> DataMap {
        let mut map = DataMap::new();
        if let Some(x) = self.video_width {
            map.set_double("width", x as f64);
        }
        if let Some(x) = self.video_height {
            map.set_double("height", x as f64);
        }
        if let Some(x) = self.video_frame_rate {
            map.set_double("framerate", x as f64);
        }
        if let Some(x) = self.video_bitrate_kbps {
            map.set_double("videodatarate", x as f64);
        }
        if let Some(x) = self.audio_bitrate_kbps {
            map.set_double("audiodatarate", x as f64);
        }
        if let Some(x) = self.audio_sample_rate {
            map.set_double("audiosamplerate", x as f64);
        }
        if let Some(x) = self.audio_channels {
            map.set_double("audiochannels", x as f64);
        }
        if let Some(x) = self.audio_is_stereo {
            map.set_bool("stereo", x);
        }
        map.set_string("encoder", self.encoder.as_deref());
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaConfig;
    use crate::data::StructuredValue;

    #[test]
    fn test_from_default_config() {
        let config = StreamConfig::new("localhost", "live", "test");
        let metadata = StreamMetadata::from_config(&config);

        assert_eq!(metadata.video_width, Some(1280));
        assert_eq!(metadata.video_height, Some(720));
        assert_eq!(metadata.video_frame_rate, Some(30.0));
        assert_eq!(metadata.video_bitrate_kbps, Some(3750));
        assert_eq!(metadata.audio_channels, Some(2));
        assert_eq!(metadata.audio_is_stereo, Some(true));
        // Hardware-selected values are unknown up front
        assert_eq!(metadata.audio_sample_rate, None);
        assert_eq!(metadata.audio_bitrate_kbps, None);
        assert_eq!(metadata.encoder.as_deref(), Some(ENCODER_NAME));
    }

    #[test]
    fn test_disabled_media_left_out() {
        let config = StreamConfig::new("localhost", "live", "test")
            .media(MediaConfig::default().disable_video());
        let metadata = StreamMetadata::from_config(&config);
        assert_eq!(metadata.video_width, None);
        assert!(!metadata.to_data_map().contains_key("width"));
        assert!(metadata.to_data_map().contains_key("audiochannels"));
    }

    #[test]
    fn test_data_map_properties() {
        let config = StreamConfig::new("localhost", "live", "test")
            .media(MediaConfig::default().audio(1, 48_000, 96_000));
        let map = StreamMetadata::from_config(&config).to_data_map();

        assert_eq!(map.get_number("width"), Some(1280.0));
        assert_eq!(map.get_number("framerate"), Some(30.0));
        assert_eq!(map.get_number("audiosamplerate"), Some(48_000.0));
        assert_eq!(map.get_number("audiodatarate"), Some(96.0));
        assert_eq!(map.get_number("audiochannels"), Some(1.0));
        assert_eq!(map.get("stereo"), Some(&StructuredValue::Boolean(false)));
        assert_eq!(map.get_string("encoder"), Some(ENCODER_NAME));
    }
}
