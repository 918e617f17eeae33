//! Server connection configuration

use super::media::{FrameSizePreset, MediaConfig};
use crate::data::DataMap;
use crate::error::ConfigError;

/// Default RTMP port
pub const DEFAULT_PORT: u16 = 1935;

/// Media settings plus the server a broadcast is sent to
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Capture and encoding settings
    pub media: MediaConfig,

    /// Server host name or IP address
    pub host_address: String,

    /// Server port
    pub port: u16,

    /// Server application name
    pub application_name: String,

    /// Stream name published under the application
    pub stream_name: String,

    /// Optional credentials for source authentication
    pub username: Option<String>,
    pub password: Option<String>,

    /// Extra parameters sent with the connect request
    pub connection_parameters: Option<DataMap>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            media: MediaConfig::default(),
            host_address: String::new(),
            port: DEFAULT_PORT,
            application_name: String::new(),
            stream_name: String::new(),
            username: None,
            password: None,
            connection_parameters: None,
        }
    }
}

impl StreamConfig {
    /// Create a config targeting `host/application/stream` with default media settings
    pub fn new(
        host_address: impl Into<String>,
        application_name: impl Into<String>,
        stream_name: impl Into<String>,
    ) -> Self {
        Self {
            host_address: host_address.into(),
            application_name: application_name.into(),
            stream_name: stream_name.into(),
            ..Default::default()
        }
    }

    /// Create an empty config with a preset's frame size and bitrate
    pub fn with_preset(preset: FrameSizePreset) -> Self {
        Self {
            media: MediaConfig::with_preset(preset),
            ..Default::default()
        }
    }

    /// Set port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set media settings
    pub fn media(mut self, media: MediaConfig) -> Self {
        self.media = media;
        self
    }

    /// Set credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set connection parameters
    pub fn connection_parameters(mut self, params: DataMap) -> Self {
        self.connection_parameters = Some(params);
        self
    }

    /// Check the config is usable for a broadcast
    ///
    /// Returns the first violated rule: host, application name, stream name, port.
    pub fn validate_for_broadcast(&self) -> Result<(), ConfigError> {
        if self.host_address.trim().is_empty() {
            return Err(ConfigError::HostRequired);
        }
        if self.application_name.trim().is_empty() {
            return Err(ConfigError::ApplicationNameRequired);
        }
        if self.stream_name.trim().is_empty() {
            return Err(ConfigError::StreamNameRequired);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        Ok(())
    }

    /// Connection URL, e.g. `rtmp://host:1935/app`
    pub fn connect_url(&self) -> String {
        format!(
            "rtmp://{}:{}/{}",
            self.host_address, self.port, self.application_name
        )
    }

    /// Command object for the connect request
    ///
    /// Carries `app` and `tcUrl`; connection parameters are added on top and
    /// win on a key clash.
    pub fn connect_properties(&self) -> DataMap {
        let mut properties = DataMap::new();
        properties.set_string("app", Some(self.application_name.as_str()));
        properties.set_string("tcUrl", Some(self.connect_url().as_str()));
        if let Some(params) = &self.connection_parameters {
            for (key, value) in params {
                properties.set(key.clone(), value.clone());
            }
        }
        properties
    }

    /// Full stream key, `app/stream`
    pub fn stream_key(&self) -> String {
        format!("{}/{}", self.application_name, self.stream_name)
    }
}
