//! Error types
//!
//! A single crate-wide [`Error`] plus the narrower [`ConfigError`] (pre-flight
//! validation rules) and [`AmfError`] (structured value codec failures).
//!
//! Errors are `Clone` and `PartialEq` because they travel inside
//! [`Status`](crate::status::Status) values that are copied between threads.

use crate::component::ComponentRole;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Stream configuration failed validation (no side effects happened)
    ConfigurationInvalid(ConfigError),

    /// A component returned an error from `prepare_for_broadcast`
    ComponentPrepareFailed {
        role: ComponentRole,
        source: Box<Error>,
    },

    /// A component returned an error from `start_broadcasting`
    ComponentStartFailed {
        role: ComponentRole,
        source: Box<Error>,
    },

    /// A component returned an error from `stop_broadcasting`
    ComponentStopFailed {
        role: ComponentRole,
        source: Box<Error>,
    },

    /// A broadcast was requested while the session is not idle
    AlreadyActive,

    /// A component was started without being prepared first
    NotPrepared,

    /// Transport-level failure reported while streaming
    Transport(String),

    /// List append beyond the maximum element count
    ListCapacityExceeded { max: usize },

    /// No transport is attached to send data events through
    NotConnected,

    /// A module request was dropped before a response arrived
    RequestAbandoned,

    /// The server answered a module request with `_error`
    RequestRejected(Option<String>),

    /// Codec (encoder or capture source) failure
    Codec(String),

    /// Structured value encoding/decoding failure
    Amf(AmfError),

    /// Unrecoverable internal failure; aborts rollback
    Internal(String),
}

impl Error {
    /// Whether this error leaves a component in a state where further calls are unsafe
    pub fn is_unrecoverable(&self) -> bool {
        match self {
            Error::Internal(_) => true,
            Error::ComponentPrepareFailed { source, .. }
            | Error::ComponentStartFailed { source, .. }
            | Error::ComponentStopFailed { source, .. } => source.is_unrecoverable(),
            _ => false,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ConfigurationInvalid(e) => write!(f, "Invalid configuration: {}", e),
            Error::ComponentPrepareFailed { role, source } => {
                write!(f, "{} failed to prepare: {}", role, source)
            }
            Error::ComponentStartFailed { role, source } => {
                write!(f, "{} failed to start: {}", role, source)
            }
            Error::ComponentStopFailed { role, source } => {
                write!(f, "{} failed to stop: {}", role, source)
            }
            Error::AlreadyActive => write!(f, "Broadcast already active"),
            Error::NotPrepared => write!(f, "Component not prepared for broadcast"),
            Error::Transport(msg) => write!(f, "Transport error: {}", msg),
            Error::ListCapacityExceeded { max } => {
                write!(f, "List capacity exceeded (max {} elements)", max)
            }
            Error::NotConnected => write!(f, "Not connected"),
            Error::RequestAbandoned => write!(f, "Request abandoned before a response arrived"),
            Error::RequestRejected(Some(reason)) => write!(f, "Request rejected: {}", reason),
            Error::RequestRejected(None) => write!(f, "Request rejected by the server"),
            Error::Codec(msg) => write!(f, "Codec error: {}", msg),
            Error::Amf(e) => write!(f, "AMF error: {}", e),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ConfigurationInvalid(e) => Some(e),
            Error::ComponentPrepareFailed { source, .. }
            | Error::ComponentStartFailed { source, .. }
            | Error::ComponentStopFailed { source, .. } => Some(source.as_ref()),
            Error::Amf(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::ConfigurationInvalid(e)
    }
}

impl From<AmfError> for Error {
    fn from(e: AmfError) -> Self {
        match e {
            AmfError::ListTooLong { max, .. } => Error::ListCapacityExceeded { max },
            other => Error::Amf(other),
        }
    }
}

/// Stream configuration validation failures, in the order they are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Host address is empty
    HostRequired,
    /// Application name is empty
    ApplicationNameRequired,
    /// Stream name is empty
    StreamNameRequired,
    /// Port is outside 1..=65535
    InvalidPort(u16),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::HostRequired => write!(f, "host address is required"),
            ConfigError::ApplicationNameRequired => write!(f, "application name is required"),
            ConfigError::StreamNameRequired => write!(f, "stream name is required"),
            ConfigError::InvalidPort(port) => write!(f, "port {} is not valid", port),
        }
    }
}

impl std::error::Error for ConfigError {}

/// AMF encoding/decoding errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmfError {
    /// Buffer ended in the middle of a value
    UnexpectedEof,
    /// Object/array nesting deeper than the decoder allows
    NestingTooDeep,
    /// Object did not terminate with the end marker (strict mode)
    InvalidObjectEnd,
    /// Unknown type marker (strict mode)
    UnknownMarker(u8),
    /// Reference index points past the reference table
    InvalidReference(u16),
    /// String payload was not valid UTF-8
    InvalidUtf8,
    /// Strict array longer than a list may hold
    ListTooLong { len: usize, max: usize },
    /// A value of the wrong shape where a specific one was required
    UnexpectedValue(&'static str),
    /// Message expands to more values than the decoder allows
    TooManyValues { max: usize },
}

impl std::fmt::Display for AmfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmfError::UnexpectedEof => write!(f, "unexpected end of buffer"),
            AmfError::NestingTooDeep => write!(f, "nesting too deep"),
            AmfError::InvalidObjectEnd => write!(f, "invalid object end marker"),
            AmfError::UnknownMarker(m) => write!(f, "unknown type marker 0x{:02X}", m),
            AmfError::InvalidReference(idx) => write!(f, "invalid reference index {}", idx),
            AmfError::InvalidUtf8 => write!(f, "invalid UTF-8 string"),
            AmfError::ListTooLong { len, max } => {
                write!(f, "list of {} elements exceeds maximum of {}", len, max)
            }
            AmfError::UnexpectedValue(expected) => write!(f, "expected {}", expected),
            AmfError::TooManyValues { max } => {
                write!(f, "message decodes to more than {} values", max)
            }
        }
    }
}

impl std::error::Error for AmfError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::ConfigurationInvalid(ConfigError::HostRequired).to_string(),
            "Invalid configuration: host address is required"
        );
        assert_eq!(Error::AlreadyActive.to_string(), "Broadcast already active");

        let err = Error::ComponentPrepareFailed {
            role: ComponentRole::AudioEncoder,
            source: Box::new(Error::Codec("no hardware".into())),
        };
        assert_eq!(
            err.to_string(),
            "audio encoder failed to prepare: Codec error: no hardware"
        );
    }

    #[test]
    fn test_list_too_long_maps_to_capacity_error() {
        let err: Error = AmfError::ListTooLong { len: 2000, max: 1024 }.into();
        assert_eq!(err, Error::ListCapacityExceeded { max: 1024 });

        let err: Error = AmfError::InvalidUtf8.into();
        assert_eq!(err, Error::Amf(AmfError::InvalidUtf8));
    }

    #[test]
    fn test_unrecoverable_propagates_through_component_errors() {
        assert!(Error::Internal("poisoned".into()).is_unrecoverable());
        assert!(!Error::Transport("reset".into()).is_unrecoverable());

        let wrapped = Error::ComponentStopFailed {
            role: ComponentRole::VideoEncoder,
            source: Box::new(Error::Internal("gone".into())),
        };
        assert!(wrapped.is_unrecoverable());
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error as _;

        let err = Error::ConfigurationInvalid(ConfigError::StreamNameRequired);
        assert!(err.source().is_some());
        assert!(Error::NotConnected.source().is_none());
    }
}
