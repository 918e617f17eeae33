//! Data event types and collaborator traits

use bytes::Bytes;

use super::value::DataMap;
use crate::config::StreamConfig;
use crate::error::Result;

/// Target of an outbound data event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataScope {
    /// Sent to every viewer of the stream; no response
    Stream,
    /// Sent to a server-side module; may carry a response callback
    Module,
}

impl std::fmt::Display for DataScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataScope::Stream => write!(f, "stream"),
            DataScope::Module => write!(f, "module"),
        }
    }
}

/// A named event received from the server
#[derive(Debug, Clone, PartialEq)]
pub struct DataEvent {
    pub name: String,
    pub params: DataMap,
}

impl DataEvent {
    pub fn new(name: impl Into<String>, params: DataMap) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// Response to a module-scoped event
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataResponse {
    /// Result payload, if the server sent one
    pub result: Option<DataMap>,
    /// Set for server-reported errors and for requests abandoned at broadcast end
    pub is_error: bool,
    /// The broadcast ended before the server answered
    pub abandoned: bool,
}

impl DataResponse {
    pub fn ok(result: Option<DataMap>) -> Self {
        Self {
            result,
            is_error: false,
            abandoned: false,
        }
    }

    pub fn error(result: Option<DataMap>) -> Self {
        Self {
            result,
            is_error: true,
            abandoned: false,
        }
    }

    pub fn abandoned() -> Self {
        Self {
            result: None,
            is_error: true,
            abandoned: true,
        }
    }
}

/// One-shot completion for a module request
///
/// Invoked exactly once, from whichever thread delivers the response.
pub type DataCallback = Box<dyn FnOnce(DataResponse) + Send + 'static>;

/// Receiver of inbound named events
pub trait DataSink: Send + Sync {
    fn on_data_event(&self, event: &DataEvent);
}

impl<F> DataSink for F
where
    F: Fn(&DataEvent) + Send + Sync,
{
    fn on_data_event(&self, event: &DataEvent) {
        self(event)
    }
}

/// Send primitive supplied by the network layer
///
/// `payload` is an AMF0 value sequence; the transport chooses the message type
/// from `scope`.
pub trait DataTransport: Send + Sync {
    /// Open the server connection when a broadcast starts
    ///
    /// `properties` is the connect command object
    /// ([`StreamConfig::connect_properties`]); credentials are read from
    /// `config`. A failure aborts the start before any component is prepared.
    fn connect(&self, config: &StreamConfig, properties: &DataMap) -> Result<()> {
        let _ = (config, properties);
        Ok(())
    }

    fn send(&self, scope: DataScope, payload: Bytes) -> Result<()>;
}
