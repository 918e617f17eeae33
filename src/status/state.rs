//! Status value types

use crate::data::DataMap;
use crate::error::Error;

/// Auxiliary data key holding the new bitrate of a bitrate event
pub const NEW_BITRATE_KEY: &str = "newBitrate";

/// Auxiliary data key holding the previous bitrate of a bitrate event
pub const PREVIOUS_BITRATE_KEY: &str = "previousBitrate";

/// Auxiliary data key holding a ping round-trip time in milliseconds
pub const RESPONSE_TIME_KEY: &str = "responseTime";

/// Auxiliary data key holding the frame backlog that triggered a low-bandwidth event
pub const BACKLOG_KEY: &str = "backlog";

/// Lifecycle state of a session or component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastState {
    /// Not broadcasting
    #[default]
    Idle,
    /// Starting up or initializing
    Starting,
    /// Broadcasting
    Running,
    /// Shutting down
    Stopping,
    /// Buffering
    Buffering,
    /// Initialized and ready to start
    Ready,
}

/// One-shot notification carried by a status; not itself a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BroadcastEvent {
    #[default]
    None,
    /// Network bandwidth could not keep up with the configured settings
    LowBandwidth,
    /// Bitrate reduced; data carries previous and new bitrate
    BitrateReduced,
    /// Bitrate restored toward the configured value; data carries previous and new bitrate
    BitrateIncreased,
    /// Frame delivery suspended until the backlog drains
    EncoderPaused,
    /// Frame delivery resumed after a pause
    EncoderResumed,
}

/// Snapshot of {state, event, error, data}
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Status {
    pub state: BroadcastState,
    pub event: BroadcastEvent,
    pub error: Option<Error>,
    pub data: Option<DataMap>,
}

impl Status {
    /// Status with the given state and nothing else
    pub fn new(state: BroadcastState) -> Self {
        Self {
            state,
            ..Default::default()
        }
    }

    /// Status with a state and an error
    pub fn with_error(state: BroadcastState, error: Error) -> Self {
        Self {
            state,
            error: Some(error),
            ..Default::default()
        }
    }

    /// Idle status carrying only an event
    pub fn with_event(event: BroadcastEvent) -> Self {
        Self {
            event,
            ..Default::default()
        }
    }

    /// Status with a state and an event
    pub fn with_state_and_event(state: BroadcastState, event: BroadcastEvent) -> Self {
        Self {
            state,
            event,
            ..Default::default()
        }
    }

    /// Attach auxiliary data
    pub fn data(mut self, data: DataMap) -> Self {
        self.data = Some(data);
        self
    }

    /// Convert to a `Result`, yielding the error if there is one
    pub fn into_result(self) -> Result<Status, Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == BroadcastState::Idle
    }

    pub fn is_starting(&self) -> bool {
        self.state == BroadcastState::Starting
    }

    pub fn is_ready(&self) -> bool {
        self.state == BroadcastState::Ready
    }

    pub fn is_running(&self) -> bool {
        self.state == BroadcastState::Running
    }

    pub fn is_stopping(&self) -> bool {
        self.state == BroadcastState::Stopping
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Previous bitrate from a bitrate event's data
    pub fn previous_bitrate(&self) -> Option<u32> {
        self.data_u32(PREVIOUS_BITRATE_KEY)
    }

    /// New bitrate from a bitrate event's data
    pub fn new_bitrate(&self) -> Option<u32> {
        self.data_u32(NEW_BITRATE_KEY)
    }

    /// Ping round-trip time in milliseconds
    pub fn response_time_ms(&self) -> Option<u64> {
        self.data
            .as_ref()?
            .get_integer(RESPONSE_TIME_KEY)
            .and_then(|ms| u64::try_from(ms).ok())
    }

    fn data_u32(&self, key: &str) -> Option<u32> {
        self.data
            .as_ref()?
            .get_integer(key)
            .and_then(|v| u32::try_from(v).ok())
    }
}

impl std::fmt::Display for BroadcastState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BroadcastState::Idle => "idle",
            BroadcastState::Starting => "starting",
            BroadcastState::Running => "running",
            BroadcastState::Stopping => "stopping",
            BroadcastState::Buffering => "buffering",
            BroadcastState::Ready => "ready",
        };
        f.write_str(name)
    }
}
