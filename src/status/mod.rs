//! Broadcast status
//!
//! Every component and the session expose a [`Status`]: the current lifecycle
//! state, the most recent one-shot event, an optional error and optional
//! auxiliary data. Statuses are published through a [`StatusCell`] so that
//! readers on any thread see a consistent tuple, and delivered to callers via
//! [`StatusCallback`].

pub mod callback;
pub mod cell;
pub mod state;

pub use callback::StatusCallback;
pub use cell::StatusCell;
pub use state::{
    BroadcastEvent, BroadcastState, Status, BACKLOG_KEY, NEW_BITRATE_KEY, PREVIOUS_BITRATE_KEY,
    RESPONSE_TIME_KEY,
};
