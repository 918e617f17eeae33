//! Broadcast session orchestration
//!
//! [`BroadcastSession`] drives the broadcast lifecycle across the installed
//! components and owns the data event channel. [`StreamMetadata`] describes the
//! stream to the server once the session is running.

pub mod broadcast;
pub mod metadata;

pub use broadcast::BroadcastSession;
pub use metadata::{StreamMetadata, ENCODER_NAME, METADATA_EVENT};
