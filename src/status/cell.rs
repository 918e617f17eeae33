//! Thread-safe status holder

use parking_lot::RwLock;

use super::state::{BroadcastEvent, BroadcastState, Status};
use crate::data::DataMap;
use crate::error::Error;

/// Shared holder of a [`Status`]
///
/// Every read-modify-write happens under the write lock; readers take a shared
/// lock and clone, so they never observe a torn combination of fields.
#[derive(Debug, Default)]
pub struct StatusCell {
    inner: RwLock<Status>,
}

impl StatusCell {
    /// Create a cell in the idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Consistent copy of the current status
    pub fn snapshot(&self) -> Status {
        self.inner.read().clone()
    }

    /// Current state only
    pub fn state(&self) -> BroadcastState {
        self.inner.read().state
    }

    /// Replace the whole status, returning the previous one
    pub fn replace(&self, status: Status) -> Status {
        std::mem::replace(&mut *self.inner.write(), status)
    }

    /// Atomically modify the status and return a copy of the result
    pub fn update<F>(&self, f: F) -> Status
    where
        F: FnOnce(&mut Status),
    {
        let mut guard = self.inner.write();
        f(&mut guard);
        guard.clone()
    }

    /// Clear error, event and data and set the state to idle
    pub fn reset(&self) -> Status {
        self.reset_with_state(BroadcastState::Idle)
    }

    /// Clear error, event and data and set the given state
    pub fn reset_with_state(&self, state: BroadcastState) -> Status {
        self.update(|s| *s = Status::new(state))
    }

    /// Change the state, leaving the other fields untouched
    pub fn set_state(&self, state: BroadcastState) -> Status {
        self.update(|s| s.state = state)
    }

    /// Record a one-shot event with its auxiliary data
    pub fn set_event(&self, event: BroadcastEvent, data: Option<DataMap>) -> Status {
        self.update(|s| {
            s.event = event;
            s.data = data;
        })
    }

    /// Record an error, leaving the state untouched
    pub fn set_error(&self, error: Error) -> Status {
        self.update(|s| s.error = Some(error))
    }

    /// Move to `to` only if the current state is `from`
    ///
    /// Returns the resulting status on success, or the unchanged status on mismatch.
    pub fn transition(&self, from: BroadcastState, to: BroadcastState) -> Result<Status, Status> {
        self.transition_if(|state| state == from, to)
    }

    /// Move to `to` (clearing error, event and data) if `allowed` accepts the current state
    ///
    /// The check and the write happen under one lock, so of several racing
    /// callers exactly one claims the transition.
    pub fn transition_if<F>(&self, allowed: F, to: BroadcastState) -> Result<Status, Status>
    where
        F: FnOnce(BroadcastState) -> bool,
    {
        let mut guard = self.inner.write();
        if !allowed(guard.state) {
            return Err(guard.clone());
        }
        *guard = Status::new(to);
        Ok(guard.clone())
    }
}
