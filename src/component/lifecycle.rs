//! Per-component state machine
//!
//! ```text
//! Idle --prepare--> Ready --start--> Running --stop--> Stopping --> Idle
//!   ^                 |
//!   +------stop-------+
//! ```
//! A failed prepare, start or stop lands in `Idle` with the error attached.

use std::sync::Arc;

use parking_lot::RwLock;

use super::ComponentRole;
use crate::error::{Error, Result};
use crate::status::{BroadcastState, Status, StatusCallback, StatusCell};

/// Status and observer shared by every component implementation
pub struct Lifecycle {
    role: ComponentRole,
    status: StatusCell,
    observer: RwLock<Option<Arc<dyn StatusCallback>>>,
}

impl Lifecycle {
    pub fn new(role: ComponentRole) -> Self {
        Self {
            role,
            status: StatusCell::new(),
            observer: RwLock::new(None),
        }
    }

    pub fn role(&self) -> ComponentRole {
        self.role
    }

    pub fn status(&self) -> Status {
        self.status.snapshot()
    }

    pub fn state(&self) -> BroadcastState {
        self.status.state()
    }

    pub fn is_running(&self) -> bool {
        self.status.state() == BroadcastState::Running
    }

    /// Run `configure` and move to `Ready`
    ///
    /// Allowed from `Idle` or `Ready`; anything else, including a prepare
    /// already in flight, reports `AlreadyActive` without running `configure`.
    pub fn prepare<F>(&self, configure: F) -> Status
    where
        F: FnOnce() -> Result<()>,
    {
        let claimed = self.status.transition_if(
            |state| state == BroadcastState::Idle || state == BroadcastState::Ready,
            BroadcastState::Starting,
        );
        if let Err(current) = claimed {
            return Status::with_error(current.state, Error::AlreadyActive);
        }

        match configure() {
            Ok(()) => {
                tracing::debug!(component = %self.role, "Prepared for broadcast");
                self.status.reset_with_state(BroadcastState::Ready)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Run `start` and move to `Running`
    ///
    /// Already running is a no-op success. A transition in flight reports
    /// `AlreadyActive`; not prepared reports `NotPrepared`.
    pub fn start<F>(&self, start: F) -> Status
    where
        F: FnOnce() -> Result<()>,
    {
        let claimed = self
            .status
            .transition(BroadcastState::Ready, BroadcastState::Starting);
        if let Err(current) = claimed {
            return match current.state {
                BroadcastState::Running => current,
                BroadcastState::Starting | BroadcastState::Stopping => {
                    Status::with_error(current.state, Error::AlreadyActive)
                }
                state => Status::with_error(state, Error::NotPrepared),
            };
        }

        match start() {
            Ok(()) => {
                tracing::debug!(component = %self.role, "Started broadcasting");
                self.status.reset_with_state(BroadcastState::Running)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Run `stop` and move to `Idle`
    ///
    /// Only the caller that claims the move to `Stopping` runs `stop`. Already
    /// idle returns success; a stop or prepare in flight returns the current
    /// status. Neither runs `stop` again.
    pub fn stop<F>(&self, stop: F) -> Status
    where
        F: FnOnce() -> Result<()>,
    {
        let claimed = self.status.transition_if(
            |state| {
                !matches!(
                    state,
                    BroadcastState::Idle | BroadcastState::Starting | BroadcastState::Stopping
                )
            },
            BroadcastState::Stopping,
        );
        match claimed {
            Ok(_) => {}
            Err(current) if current.is_idle() => return Status::new(BroadcastState::Idle),
            Err(current) => return current,
        }

        match stop() {
            Ok(()) => {
                tracing::debug!(component = %self.role, "Stopped broadcasting");
                self.status.reset()
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&self, error: Error) -> Status {
        tracing::warn!(component = %self.role, error = %error, "Component operation failed");
        self.status
            .replace(Status::with_error(BroadcastState::Idle, error.clone()));
        Status::with_error(BroadcastState::Idle, error)
    }

    /// Record a runtime event or error in the status and notify the observer
    ///
    /// The state is kept; only event, data and error change.
    pub fn publish(&self, status: Status) {
        let published = self.status.update(|s| {
            s.event = status.event;
            s.data = status.data;
            if status.error.is_some() {
                s.error = status.error;
            }
        });
        self.notify(&published);
    }

    /// Notify the observer without touching the status
    pub fn notify(&self, status: &Status) {
        let observer = self.observer.read().clone();
        if let Some(observer) = observer {
            observer.notify(status);
        }
    }

    pub fn set_observer(&self, observer: Option<Arc<dyn StatusCallback>>) {
        *self.observer.write() = observer;
    }
}
