//! Status callbacks
//!
//! Callbacks may be invoked from any internal thread (capture, encode or
//! transport context). Implementations must not block: a slow callback invoked
//! from the frame-delivery path delays every frame behind it.

use super::state::Status;

/// Receiver of status updates and errors
pub trait StatusCallback: Send + Sync {
    /// Called for every status update without an error
    fn on_status(&self, status: &Status);

    /// Called for statuses carrying an error
    fn on_error(&self, status: &Status) {
        self.on_status(status);
    }

    /// Route a status to `on_status` or `on_error`
    fn notify(&self, status: &Status) {
        if status.has_error() {
            self.on_error(status);
        } else {
            self.on_status(status);
        }
    }
}

impl<F> StatusCallback for F
where
    F: Fn(&Status) + Send + Sync,
{
    fn on_status(&self, status: &Status) {
        self(status)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::Error;
    use crate::status::BroadcastState;

    struct Counting {
        statuses: AtomicUsize,
        errors: AtomicUsize,
    }

    impl StatusCallback for Counting {
        fn on_status(&self, _status: &Status) {
            self.statuses.fetch_add(1, Ordering::SeqCst);
        }

        fn on_error(&self, _status: &Status) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_notify_routes_errors() {
        let cb = Counting {
            statuses: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        };

        cb.notify(&Status::new(BroadcastState::Running));
        cb.notify(&Status::with_error(BroadcastState::Idle, Error::AlreadyActive));

        assert_eq!(cb.statuses.load(Ordering::SeqCst), 1);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closure_receives_errors_too() {
        let seen = AtomicUsize::new(0);
        let cb = |_: &Status| {
            seen.fetch_add(1, Ordering::SeqCst);
        };

        cb.notify(&Status::with_error(BroadcastState::Idle, Error::NotConnected));
        cb.notify(&Status::default());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
