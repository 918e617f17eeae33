//! Backlog sampling
//!
//! The transport drives a [`BacklogCounter`] (enqueue on send, acknowledge on
//! flush); a background task samples it on an interval and feeds the encoder.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Anything that can report the current frame backlog
pub trait BacklogSource: Send + Sync {
    fn backlog(&self) -> usize;
}

/// Anything that reacts to backlog samples (the adaptive video encoder)
pub trait BacklogObserver: Send + Sync {
    fn update_backlog(&self, backlog: usize);
}

/// Count of frames queued for transmission but not yet acknowledged
#[derive(Debug, Default)]
pub struct BacklogCounter {
    queued: AtomicUsize,
}

impl BacklogCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A frame was queued for transmission
    pub fn frame_enqueued(&self) -> usize {
        self.queued.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// `count` frames were flushed or acknowledged; never goes below zero
    pub fn frames_acknowledged(&self, count: usize) -> usize {
        let previous = self
            .queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |q| {
                Some(q.saturating_sub(count))
            })
            .unwrap_or_else(|q| q);
        previous.saturating_sub(count)
    }

    pub fn reset(&self) {
        self.queued.store(0, Ordering::Release);
    }
}

impl BacklogSource for BacklogCounter {
    fn backlog(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }
}

/// Sample `source` every `interval` and forward the backlog to `observer`
///
/// The task ends on its own once the observer is dropped; abort the returned
/// handle to stop it earlier.
pub fn spawn_backlog_monitor<S, O>(
    source: Arc<S>,
    observer: Weak<O>,
    interval: Duration,
) -> tokio::task::JoinHandle<()>
where
    S: BacklogSource + ?Sized + 'static,
    O: BacklogObserver + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(observer) = observer.upgrade() else {
                tracing::debug!("Backlog observer dropped, stopping monitor");
                break;
            };
            observer.update_backlog(source.backlog());
        }
    })
}
