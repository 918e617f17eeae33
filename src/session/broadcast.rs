//! Broadcast session
//!
//! Lifecycle:
//! ```text
//! Idle -> Starting -> Running -> Stopping -> Idle
//!            |
//!            +--> Idle   (prepare/start failure, after rollback)
//! ```
//!
//! Transitions are serialized by a reentrant mutex: a start arriving while
//! another transition is in flight fails fast with `AlreadyActive`, an end
//! waits for it. Status callbacks are delivered after the transition lock is
//! released, so a callback may call `end_broadcast` (or `start_broadcast`)
//! directly.

use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{ReentrantMutex, RwLock};

use super::metadata::{StreamMetadata, METADATA_EVENT};
use crate::component::{BroadcastComponent, ComponentRole};
use crate::config::StreamConfig;
use crate::data::{
    DataCallback, DataEventRouter, DataMap, DataResponse, DataScope, DataSink, DataTransport,
};
use crate::error::{Error, Result};
use crate::media::MediaSink;
use crate::status::{BroadcastState, Status, StatusCallback, StatusCell, RESPONSE_TIME_KEY};

/// State shared with component observers and ping callbacks
struct SessionShared {
    status: StatusCell,
    callback: RwLock<Option<Arc<dyn StatusCallback>>>,
    metadata: RwLock<Option<StreamMetadata>>,
}

impl SessionShared {
    fn callback(&self) -> Option<Arc<dyn StatusCallback>> {
        self.callback.read().clone()
    }

    fn notify(&self, status: &Status) {
        if let Some(callback) = self.callback() {
            callback.notify(status);
        }
    }

    /// Merge a component's runtime event or error into the session status
    fn publish(&self, status: &Status) {
        let merged = self.status.update(|s| {
            s.event = status.event;
            s.data = status.data.clone();
            if let Some(error) = &status.error {
                s.error = Some(error.clone());
            }
        });
        self.notify(&merged);
    }
}

/// Relays component events to the session without keeping it alive
struct ComponentRelay {
    shared: Weak<SessionShared>,
}

impl StatusCallback for ComponentRelay {
    fn on_status(&self, status: &Status) {
        if let Some(shared) = self.shared.upgrade() {
            shared.publish(status);
        }
    }
}

/// Statuses to deliver once the transition lock is released
struct Outcome {
    status: Status,
    notifications: Vec<Status>,
}

/// A live broadcast
///
/// Owns up to three components (audio device, audio encoder, video encoder),
/// the session status and the data event channel. Missing components are
/// skipped.
pub struct BroadcastSession {
    shared: Arc<SessionShared>,
    transition: ReentrantMutex<()>,
    components: RwLock<[Option<Arc<dyn BroadcastComponent>>; 3]>,
    router: Arc<DataEventRouter>,
}

impl BroadcastSession {
    /// Create an idle session with no components
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SessionShared {
                status: StatusCell::new(),
                callback: RwLock::new(None),
                metadata: RwLock::new(None),
            }),
            transition: ReentrantMutex::new(()),
            components: RwLock::new([None, None, None]),
            router: Arc::new(DataEventRouter::new()),
        }
    }

    /// Add a component in the slot for its role
    pub fn with_component(self, component: Arc<dyn BroadcastComponent>) -> Self {
        let slot = Self::slot(component.role());
        self.components.write()[slot] = Some(component);
        self
    }

    /// Add a data transport
    pub fn with_transport(self, transport: Arc<dyn DataTransport>) -> Self {
        self.router.set_transport(Some(transport));
        self
    }

    fn slot(role: ComponentRole) -> usize {
        match role {
            ComponentRole::AudioDevice => 0,
            ComponentRole::AudioEncoder => 1,
            ComponentRole::VideoEncoder => 2,
        }
    }

    /// Install or replace the component for its role
    ///
    /// Fails with `AlreadyActive` unless the session is idle.
    pub fn set_component(&self, component: Arc<dyn BroadcastComponent>) -> Result<()> {
        let _guard = self.transition.try_lock().ok_or(Error::AlreadyActive)?;
        if !self.shared.status.snapshot().is_idle() {
            return Err(Error::AlreadyActive);
        }
        let slot = Self::slot(component.role());
        self.components.write()[slot] = Some(component);
        Ok(())
    }

    /// Remove the component for a role
    pub fn remove_component(&self, role: ComponentRole) -> Result<Option<Arc<dyn BroadcastComponent>>> {
        let _guard = self.transition.try_lock().ok_or(Error::AlreadyActive)?;
        if !self.shared.status.snapshot().is_idle() {
            return Err(Error::AlreadyActive);
        }
        Ok(self.components.write()[Self::slot(role)].take())
    }

    /// Component installed for a role
    pub fn component(&self, role: ComponentRole) -> Option<Arc<dyn BroadcastComponent>> {
        self.components.read()[Self::slot(role)].clone()
    }

    /// Installed components in prepare/start order
    fn components_in_order(&self) -> Vec<Arc<dyn BroadcastComponent>> {
        self.components.read().iter().flatten().cloned().collect()
    }

    /// Attach (or detach) the data transport
    pub fn set_transport(&self, transport: Option<Arc<dyn DataTransport>>) {
        self.router.set_transport(transport);
    }

    /// The data event router
    pub fn router(&self) -> &Arc<DataEventRouter> {
        &self.router
    }

    /// Start broadcasting
    ///
    /// Validates `config`, then prepares and starts every component in order.
    /// On the first failure the already-prepared components are stopped in
    /// reverse order and the session returns to idle with the error. The
    /// callback receives `Starting` followed by `Running` or the failure; it
    /// does not hear about rejected (already active) or invalid requests,
    /// which are only reported through the return value.
    pub fn start_broadcast(
        &self,
        config: &StreamConfig,
        callback: Option<Arc<dyn StatusCallback>>,
    ) -> Status {
        let outcome = {
            let Some(_guard) = self.transition.try_lock() else {
                tracing::warn!("Start rejected, another transition is in progress");
                return Status::with_error(self.shared.status.state(), Error::AlreadyActive);
            };

            let current = self.shared.status.state();
            if current != BroadcastState::Idle {
                tracing::warn!(state = %current, "Start rejected, broadcast already active");
                return Status::with_error(current, Error::AlreadyActive);
            }

            if let Err(e) = config.validate_for_broadcast() {
                tracing::warn!(error = %e, "Invalid stream configuration");
                return Status::with_error(BroadcastState::Idle, e.into());
            }

            *self.shared.callback.write() = callback;
            self.start_locked(config)
        };

        for status in &outcome.notifications {
            self.shared.notify(status);
        }
        outcome.status
    }

    fn start_locked(&self, config: &StreamConfig) -> Outcome {
        let stream = config.stream_key();
        let mut notifications = vec![self.shared.status.reset_with_state(BroadcastState::Starting)];
        tracing::info!(stream = %stream, url = %config.connect_url(), "Starting broadcast");

        let components = self.components_in_order();
        let relay: Arc<dyn StatusCallback> = Arc::new(ComponentRelay {
            shared: Arc::downgrade(&self.shared),
        });
        for component in &components {
            component.set_status_observer(Some(Arc::clone(&relay)));
        }

        if let Err(error) = self.router.connect(config) {
            return self.abort_start(&components, &[], error, notifications);
        }

        for (index, component) in components.iter().enumerate() {
            let status = component.prepare_for_broadcast(config);
            if let Some(source) = status.error {
                let error = Error::ComponentPrepareFailed {
                    role: component.role(),
                    source: Box::new(source),
                };
                return self.abort_start(&components, &components[..index], error, notifications);
            }
        }

        for component in &components {
            let status = component.start_broadcasting();
            if let Some(source) = status.error {
                let error = Error::ComponentStartFailed {
                    role: component.role(),
                    source: Box::new(source),
                };
                return self.abort_start(&components, &components, error, notifications);
            }
        }

        let metadata = StreamMetadata::from_config(config);
        let metadata_map = metadata.to_data_map();
        *self.shared.metadata.write() = Some(metadata);

        let status = self.shared.status.reset_with_state(BroadcastState::Running);
        notifications.push(status.clone());
        tracing::info!(stream = %stream, components = components.len(), "Broadcast running");

        if self.router.has_transport() {
            if let Err(e) =
                self.router
                    .send_data_event(DataScope::Stream, METADATA_EVENT, Some(metadata_map), None)
            {
                tracing::warn!(stream = %stream, error = %e, "Failed to send stream metadata");
            }
        }

        Outcome {
            status,
            notifications,
        }
    }

    /// Stop `prepared` in reverse order and return to idle with `error`
    fn abort_start(
        &self,
        all: &[Arc<dyn BroadcastComponent>],
        prepared: &[Arc<dyn BroadcastComponent>],
        error: Error,
        mut notifications: Vec<Status>,
    ) -> Outcome {
        tracing::warn!(error = %error, prepared = prepared.len(), "Broadcast start failed, rolling back");

        if error.is_unrecoverable() {
            tracing::error!(error = %error, "Unrecoverable component failure, skipping rollback");
        } else {
            for component in prepared.iter().rev() {
                let status = component.stop_broadcasting();
                if let Some(e) = status.error {
                    tracing::warn!(component = %component.role(), error = %e, "Rollback stop failed");
                    if e.is_unrecoverable() {
                        tracing::error!(component = %component.role(), "Unrecoverable failure, aborting rollback");
                        break;
                    }
                }
            }
        }

        for component in all {
            component.set_status_observer(None);
        }

        let status = Status::with_error(BroadcastState::Idle, error);
        self.shared.status.replace(status.clone());
        notifications.push(status.clone());
        Outcome {
            status,
            notifications,
        }
    }

    /// Stop broadcasting
    ///
    /// Idle sessions return success without touching any component. Otherwise
    /// every component is stopped in reverse order, errors are collected without
    /// short-circuiting, and the first one is reported. Waits for an in-flight
    /// start to finish. If `callback` is given it replaces the session callback
    /// and receives `Stopping` and the final status.
    pub fn end_broadcast(&self, callback: Option<Arc<dyn StatusCallback>>) -> Status {
        let outcome = {
            let _guard = self.transition.lock();

            match self.shared.status.state() {
                BroadcastState::Idle => {
                    let status = Status::new(BroadcastState::Idle);
                    if let Some(callback) = callback {
                        callback.notify(&status);
                    }
                    return status;
                }
                // Only reachable from a callback running inside this thread's transition
                BroadcastState::Starting | BroadcastState::Stopping => {
                    return self.shared.status.snapshot();
                }
                _ => {}
            }

            if let Some(callback) = callback {
                *self.shared.callback.write() = Some(callback);
            }
            self.end_locked()
        };

        for status in &outcome.notifications {
            self.shared.notify(status);
        }
        outcome.status
    }

    fn end_locked(&self) -> Outcome {
        let mut notifications = vec![self.shared.status.reset_with_state(BroadcastState::Stopping)];
        tracing::info!("Stopping broadcast");

        let components = self.components_in_order();
        for component in &components {
            component.set_status_observer(None);
        }

        let mut first_error = None;
        for component in components.iter().rev() {
            let status = component.stop_broadcasting();
            if let Some(source) = status.error {
                tracing::warn!(component = %component.role(), error = %source, "Component stop failed");
                first_error.get_or_insert(Error::ComponentStopFailed {
                    role: component.role(),
                    source: Box::new(source),
                });
            }
        }

        let abandoned = self.router.fail_pending();
        if abandoned > 0 {
            tracing::debug!(abandoned, "Abandoned pending module requests");
        }
        *self.shared.metadata.write() = None;

        let status = Status {
            error: first_error,
            ..Status::new(BroadcastState::Idle)
        };
        self.shared.status.replace(status.clone());
        notifications.push(status.clone());
        tracing::info!(error = ?status.error, "Broadcast stopped");

        Outcome {
            status,
            notifications,
        }
    }

    /// Current session status
    pub fn status(&self) -> Status {
        self.shared.status.snapshot()
    }

    /// Whether the session is running
    pub fn is_streaming(&self) -> bool {
        self.shared.status.state() == BroadcastState::Running
    }

    /// Metadata of the running broadcast, as sent to the server
    pub fn metadata(&self) -> Option<DataMap> {
        self.shared.metadata.read().as_ref().map(StreamMetadata::to_data_map)
    }

    /// Surface a transport failure without stopping the broadcast
    pub fn on_transport_error(&self, message: impl Into<String>) -> Status {
        let message = message.into();
        tracing::warn!(error = %message, "Transport error");
        let status = self
            .shared
            .status
            .update(|s| s.error = Some(Error::Transport(message)));
        self.shared.notify(&status);
        status
    }

    /// Send a named data event (see [`DataEventRouter::send_data_event`])
    pub fn send_data_event(
        &self,
        scope: DataScope,
        name: &str,
        params: Option<DataMap>,
        callback: Option<DataCallback>,
    ) -> Result<()> {
        self.router.send_data_event(scope, name, params, callback)
    }

    /// Send a module request and wait for the response
    pub async fn call_module(&self, name: &str, params: Option<DataMap>) -> Result<DataResponse> {
        self.router.call_module(name, params).await
    }

    /// Measure the server round trip
    ///
    /// `callback` receives a status whose data holds the round-trip time in
    /// milliseconds under `responseTime`, or an error status if the ping was
    /// rejected or abandoned.
    pub fn send_ping_request(&self, callback: Arc<dyn StatusCallback>) -> Result<()> {
        let shared = Arc::downgrade(&self.shared);
        self.router.send_ping(move |result: Result<Duration>| {
            let state = shared
                .upgrade()
                .map_or(BroadcastState::Idle, |s| s.status.state());
            let status = match result {
                Ok(rtt) => {
                    let mut data = DataMap::new();
                    data.set_integer(RESPONSE_TIME_KEY, rtt.as_millis() as i64);
                    Status::new(state).data(data)
                }
                Err(e) => Status::with_error(state, e),
            };
            callback.notify(&status);
        })
    }

    /// Feed an inbound AMF0 data message from the transport
    pub fn handle_inbound_data(&self, payload: Bytes) -> Result<()> {
        self.router.handle_inbound(payload)
    }

    /// Receive inbound events with this exact name
    pub fn register_data_sink(&self, sink: Arc<dyn DataSink>, name: &str) -> bool {
        self.router.register_sink(sink, name)
    }

    pub fn unregister_data_sink(&self, sink: &Arc<dyn DataSink>, name: &str) -> bool {
        self.router.unregister_sink(sink, name)
    }

    /// Register a media sink with the first component that emits its kind
    pub fn register_sink(&self, sink: MediaSink) -> bool {
        self.components_in_order()
            .iter()
            .any(|c| c.register_sink(sink.clone()))
    }

    /// Unregister a media sink from every component holding it
    pub fn unregister_sink(&self, sink: &MediaSink) -> bool {
        self.components_in_order()
            .iter()
            .fold(false, |removed, c| c.unregister_sink(sink) || removed)
    }
}

impl Default for BroadcastSession {
    fn default() -> Self {
        Self::new()
    }
}
