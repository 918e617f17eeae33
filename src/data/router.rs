//! Data event routing
//!
//! Outbound wire layout (AMF0 value sequences):
//! ```text
//! stream scope:  name, params
//! module scope:  name, transaction id, params   (id 0 = no response wanted)
//! ```
//! Inbound `_result` / `_error` messages carrying a known transaction id complete
//! the pending request; every other inbound message is a named event delivered
//! to the sinks registered for that exact name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;

use super::amf0;
use super::event::{DataCallback, DataEvent, DataResponse, DataScope, DataSink, DataTransport};
use super::value::{DataMap, StructuredValue};
use crate::config::StreamConfig;
use crate::error::{AmfError, Error, Result};

/// Event name used for round-trip measurement
pub const PING_EVENT: &str = "ping";

const RESULT_COMMAND: &str = "_result";
const ERROR_COMMAND: &str = "_error";

struct PendingRequest {
    name: String,
    sent_at: Instant,
    callback: DataCallback,
}

/// Sends data events and dispatches inbound ones
pub struct DataEventRouter {
    transport: RwLock<Option<Arc<dyn DataTransport>>>,
    sinks: RwLock<HashMap<String, Vec<Arc<dyn DataSink>>>>,
    pending: Mutex<HashMap<u64, PendingRequest>>,
    next_transaction: AtomicU64,
}

impl DataEventRouter {
    pub fn new() -> Self {
        Self {
            transport: RwLock::new(None),
            sinks: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            next_transaction: AtomicU64::new(1),
        }
    }

    /// Attach (or detach with `None`) the send primitive
    pub fn set_transport(&self, transport: Option<Arc<dyn DataTransport>>) {
        *self.transport.write() = transport;
    }

    /// Hand the connect request to the transport, if one is attached
    pub fn connect(&self, config: &StreamConfig) -> Result<()> {
        let transport = self.transport.read().clone();
        let Some(transport) = transport else {
            return Ok(());
        };
        transport.connect(config, &config.connect_properties())?;
        tracing::debug!(url = %config.connect_url(), "Transport connected");
        Ok(())
    }

    pub fn has_transport(&self) -> bool {
        self.transport.read().is_some()
    }

    /// Send a named event
    ///
    /// Stream-scoped events are fire-and-forget and ignore `callback`. For
    /// module-scoped events the callback is invoked once with the server's
    /// response, or with an error response if the broadcast ends first.
    pub fn send_data_event(
        &self,
        scope: DataScope,
        name: &str,
        params: Option<DataMap>,
        callback: Option<DataCallback>,
    ) -> Result<()> {
        let transport = self.transport.read().clone().ok_or(Error::NotConnected)?;
        let params = StructuredValue::Map(params.unwrap_or_default());

        let (payload, transaction_id) = match scope {
            DataScope::Stream => {
                if callback.is_some() {
                    tracing::debug!(event = name, "Callback ignored for stream-scoped event");
                }
                (amf0::encode_all(&[name.into(), params]), None)
            }
            DataScope::Module => {
                let id = match callback {
                    Some(callback) => {
                        let id = self.next_transaction.fetch_add(1, Ordering::Relaxed);
                        self.pending.lock().insert(
                            id,
                            PendingRequest {
                                name: name.to_string(),
                                sent_at: Instant::now(),
                                callback,
                            },
                        );
                        id
                    }
                    None => 0,
                };
                let payload =
                    amf0::encode_all(&[name.into(), StructuredValue::Double(id as f64), params]);
                (payload, Some(id).filter(|id| *id != 0))
            }
        };

        if let Err(e) = transport.send(scope, payload) {
            if let Some(id) = transaction_id {
                self.pending.lock().remove(&id);
            }
            tracing::warn!(event = name, scope = %scope, error = %e, "Data event send failed");
            return Err(e);
        }

        tracing::debug!(
            event = name,
            scope = %scope,
            transaction_id = ?transaction_id,
            "Data event sent"
        );
        Ok(())
    }

    /// Send a module request and wait for the response
    ///
    /// An `_error` reply resolves to a response with `is_error` set. Fails with
    /// [`Error::RequestAbandoned`] if the broadcast ends before the server answers.
    pub async fn call_module(&self, name: &str, params: Option<DataMap>) -> Result<DataResponse> {
        let (tx, rx) = oneshot::channel();
        self.send_data_event(
            DataScope::Module,
            name,
            params,
            Some(Box::new(move |response: DataResponse| {
                let _ = tx.send(response);
            })),
        )?;
        match rx.await {
            Ok(response) if !response.abandoned => Ok(response),
            _ => Err(Error::RequestAbandoned),
        }
    }

    /// Measure the round trip of an empty module request
    ///
    /// `callback` receives the elapsed time, [`Error::RequestRejected`] if the
    /// server answered with `_error`, or [`Error::RequestAbandoned`] if the
    /// broadcast ended first.
    pub fn send_ping<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(Result<Duration>) + Send + 'static,
    {
        let started = Instant::now();
        self.send_data_event(
            DataScope::Module,
            PING_EVENT,
            None,
            Some(Box::new(move |response: DataResponse| {
                let outcome = if response.abandoned {
                    Err(Error::RequestAbandoned)
                } else if response.is_error {
                    let reason = response
                        .result
                        .as_ref()
                        .and_then(|info| info.get_string("description"))
                        .map(str::to_owned);
                    Err(Error::RequestRejected(reason))
                } else {
                    Ok(started.elapsed())
                };
                callback(outcome);
            })),
        )
    }

    /// Handle an inbound AMF0 message from the transport
    pub fn handle_inbound(&self, payload: Bytes) -> Result<()> {
        let values = amf0::decode_all(payload)?;
        let mut values = values.into_iter();

        let name = match values.next() {
            Some(StructuredValue::String(name)) => name,
            _ => return Err(AmfError::UnexpectedValue("event name").into()),
        };

        if name == RESULT_COMMAND || name == ERROR_COMMAND {
            let transaction_id = values
                .next()
                .and_then(|v| v.as_number())
                .ok_or(Error::Amf(AmfError::UnexpectedValue("transaction id")))?;
            let result = values.find_map(|v| match v {
                StructuredValue::Map(map) => Some(map),
                _ => None,
            });
            self.complete_request(transaction_id as u64, result, name == ERROR_COMMAND);
            return Ok(());
        }

        let params = values
            .find_map(|v| match v {
                StructuredValue::Map(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();
        self.dispatch_event(&DataEvent::new(name, params));
        Ok(())
    }

    /// Complete a pending module request
    ///
    /// Returns `false` if no request with this id is pending.
    pub fn complete_request(
        &self,
        transaction_id: u64,
        result: Option<DataMap>,
        is_error: bool,
    ) -> bool {
        let pending = self.pending.lock().remove(&transaction_id);
        let Some(request) = pending else {
            tracing::debug!(transaction_id, "Response for unknown transaction");
            return false;
        };

        tracing::debug!(
            event = %request.name,
            transaction_id,
            elapsed_ms = request.sent_at.elapsed().as_millis() as u64,
            is_error,
            "Module response received"
        );
        let response = match is_error {
            true => DataResponse::error(result),
            false => DataResponse::ok(result),
        };
        (request.callback)(response);
        true
    }

    /// Deliver an event to every sink registered for its name
    ///
    /// Returns the number of sinks reached.
    pub fn dispatch_event(&self, event: &DataEvent) -> usize {
        let sinks = match self.sinks.read().get(&event.name) {
            Some(sinks) => sinks.clone(),
            None => return 0,
        };
        for sink in &sinks {
            sink.on_data_event(event);
        }
        sinks.len()
    }

    /// Register a sink for an event name; `false` if already registered for it
    pub fn register_sink(&self, sink: Arc<dyn DataSink>, name: &str) -> bool {
        let mut sinks = self.sinks.write();
        let list = sinks.entry(name.to_string()).or_default();
        if list.iter().any(|s| Arc::ptr_eq(s, &sink)) {
            return false;
        }
        list.push(sink);
        tracing::debug!(event = name, sinks = list.len(), "Data sink registered");
        true
    }

    /// Unregister a sink from an event name
    pub fn unregister_sink(&self, sink: &Arc<dyn DataSink>, name: &str) -> bool {
        let mut sinks = self.sinks.write();
        let Some(list) = sinks.get_mut(name) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| !Arc::ptr_eq(s, sink));
        let removed = list.len() != before;
        if list.is_empty() {
            sinks.remove(name);
        }
        removed
    }

    /// Number of sinks registered for an event name
    pub fn sink_count(&self, name: &str) -> usize {
        self.sinks.read().get(name).map_or(0, Vec::len)
    }

    /// Number of module requests awaiting a response
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Complete every pending module request with an abandoned response
    pub fn fail_pending(&self) -> usize {
        let drained: Vec<PendingRequest> = self.pending.lock().drain().map(|(_, r)| r).collect();
        let count = drained.len();
        for request in drained {
            tracing::debug!(event = %request.name, "Pending module request abandoned");
            (request.callback)(DataResponse::abandoned());
        }
        count
    }
}

impl Default for DataEventRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::test_support::MockTransport;

    fn router_with_transport() -> (DataEventRouter, Arc<MockTransport>) {
        let router = DataEventRouter::new();
        let transport = Arc::new(MockTransport::default());
        router.set_transport(Some(transport.clone()));
        (router, transport)
    }

    fn params(key: &str, value: &str) -> DataMap {
        let mut map = DataMap::new();
        map.set_string(key, Some(value));
        map
    }

    fn result_message(command: &str, id: u64, result: Option<DataMap>) -> Bytes {
        let mut values = vec![command.into(), StructuredValue::Double(id as f64), StructuredValue::Null];
        if let Some(result) = result {
            values.push(result.into());
        }
        amf0::encode_all(&values)
    }

    #[test]
    fn test_send_without_transport() {
        let router = DataEventRouter::new();
        assert_eq!(
            router.send_data_event(DataScope::Stream, "onTextData", None, None),
            Err(Error::NotConnected)
        );
        assert_eq!(router.pending_count(), 0);
    }

    #[test]
    fn test_stream_event_layout() {
        let (router, transport) = router_with_transport();
        router
            .send_data_event(DataScope::Stream, "onTextData", Some(params("text", "hi")), None)
            .unwrap();

        let (scope, values) = transport.last_decoded().unwrap();
        assert_eq!(scope, DataScope::Stream);
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].as_str(), Some("onTextData"));
        assert_eq!(values[1].as_map().and_then(|m| m.get_string("text")), Some("hi"));
    }

    #[test]
    fn test_stream_event_ignores_callback() {
        let (router, _transport) = router_with_transport();
        router
            .send_data_event(DataScope::Stream, "onCue", None, Some(Box::new(|_: DataResponse| {})))
            .unwrap();
        assert_eq!(router.pending_count(), 0);
    }

    #[test]
    fn test_module_request_response() {
        let (router, transport) = router_with_transport();
        let received = Arc::new(Mutex::new(None::<DataResponse>));

        let slot = Arc::clone(&received);
        router
            .send_data_event(
                DataScope::Module,
                "getStreamInfo",
                Some(params("stream", "cam1")),
                Some(Box::new(move |response: DataResponse| {
                    *slot.lock() = Some(response)
                })),
            )
            .unwrap();
        assert_eq!(router.pending_count(), 1);

        let (scope, values) = transport.last_decoded().unwrap();
        assert_eq!(scope, DataScope::Module);
        assert_eq!(values[0].as_str(), Some("getStreamInfo"));
        let id = values[1].as_number().unwrap() as u64;
        assert!(id > 0);

        router
            .handle_inbound(result_message(RESULT_COMMAND, id, Some(params("viewers", "3"))))
            .unwrap();

        let response = received.lock().take().unwrap();
        assert!(!response.is_error);
        assert_eq!(
            response.result.as_ref().and_then(|m| m.get_string("viewers")),
            Some("3")
        );
        assert_eq!(router.pending_count(), 0);
    }

    #[test]
    fn test_module_event_without_callback_uses_zero_id() {
        let (router, transport) = router_with_transport();
        router
            .send_data_event(DataScope::Module, "notify", None, None)
            .unwrap();
        let (_, values) = transport.last_decoded().unwrap();
        assert_eq!(values[1].as_number(), Some(0.0));
        assert_eq!(router.pending_count(), 0);
    }

    #[test]
    fn test_error_response_sets_flag() {
        let (router, _transport) = router_with_transport();
        let flagged = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&flagged);
        router
            .send_data_event(
                DataScope::Module,
                "restricted",
                None,
                Some(Box::new(move |r: DataResponse| *slot.lock() = Some(r.is_error))),
            )
            .unwrap();

        router
            .handle_inbound(result_message(ERROR_COMMAND, 1, None))
            .unwrap();
        assert_eq!(*flagged.lock(), Some(true));
    }

    #[test]
    fn test_send_failure_removes_pending() {
        let (router, transport) = router_with_transport();
        transport.fail_sends(true);

        let result = router.send_data_event(
            DataScope::Module,
            "getStreamInfo",
            None,
            Some(Box::new(|_: DataResponse| panic!("callback must not run"))),
        );
        assert!(matches!(result, Err(Error::Transport(_))));
        assert_eq!(router.pending_count(), 0);
        assert_eq!(transport.sent_count(), 0);
    }

    #[test]
    fn test_unknown_transaction_ignored() {
        let (router, _transport) = router_with_transport();
        assert!(!router.complete_request(99, None, false));
        router
            .handle_inbound(result_message(RESULT_COMMAND, 99, None))
            .unwrap();
    }

    #[test]
    fn test_inbound_event_dispatch_by_exact_name() {
        let router = DataEventRouter::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let sink: Arc<dyn DataSink> = Arc::new(move |event: &DataEvent| {
            assert_eq!(event.params.get_string("msg"), Some("hello"));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(router.register_sink(sink.clone(), "onChat"));
        assert!(!router.register_sink(sink.clone(), "onChat"));

        let message = amf0::encode_all(&["onChat".into(), params("msg", "hello").into()]);
        router.handle_inbound(message.clone()).unwrap();

        let other = amf0::encode_all(&["onChatter".into(), params("msg", "hello").into()]);
        router.handle_inbound(other).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(router.unregister_sink(&sink, "onChat"));
        assert!(!router.unregister_sink(&sink, "onChat"));
        assert_eq!(router.sink_count("onChat"), 0);
        router.handle_inbound(message.clone()).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_inbound_without_name_rejected() {
        let router = DataEventRouter::new();
        let message = amf0::encode_all(&[StructuredValue::Double(1.0)]);
        assert!(matches!(
            router.handle_inbound(message),
            Err(Error::Amf(AmfError::UnexpectedValue(_)))
        ));
    }

    #[test]
    fn test_fail_pending() {
        let (router, _transport) = router_with_transport();
        let errors = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let errors = Arc::clone(&errors);
            router
                .send_data_event(
                    DataScope::Module,
                    "slow",
                    None,
                    Some(Box::new(move |r: DataResponse| {
                        if r.is_error && r.abandoned {
                            errors.fetch_add(1, Ordering::SeqCst);
                        }
                    })),
                )
                .unwrap();
        }

        assert_eq!(router.fail_pending(), 3);
        assert_eq!(errors.load(Ordering::SeqCst), 3);
        assert_eq!(router.pending_count(), 0);
    }

    #[test]
    fn test_ping_reports_round_trip() {
        let (router, transport) = router_with_transport();
        let rtt = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&rtt);
        router
            .send_ping(move |result| *slot.lock() = Some(result))
            .unwrap();

        let (_, values) = transport.last_decoded().unwrap();
        assert_eq!(values[0].as_str(), Some(PING_EVENT));
        let id = values[1].as_number().unwrap() as u64;

        std::thread::sleep(Duration::from_millis(5));
        router.complete_request(id, None, false);

        let elapsed = rtt.lock().take().unwrap().unwrap();
        assert!(elapsed >= Duration::from_millis(5));
    }

    #[test]
    fn test_ping_rejected_by_server() {
        let (router, _transport) = router_with_transport();
        let outcome = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&outcome);
        router
            .send_ping(move |result| *slot.lock() = Some(result))
            .unwrap();

        router
            .handle_inbound(result_message(
                ERROR_COMMAND,
                1,
                Some(params("description", "ping not allowed")),
            ))
            .unwrap();

        assert_eq!(
            outcome.lock().take(),
            Some(Err(Error::RequestRejected(Some("ping not allowed".into()))))
        );
    }

    #[test]
    fn test_ping_abandoned_at_end() {
        let (router, _transport) = router_with_transport();
        let outcome = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&outcome);
        router
            .send_ping(move |result| *slot.lock() = Some(result))
            .unwrap();

        router.fail_pending();
        assert_eq!(outcome.lock().take(), Some(Err(Error::RequestAbandoned)));
    }

    #[tokio::test]
    async fn test_call_module_awaits_response() {
        let (router, transport) = router_with_transport();
        let router = Arc::new(router);

        let responder = {
            let router = Arc::clone(&router);
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                loop {
                    if let Some((_, values)) = transport.last_decoded() {
                        let id = values[1].as_number().unwrap() as u64;
                        router.complete_request(id, Some(params("ok", "yes")), false);
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let response = router.call_module("status", None).await.unwrap();
        assert_eq!(
            response.result.as_ref().and_then(|m| m.get_string("ok")),
            Some("yes")
        );
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_call_module_abandoned_at_end() {
        let (router, _transport) = router_with_transport();
        let router = Arc::new(router);

        let call = {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.call_module("slow", None).await })
        };
        while router.pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        router.fail_pending();

        assert_eq!(call.await.unwrap(), Err(Error::RequestAbandoned));
    }

    #[tokio::test]
    async fn test_call_module_resolves_server_error() {
        let (router, _transport) = router_with_transport();
        let router = Arc::new(router);

        let call = {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.call_module("restricted", None).await })
        };
        while router.pending_count() == 0 {
            tokio::task::yield_now().await;
        }
        router
            .handle_inbound(result_message(ERROR_COMMAND, 1, None))
            .unwrap();

        let response = call.await.unwrap().unwrap();
        assert!(response.is_error);
        assert!(!response.abandoned);
    }
}
