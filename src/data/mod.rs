//! Structured metadata and the data event channel
//!
//! This module provides:
//! - [`StructuredValue`] trees ([`DataMap`], [`DataList`]) used for every
//!   metadata and event payload
//! - AMF0 serialization of those trees
//! - [`DataEventRouter`], which sends named events at stream or module scope,
//!   tracks pending module requests, and dispatches inbound events to sinks

pub mod amf0;
pub mod event;
pub mod router;
pub mod value;

pub use event::{DataCallback, DataEvent, DataResponse, DataScope, DataSink, DataTransport};
pub use router::DataEventRouter;
pub use value::{DataList, DataMap, StructuredValue, ValueType};
