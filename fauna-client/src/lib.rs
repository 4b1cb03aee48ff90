//! # fauna-client
//!
//! Connection core for the Fauna HTTP API.
//!
//! This crate provides:
//! - An async [`Connection`] with header discipline, sessions, and the
//!   monotonic last-seen-txn register
//! - Unary (buffered string body) and streaming (lazy byte chunks) dispatch
//! - A ref-counted HTTP engine handle shared across sessions
//! - A named-timer metrics seam
//!
//! Request bodies are plain `serde_json::Value` trees; building them is the
//! job of a query layer on top of this crate.

pub mod connection;
pub mod error;
pub mod http;
pub mod metrics;
pub mod response;
pub mod stream;

pub use connection::{Connection, ConnectionBuilder, JvmDriver, RequestParams};
pub use error::ClientError;
pub use http::{HttpHandle, RefAwareHttpClient};
pub use metrics::{MetricsSink, NullMetrics, Timer, REQUEST_TIMER};
pub use response::HttpResponse;
pub use stream::StreamingResponse;
