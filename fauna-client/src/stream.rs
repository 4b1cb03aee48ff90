//! Streaming responses.

use crate::error::ClientError;
use bytes::Bytes;
use futures::stream::BoxStream;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

/// Byte chunks produced lazily until the server closes the stream.
pub type ByteChunks = BoxStream<'static, Result<Bytes, ClientError>>;

/// An HTTP response whose body is a lazy sequence of byte chunks.
///
/// The connection core never touches the body; it only reads the response
/// headers (for the txn-time update) before handing the stream over.
pub struct StreamingResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: ByteChunks,
}

impl StreamingResponse {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: ByteChunks) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of the named header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Consumes the response, yielding the chunk stream.
    pub fn into_body(self) -> ByteChunks {
        self.body
    }
}
