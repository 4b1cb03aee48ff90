//! Ref-counted ownership of the underlying HTTP engine.
//!
//! Several connections (sessions) share a single engine. The wrapper keeps an
//! explicit reference count so the engine is torn down exactly once, when the
//! last owner lets go.

use crate::error::ClientError;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

/// The count a fresh wrapper starts with; it stands for the primary owner.
const INITIAL_REF_COUNT: i64 = 1;

/// An HTTP engine with an explicit reference count.
pub struct RefAwareHttpClient {
    ref_count: AtomicI64,
    closed: AtomicBool,
    delegate: Client,
}

impl RefAwareHttpClient {
    pub fn new(delegate: Client) -> Self {
        Self {
            ref_count: AtomicI64::new(INITIAL_REF_COUNT),
            closed: AtomicBool::new(false),
            delegate,
        }
    }

    /// Acquires one more reference. Succeeds only if the post-increment count
    /// exceeds the initial one and the engine has not been closed.
    pub fn retain(&self) -> bool {
        self.ref_count.fetch_add(1, Ordering::SeqCst) + 1 > INITIAL_REF_COUNT && !self.is_closed()
    }

    /// Releases one reference. The engine is closed exactly once, when the
    /// count falls below its initial value; later calls are no-ops.
    pub fn close(&self) {
        if self.ref_count.fetch_sub(1, Ordering::SeqCst) - 1 < INITIAL_REF_COUNT {
            self.closed.swap(true, Ordering::SeqCst);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn delegate(&self) -> Result<&Client, ClientError> {
        if self.is_closed() {
            Err(ClientError::EngineClosed)
        } else {
            Ok(&self.delegate)
        }
    }
}

/// A scoped reference to a shared [`RefAwareHttpClient`].
///
/// Dropping the handle releases its reference on every exit path, normal or
/// panicking.
pub struct HttpHandle {
    inner: Arc<RefAwareHttpClient>,
}

impl HttpHandle {
    /// Wraps an engine, taking the primary reference.
    pub fn new(delegate: Client) -> Self {
        Self {
            inner: Arc::new(RefAwareHttpClient::new(delegate)),
        }
    }

    /// Acquires another handle to the same engine, or `None` if the engine
    /// has already been closed.
    pub fn try_clone(&self) -> Option<HttpHandle> {
        if self.inner.retain() {
            Some(HttpHandle {
                inner: self.inner.clone(),
            })
        } else {
            // Undo the failed acquisition.
            self.inner.close();
            None
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub(crate) fn client(&self) -> Result<&Client, ClientError> {
        self.inner.delegate()
    }
}

impl Drop for HttpHandle {
    fn drop(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retain_succeeds_while_open() {
        let client = RefAwareHttpClient::new(Client::new());
        assert!(client.retain());
        assert!(!client.is_closed());
    }

    #[test]
    fn test_close_once_count_collapses() {
        let client = RefAwareHttpClient::new(Client::new());
        assert!(client.retain()); // count 2
        client.close(); // count 1, still open
        assert!(!client.is_closed());
        client.close(); // count 0, closes
        assert!(client.is_closed());
        client.close(); // no-op
        assert!(client.is_closed());
    }

    #[test]
    fn test_retain_fails_after_close() {
        let client = RefAwareHttpClient::new(Client::new());
        client.close();
        assert!(client.is_closed());
        assert!(!client.retain());
    }

    #[test]
    fn test_handle_releases_on_drop() {
        let handle = HttpHandle::new(Client::new());
        let second = handle.try_clone().unwrap();
        assert!(!handle.is_closed());
        drop(second);
        assert!(!handle.is_closed());
        let inner = handle.inner.clone();
        drop(handle);
        assert!(inner.is_closed());
    }

    #[test]
    fn test_try_clone_fails_on_closed_engine() {
        let handle = HttpHandle::new(Client::new());
        handle.inner.close(); // collapse the primary reference out from under the handle
        assert!(handle.try_clone().is_none());
        assert!(handle.client().is_err());
        std::mem::forget(handle); // its Drop would decrement a count it no longer holds
    }
}
