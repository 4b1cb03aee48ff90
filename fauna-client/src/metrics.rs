//! Named-timer seam for request instrumentation.
//!
//! The connection times every request under [`REQUEST_TIMER`]. The registry
//! behind the seam is supplied by the caller; the default sink discards all
//! observations.

/// Timer name used for every request issued by a connection.
pub const REQUEST_TIMER: &str = "fauna-request";

/// A sink of named-timer observations. Implementations must be thread-safe.
pub trait MetricsSink: Send + Sync {
    /// Starts a named timer. The returned guard records one observation when
    /// stopped, or on drop if it was never stopped explicitly.
    fn start_timer(&self, name: &str) -> Timer;
}

/// A running timer. The observation fires at most once.
pub struct Timer {
    on_stop: Option<Box<dyn FnOnce() + Send>>,
}

impl Timer {
    pub fn new(on_stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_stop: Some(Box::new(on_stop)),
        }
    }

    /// A timer that records nothing.
    pub fn noop() -> Self {
        Self { on_stop: None }
    }

    /// Stops the timer, recording the observation.
    pub fn stop(mut self) {
        self.fire();
    }

    fn fire(&mut self) {
        if let Some(on_stop) = self.on_stop.take() {
            on_stop();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.fire();
    }
}

/// The default sink: discards every observation.
pub struct NullMetrics;

impl MetricsSink for NullMetrics {
    fn start_timer(&self, _name: &str) -> Timer {
        Timer::noop()
    }
}
