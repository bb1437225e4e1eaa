//! Per-request latency observation.

use std::time::Duration;

use crate::application::resolver::PayloadSource;

/// One completed request as seen by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSample {
    /// Matched route template, e.g. `/article/{id}`, or `unmatched`.
    pub route: String,
    pub status: u16,
    /// Set for successful content responses only.
    pub source: Option<PayloadSource>,
    pub elapsed: Duration,
}

impl RequestSample {
    /// Label used for the `source` dimension of latency metrics.
    pub fn source_label(&self) -> &'static str {
        self.source.map_or("none", |source| source.as_str())
    }
}

/// Sink for request samples. Must not block the request path.
pub trait RequestObserver: Send + Sync {
    fn observe(&self, sample: &RequestSample);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RequestObserver for NoopObserver {
    fn observe(&self, _sample: &RequestSample) {}
}
