use std::sync::Once;

use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::{
    observe::{RequestObserver, RequestSample},
    resolver::{
        METRIC_CACHE_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_CACHE_REJECTED,
        METRIC_STORE_FETCH,
    },
};
use crate::cache::METRIC_COALESCED_WAIT;
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

pub const METRIC_HTTP_REQUESTS: &str = "lectern_http_requests_total";
pub const METRIC_HTTP_DURATION: &str = "lectern_http_request_duration_ms";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of verified cache hits."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of cache misses."
        );
        describe_counter!(
            METRIC_CACHE_ERROR,
            Unit::Count,
            "Total number of failed cache operations, by operation."
        );
        describe_counter!(
            METRIC_CACHE_REJECTED,
            Unit::Count,
            "Total number of cached payloads discarded because they did not match their key."
        );
        describe_counter!(
            METRIC_STORE_FETCH,
            Unit::Count,
            "Total number of content store fetches, by request kind."
        );
        describe_counter!(
            METRIC_COALESCED_WAIT,
            Unit::Count,
            "Total number of misses that waited on an in-flight fetch."
        );
        describe_counter!(
            METRIC_HTTP_REQUESTS,
            Unit::Count,
            "Total number of HTTP requests, by route and status."
        );
        describe_histogram!(
            METRIC_HTTP_DURATION,
            Unit::Milliseconds,
            "HTTP request latency in milliseconds, by route and payload source."
        );
    });
}

/// Records request samples into the global metrics recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl RequestObserver for MetricsObserver {
    fn observe(&self, sample: &RequestSample) {
        counter!(
            METRIC_HTTP_REQUESTS,
            "route" => sample.route.clone(),
            "status" => sample.status.to_string()
        )
        .increment(1);
        histogram!(
            METRIC_HTTP_DURATION,
            "route" => sample.route.clone(),
            "source" => sample.source_label()
        )
        .record(sample.elapsed.as_secs_f64() * 1_000.0);
    }
}
