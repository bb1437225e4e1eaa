use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::{
    error::ErrorReport,
    observe::{RequestObserver, RequestSample},
    resolver::PayloadSource,
};

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// One log line per response. Failures carry their report chain; every line
/// carries the matched route and where the payload came from.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = matched_route(&request);
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    let payload_source = payload_source(&response);

    let report = response.extensions_mut().remove::<ErrorReport>();
    let failure = report
        .as_ref()
        .map_or("none", |report| report.failure.as_str());
    let chain = report.map(|report| report.messages).unwrap_or_default();
    let detail = chain.first().map_or("", String::as_str);

    if status.is_server_error() {
        error!(
            target = "lectern::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            route = %route,
            payload_source = payload_source,
            failure = failure,
            detail = detail,
            chain = ?chain,
            elapsed_ms = elapsed_ms,
            request_id = request_id,
            "request failed",
        );
    } else if status.is_client_error() {
        warn!(
            target = "lectern::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            route = %route,
            payload_source = payload_source,
            failure = failure,
            detail = detail,
            elapsed_ms = elapsed_ms,
            request_id = request_id,
            "request rejected",
        );
    } else {
        debug!(
            target = "lectern::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            route = %route,
            payload_source = payload_source,
            elapsed_ms = elapsed_ms,
            request_id = request_id,
            "request served",
        );
    }

    response
}

fn matched_route(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |path| path.as_str().to_string())
}

fn payload_source(response: &Response) -> &'static str {
    response
        .extensions()
        .get::<PayloadSource>()
        .map_or("none", |source| source.as_str())
}

/// Time each request and hand the sample to the configured observer.
pub async fn observe_requests(
    State(observer): State<Arc<dyn RequestObserver>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let route = matched_route(&request);
    let start = Instant::now();

    let response = next.run(request).await;

    observer.observe(&RequestSample {
        route,
        status: response.status().as_u16(),
        source: response.extensions().get::<PayloadSource>().copied(),
        elapsed: start.elapsed(),
    });
    response
}
