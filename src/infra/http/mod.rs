mod middleware;
mod public;

pub use middleware::RequestContext;
pub use public::{HttpState, build_router};

use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::error::{ErrorReport, Failure};

/// 204 when the dependency answered, 503 with an attached report otherwise.
fn health_response<E: StdError>(outage: Failure, result: Result<(), E>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = outage.status().into_response();
            ErrorReport::from_error(outage, &err).attach(&mut response);
            response
        }
    }
}
