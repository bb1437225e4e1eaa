use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::resolver::{Missing, ResolveError},
    infra::error::InfraError,
};

/// What a failed request ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    UnknownArticle,
    EmptyStore,
    Store,
    Serialization,
    DatabaseDown,
    CacheDown,
}

impl Failure {
    pub fn as_str(self) -> &'static str {
        match self {
            Failure::UnknownArticle => "unknown_article",
            Failure::EmptyStore => "empty_store",
            Failure::Store => "store",
            Failure::Serialization => "serialization",
            Failure::DatabaseDown => "database_down",
            Failure::CacheDown => "cache_down",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            Failure::UnknownArticle | Failure::EmptyStore => StatusCode::NOT_FOUND,
            Failure::Store | Failure::Serialization => StatusCode::INTERNAL_SERVER_ERROR,
            Failure::DatabaseDown | Failure::CacheDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Body text sent to clients. Never carries store or cache detail.
    pub fn public_message(self) -> &'static str {
        match self {
            Failure::UnknownArticle => "Article not found",
            Failure::EmptyStore => "No articles available",
            Failure::Store => "Internal server error",
            Failure::Serialization => "JSON serialization error",
            Failure::DatabaseDown | Failure::CacheDown => "Service unavailable",
        }
    }
}

/// Diagnostic chain for the response log. Travels in response extensions only.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub failure: Failure,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(failure: Failure, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { failure, messages }
    }

    pub fn from_message(failure: Failure, message: impl Into<String>) -> Self {
        Self {
            failure,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// A failed content request, rendered as a plain-text body.
#[derive(Debug)]
pub struct HttpError {
    report: ErrorReport,
}

impl HttpError {
    pub fn new(failure: Failure, detail: impl Into<String>) -> Self {
        Self {
            report: ErrorReport::from_message(failure, detail),
        }
    }

    pub fn failure(&self) -> Failure {
        self.report.failure
    }

    pub fn status(&self) -> StatusCode {
        self.report.failure.status()
    }

    pub fn public_message(&self) -> &'static str {
        self.report.failure.public_message()
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.public_message()).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<ResolveError> for HttpError {
    fn from(error: ResolveError) -> Self {
        let failure = match &error {
            ResolveError::NotFound(Missing::Article(_)) => Failure::UnknownArticle,
            ResolveError::NotFound(Missing::EmptyStore) => Failure::EmptyStore,
            ResolveError::Serialization(_) => Failure::Serialization,
            ResolveError::Store(_) => Failure::Store,
        };
        Self {
            report: ErrorReport::from_error(failure, &error),
        }
    }
}

/// Process-level failures surfaced by the binary entry point.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::RepoError;

    #[test]
    fn not_found_variants_keep_distinct_messages() {
        let missing = HttpError::from(ResolveError::NotFound(Missing::Article(4)));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.public_message(), "Article not found");

        let empty = HttpError::from(ResolveError::NotFound(Missing::EmptyStore));
        assert_eq!(empty.status(), StatusCode::NOT_FOUND);
        assert_eq!(empty.public_message(), "No articles available");
    }

    #[test]
    fn internal_failures_do_not_leak_detail() {
        let store = HttpError::from(ResolveError::Store(RepoError::unavailable(
            "connection refused to 10.0.0.3",
        )));
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(store.public_message(), "Internal server error");

        let response = store.into_response();
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.failure, Failure::Store);
        assert!(
            report
                .messages
                .iter()
                .any(|message| message.contains("connection refused"))
        );
    }

    #[test]
    fn serialization_failure_is_reported_as_such() {
        let error = HttpError::from(ResolveError::Serialization("bad float".into()));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.public_message(), "JSON serialization error");
        assert_eq!(error.failure().as_str(), "serialization");
    }

    #[test]
    fn dependency_outages_map_to_service_unavailable() {
        for failure in [Failure::DatabaseDown, Failure::CacheDown] {
            assert_eq!(failure.status(), StatusCode::SERVICE_UNAVAILABLE);
        }
        assert_eq!(Failure::CacheDown.as_str(), "cache_down");
    }
}
