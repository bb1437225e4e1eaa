use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    application::{
        error::{Failure, HttpError},
        observe::RequestObserver,
        repos::ContentStore,
        resolver::{ContentRequest, ResolveError, Resolved, Resolver},
    },
    cache::CacheStore,
};

use super::{
    health_response,
    middleware::{log_responses, observe_requests, set_request_context},
};

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Clone)]
pub struct HttpState {
    pub resolver: Resolver,
    pub store: Arc<dyn ContentStore>,
    pub cache: Arc<dyn CacheStore>,
    pub observer: Arc<dyn RequestObserver>,
}

pub fn build_router(state: HttpState) -> Router {
    let observer = state.observer.clone();

    // `/article/random` is a static segment and wins over `/article/{id}`.
    Router::new()
        .route("/articles", get(list_articles))
        .route("/article/random", get(random_article))
        .route("/article/{id}", get(article_by_id))
        .route("/_health/db", get(db_health))
        .route("/_health/cache", get(cache_health))
        .with_state(state)
        .layer(middleware::from_fn_with_state(observer, observe_requests))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn list_articles(State(state): State<HttpState>) -> Response {
    content_response(state.resolver.resolve(ContentRequest::All).await)
}

async fn random_article(State(state): State<HttpState>) -> Response {
    content_response(state.resolver.resolve(ContentRequest::Random).await)
}

async fn article_by_id(State(state): State<HttpState>, Path(raw_id): Path<String>) -> Response {
    let Ok(id) = raw_id.parse::<i32>() else {
        return HttpError::new(
            Failure::UnknownArticle,
            format!("`{raw_id}` is not an article id"),
        )
        .into_response();
    };

    content_response(state.resolver.resolve(ContentRequest::ById(id)).await)
}

fn content_response(result: Result<Resolved, ResolveError>) -> Response {
    match result {
        Ok(resolved) => {
            let mut response = ([(CONTENT_TYPE, JSON_CONTENT_TYPE)], resolved.body).into_response();
            response.extensions_mut().insert(resolved.source);
            response
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn db_health(State(state): State<HttpState>) -> Response {
    health_response(Failure::DatabaseDown, state.store.ping().await)
}

async fn cache_health(State(state): State<HttpState>) -> Response {
    health_response(Failure::CacheDown, state.cache.ping().await)
}
