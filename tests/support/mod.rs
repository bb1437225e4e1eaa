#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, Response},
};
use lectern::application::observe::{RequestObserver, RequestSample};
use lectern::application::repos::{ContentStore, RepoError};
use lectern::application::resolver::Resolver;
use lectern::cache::{CacheConfig, CacheError, CacheStore, MemoryCache};
use lectern::domain::entities::{Article, Comment};
use lectern::infra::http::{HttpState, build_router};
use tower::ServiceExt;

#[derive(Default)]
pub struct StubContentStore {
    pub articles: Vec<Article>,
    pub comments: Vec<Comment>,
    pub offline: AtomicBool,
    pub fetches: AtomicUsize,
}

impl StubContentStore {
    pub fn seeded() -> Self {
        Self {
            articles: vec![
                Article {
                    id: 1,
                    title: "Hello".into(),
                    content: "World".into(),
                },
                Article {
                    id: 2,
                    title: "Second".into(),
                    content: "Body".into(),
                },
            ],
            comments: vec![Comment {
                id: 1,
                article_id: 1,
                content: "First".into(),
            }],
            ..Default::default()
        }
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepoError::unavailable("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for StubContentStore {
    async fn fetch_article(&self, id: i32) -> Result<Option<Article>, RepoError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.articles.iter().find(|a| a.id == id).cloned())
    }

    async fn fetch_comments(&self, article_id: i32) -> Result<Vec<Comment>, RepoError> {
        self.check()?;
        Ok(self
            .comments
            .iter()
            .filter(|c| c.article_id == article_id)
            .cloned()
            .collect())
    }

    async fn fetch_all_articles(&self) -> Result<Vec<Article>, RepoError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.articles.clone())
    }

    async fn fetch_random_article_id(&self) -> Result<Option<i32>, RepoError> {
        self.check()?;
        Ok(self.articles.last().map(|a| a.id))
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.check()
    }
}

pub struct FailingCache;

#[async_trait]
impl CacheStore for FailingCache {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Timeout(Duration::from_millis(250)))
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
        Err(CacheError::Timeout(Duration::from_millis(250)))
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Timeout(Duration::from_millis(250)))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Err(CacheError::Unavailable)
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub samples: Mutex<Vec<RequestSample>>,
}

impl RecordingObserver {
    pub fn samples(&self) -> Vec<RequestSample> {
        self.samples.lock().expect("samples lock").clone()
    }
}

impl RequestObserver for RecordingObserver {
    fn observe(&self, sample: &RequestSample) {
        self.samples.lock().expect("samples lock").push(sample.clone());
    }
}

pub fn memory_cache() -> Arc<MemoryCache> {
    Arc::new(MemoryCache::new(&CacheConfig::default()))
}

pub fn router_with(
    store: Arc<StubContentStore>,
    cache: Arc<dyn CacheStore>,
    observer: Arc<dyn RequestObserver>,
) -> Router {
    let resolver = Resolver::new(store.clone(), cache.clone(), CacheConfig::default());
    build_router(HttpState {
        resolver,
        store,
        cache,
        observer,
    })
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    app.clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
}
