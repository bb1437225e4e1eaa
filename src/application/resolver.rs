//! Read-through resolution of content requests.
//!
//! Every request is mapped to a cache key, looked up in the cache, and on a
//! miss assembled from the content store and written back with the TTL the
//! key's kind calls for. The cache is best-effort: its failures are logged
//! and counted, never returned. Store failures abort the request.

use std::{fmt, sync::Arc};

use metrics::counter;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::application::payload::{ArticleListPayload, ContentPayload, PayloadError};
use crate::application::repos::{ContentStore, RepoError};
use crate::cache::{CacheConfig, CacheKey, CacheStore, KeySpace, MissCoalescer};

pub(crate) const METRIC_CACHE_HIT: &str = "lectern_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "lectern_cache_miss_total";
pub(crate) const METRIC_CACHE_ERROR: &str = "lectern_cache_error_total";
pub(crate) const METRIC_CACHE_REJECTED: &str = "lectern_cache_rejected_total";
pub(crate) const METRIC_STORE_FETCH: &str = "lectern_store_fetch_total";

/// The three request shapes served over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRequest {
    All,
    ById(i32),
    Random,
}

impl ContentRequest {
    pub fn label(&self) -> &'static str {
        match self {
            ContentRequest::All => "all",
            ContentRequest::ById(_) => "by_id",
            ContentRequest::Random => "random",
        }
    }
}

/// Where a resolved body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Cache,
    Store,
}

impl PayloadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadSource::Cache => "cache",
            PayloadSource::Store => "store",
        }
    }
}

/// A serialized payload ready to be written to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub body: String,
    pub source: PayloadSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Article(i32),
    EmptyStore,
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Article(id) => write!(f, "article {id} does not exist"),
            Missing::EmptyStore => f.write_str("no articles available"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("not found: {0}")]
    NotFound(Missing),
    #[error("content store failed: {0}")]
    Store(#[from] RepoError),
    #[error("payload serialization failed: {0}")]
    Serialization(String),
}

impl From<PayloadError> for ResolveError {
    fn from(err: PayloadError) -> Self {
        ResolveError::Serialization(err.to_string())
    }
}

type FillOutcome = Result<Resolved, ResolveError>;

/// Resolves content requests against the cache, then the store.
///
/// Cheap to clone: all collaborators are shared handles injected by the
/// process entry point.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn ContentStore>,
    cache: Arc<dyn CacheStore>,
    config: Arc<CacheConfig>,
    keys: KeySpace,
    coalescer: Option<MissCoalescer<FillOutcome>>,
}

impl Resolver {
    pub fn new(
        store: Arc<dyn ContentStore>,
        cache: Arc<dyn CacheStore>,
        config: CacheConfig,
    ) -> Self {
        let keys = config.key_space();
        let coalescer = config.coalesce_misses.then(MissCoalescer::new);
        Self {
            store,
            cache,
            config: Arc::new(config),
            keys,
            coalescer,
        }
    }

    #[instrument(skip_all, fields(request = request.label()))]
    pub async fn resolve(&self, request: ContentRequest) -> Result<Resolved, ResolveError> {
        match request {
            ContentRequest::All => self.resolve_key(CacheKey::AllArticles).await,
            ContentRequest::ById(id) => self.resolve_key(CacheKey::Article(id)).await,
            ContentRequest::Random => {
                counter!(METRIC_STORE_FETCH, "request" => "random_id").increment(1);
                let id = self
                    .store
                    .fetch_random_article_id()
                    .await?
                    .ok_or(ResolveError::NotFound(Missing::EmptyStore))?;
                debug!(article_id = id, "random draw resolved");
                self.resolve_key(CacheKey::Article(id)).await
            }
        }
    }

    async fn resolve_key(&self, key: CacheKey) -> Result<Resolved, ResolveError> {
        let rendered = self.keys.render(key);

        if let Some(body) = self.lookup(key, &rendered).await {
            return Ok(Resolved {
                body,
                source: PayloadSource::Cache,
            });
        }

        match &self.coalescer {
            Some(coalescer) => {
                let this = self.clone();
                coalescer
                    .run(&rendered, move || async move { this.fill(key).await })
                    .await
            }
            None => self.fill(key).await,
        }
    }

    async fn lookup(&self, key: CacheKey, rendered: &str) -> Option<String> {
        if !self.config.enabled {
            return None;
        }

        match self.cache.get(rendered).await {
            Ok(Some(body)) => match verify_cached(key, &body) {
                Ok(()) => {
                    counter!(METRIC_CACHE_HIT, "kind" => key.kind()).increment(1);
                    debug!(cache_key = rendered, outcome = "hit", "serving cached payload");
                    Some(body)
                }
                Err(err) => {
                    counter!(METRIC_CACHE_REJECTED, "kind" => key.kind()).increment(1);
                    warn!(
                        cache_key = rendered,
                        backend = self.cache.backend(),
                        error = %err,
                        "discarding cached payload that does not match its key"
                    );
                    None
                }
            },
            Ok(None) => {
                counter!(METRIC_CACHE_MISS, "kind" => key.kind()).increment(1);
                debug!(cache_key = rendered, outcome = "miss", "cache miss");
                None
            }
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "op" => "get").increment(1);
                warn!(
                    cache_key = rendered,
                    backend = self.cache.backend(),
                    op = "get",
                    error = %err,
                    "cache lookup failed, falling back to store"
                );
                None
            }
        }
    }

    async fn fill(&self, key: CacheKey) -> FillOutcome {
        let body = match key {
            CacheKey::AllArticles => self.assemble_all().await?.encode()?,
            CacheKey::Article(id) => self.assemble_article(id).await?.encode()?,
        };

        self.populate(key, &body).await;

        Ok(Resolved {
            body,
            source: PayloadSource::Store,
        })
    }

    async fn assemble_article(&self, id: i32) -> Result<ContentPayload, ResolveError> {
        counter!(METRIC_STORE_FETCH, "request" => "article").increment(1);
        let article = self
            .store
            .fetch_article(id)
            .await?
            .ok_or(ResolveError::NotFound(Missing::Article(id)))?;
        let comments = self.store.fetch_comments(id).await?;
        Ok(ContentPayload::new(article, comments))
    }

    async fn assemble_all(&self) -> Result<ArticleListPayload, ResolveError> {
        counter!(METRIC_STORE_FETCH, "request" => "all").increment(1);
        let articles = self.store.fetch_all_articles().await?;
        let mut entries = Vec::with_capacity(articles.len());
        for article in articles {
            let comments = self.store.fetch_comments(article.id).await?;
            entries.push(ContentPayload::new(article, comments));
        }
        Ok(ArticleListPayload { articles: entries })
    }

    async fn populate(&self, key: CacheKey, body: &str) {
        if !self.config.enabled {
            return;
        }

        let rendered = self.keys.render(key);
        let ttl = self.config.ttl_for(key);
        match self.cache.set_with_ttl(&rendered, body, ttl).await {
            Ok(()) => {
                debug!(
                    cache_key = rendered,
                    ttl_secs = ttl.as_secs(),
                    "cache populated"
                );
            }
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "op" => "set").increment(1);
                warn!(
                    cache_key = rendered,
                    backend = self.cache.backend(),
                    op = "set",
                    error = %err,
                    "cache population failed"
                );
            }
        }
    }
}

fn verify_cached(key: CacheKey, body: &str) -> Result<(), PayloadError> {
    match key {
        CacheKey::AllArticles => ArticleListPayload::decode(body).map(|_| ()),
        CacheKey::Article(id) => ContentPayload::verify(body, id).map(|_| ()),
    }
}
