//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{Article, Comment};

/// Failures raised by the authoritative content store.
///
/// "No rows" is never an error: lookups that may miss return `Option`.
#[derive(Debug, Clone, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("database unavailable: {0}")]
    Unavailable(String),
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Read access to articles and their comments.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn fetch_article(&self, id: i32) -> Result<Option<Article>, RepoError>;

    /// Comments for one article, ordered by comment id.
    async fn fetch_comments(&self, article_id: i32) -> Result<Vec<Comment>, RepoError>;

    /// Every article, ordered by id.
    async fn fetch_all_articles(&self) -> Result<Vec<Article>, RepoError>;

    /// One uniformly drawn article id, or `None` when the store is empty.
    async fn fetch_random_article_id(&self) -> Result<Option<i32>, RepoError>;

    /// Cheap liveness probe for the health route.
    async fn ping(&self) -> Result<(), RepoError>;
}
