//! Cache key definitions.
//!
//! Keys are plain strings on the wire so they can live in a shared backend:
//! `articles_all` for the listing and `article:<id>` for single articles,
//! optionally behind a deployment-wide prefix.

use std::fmt;

const ALL_ARTICLES_KEY: &str = "articles_all";
const ARTICLE_KEY_PREFIX: &str = "article:";

/// Logical cache key for a resolvable piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    AllArticles,
    Article(i32),
}

impl CacheKey {
    pub fn kind(&self) -> &'static str {
        match self {
            CacheKey::AllArticles => "list",
            CacheKey::Article(_) => "item",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::AllArticles => f.write_str(ALL_ARTICLES_KEY),
            CacheKey::Article(id) => write!(f, "{ARTICLE_KEY_PREFIX}{id}"),
        }
    }
}

/// Namespace applied to every key before it reaches the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The backend key for `key`.
    pub fn render(&self, key: CacheKey) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{key}", self.prefix)
        }
    }
}
