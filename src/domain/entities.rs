//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};

/// An article as stored in the `articles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: i32,
    pub title: String,
    pub content: String,
}

/// A comment attached to an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: i32,
    pub article_id: i32,
    pub content: String,
}
