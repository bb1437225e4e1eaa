//! Wire payloads served to clients and stored in the cache.
//!
//! A payload is encoded once, cached as the exact string that was served,
//! and only decoded again to verify a cache hit.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entities::{Article, Comment};

/// One article together with its comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPayload {
    #[serde(flatten)]
    pub article: Article,
    pub comments: Vec<CommentEntry>,
}

/// A comment as it appears inside a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntry {
    pub id: i32,
    pub content: String,
}

/// Response body for the all-articles listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleListPayload {
    pub articles: Vec<ContentPayload>,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("payload describes article {found}, expected {expected}")]
    IdentityMismatch { expected: i32, found: i32 },
}

impl From<Comment> for CommentEntry {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            content: comment.content,
        }
    }
}

impl ContentPayload {
    pub fn new(article: Article, comments: Vec<Comment>) -> Self {
        Self {
            article,
            comments: comments.into_iter().map(CommentEntry::from).collect(),
        }
    }

    pub fn encode(&self) -> Result<String, PayloadError> {
        serde_json::to_string(self).map_err(PayloadError::Encode)
    }

    pub fn decode(body: &str) -> Result<Self, PayloadError> {
        serde_json::from_str(body).map_err(PayloadError::Decode)
    }

    /// Decode a cached body and check that it belongs to article `id`.
    pub fn verify(body: &str, id: i32) -> Result<Self, PayloadError> {
        let payload = Self::decode(body)?;
        if payload.article.id != id {
            return Err(PayloadError::IdentityMismatch {
                expected: id,
                found: payload.article.id,
            });
        }
        Ok(payload)
    }
}

impl ArticleListPayload {
    pub fn encode(&self) -> Result<String, PayloadError> {
        serde_json::to_string(self).map_err(PayloadError::Encode)
    }

    pub fn decode(body: &str) -> Result<Self, PayloadError> {
        serde_json::from_str(body).map_err(PayloadError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello_world() -> ContentPayload {
        ContentPayload::new(
            Article {
                id: 1,
                title: "Hello".into(),
                content: "World".into(),
            },
            vec![Comment {
                id: 1,
                article_id: 1,
                content: "First".into(),
            }],
        )
    }

    #[test]
    fn single_article_uses_flat_wire_shape() {
        let body = hello_world().encode().expect("encodes");
        assert_eq!(
            body,
            r#"{"id":1,"title":"Hello","content":"World","comments":[{"id":1,"content":"First"}]}"#
        );
    }

    #[test]
    fn listing_wraps_articles() {
        let body = ArticleListPayload {
            articles: vec![hello_world()],
        }
        .encode()
        .expect("encodes");
        assert!(body.starts_with(r#"{"articles":[{"id":1,"#));
    }

    #[test]
    fn verify_rejects_foreign_article() {
        let body = hello_world().encode().expect("encodes");
        match ContentPayload::verify(&body, 2) {
            Err(PayloadError::IdentityMismatch { expected, found }) => {
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected verification result: {other:?}"),
        }
    }

    #[test]
    fn verify_rejects_garbage() {
        assert!(matches!(
            ContentPayload::verify("not json", 1),
            Err(PayloadError::Decode(_))
        ));
    }

    #[test]
    fn escapes_control_characters() {
        let payload = ContentPayload::new(
            Article {
                id: 7,
                title: "quote \" and tab\t".into(),
                content: "line\nbreak \u{0}".into(),
            },
            Vec::new(),
        );
        let body = payload.encode().expect("encodes");
        let decoded = ContentPayload::verify(&body, 7).expect("decodes");
        assert_eq!(decoded, payload);
    }
}
