use async_trait::async_trait;

use crate::{
    application::repos::{ContentStore, RepoError},
    domain::entities::{Article, Comment},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i32,
    title: String,
    content: String,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i32,
    article_id: i32,
    content: String,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            article_id: row.article_id,
            content: row.content,
        }
    }
}

#[async_trait]
impl ContentStore for PostgresRepositories {
    async fn fetch_article(&self, id: i32) -> Result<Option<Article>, RepoError> {
        let row = sqlx::query_as::<_, ArticleRow>(
            "SELECT id, title, content FROM articles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Article::from))
    }

    async fn fetch_comments(&self, article_id: i32) -> Result<Vec<Comment>, RepoError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT id, article_id, content FROM comments WHERE article_id = $1 ORDER BY id",
        )
        .bind(article_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn fetch_all_articles(&self) -> Result<Vec<Article>, RepoError> {
        let rows =
            sqlx::query_as::<_, ArticleRow>("SELECT id, title, content FROM articles ORDER BY id")
                .fetch_all(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    async fn fetch_random_article_id(&self) -> Result<Option<i32>, RepoError> {
        sqlx::query_scalar::<_, i32>("SELECT id FROM articles ORDER BY RANDOM() LIMIT 1")
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}
