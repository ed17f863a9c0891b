use async_trait::async_trait;
use sqlx::PgPool;

use self::models::Snippet;

pub mod models;
pub mod routes;

/// How many snippets the home page lists.
pub const LATEST_LIMIT: i64 = 10;

#[derive(thiserror::Error, Debug)]
pub enum SnippetsError {
    #[error("no matching record found")]
    NoRecord,

    #[error("something went wrong")]
    Sqlx(#[from] sqlx::Error),
}

#[async_trait]
pub trait SnippetModel: Send + Sync {
    /// Stores a new snippet expiring `expires` days from now and returns its id.
    async fn insert(&self, title: &str, content: &str, expires: i32) -> Result<i64, SnippetsError>;

    /// Fetches a snippet that has not expired yet.
    async fn get(&self, id: i64) -> Result<Snippet, SnippetsError>;

    /// The most recently created snippets that have not expired, newest first.
    async fn latest(&self) -> Result<Vec<Snippet>, SnippetsError>;
}

pub struct PgSnippetModel {
    db_pool: PgPool,
}

impl PgSnippetModel {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SnippetModel for PgSnippetModel {
    async fn insert(&self, title: &str, content: &str, expires: i32) -> Result<i64, SnippetsError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
INSERT INTO snippets (title, content, created, expires)
VALUES ($1, $2, NOW(), NOW() + make_interval(days => $3))
RETURNING id
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(expires)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Snippet, SnippetsError> {
        sqlx::query_as(
            r#"
SELECT id, title, content, created, expires FROM snippets
WHERE expires > NOW() AND id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or(SnippetsError::NoRecord)
    }

    async fn latest(&self) -> Result<Vec<Snippet>, SnippetsError> {
        let snippets = sqlx::query_as(
            r#"
SELECT id, title, content, created, expires FROM snippets
WHERE expires > NOW()
ORDER BY id DESC
LIMIT $1
            "#,
        )
        .bind(LATEST_LIMIT)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(snippets)
    }
}
