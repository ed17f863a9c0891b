use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::{
    models::{SessionData, SessionRecord, SessionRow},
    SessionError,
};

/// Server side persistence for session data, keyed by token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the record for `token` unless it is missing or expired.
    async fn find(&self, token: Uuid) -> Result<Option<SessionRecord>, SessionError>;

    /// Inserts or replaces the record for `token`.
    async fn commit(
        &self,
        token: Uuid,
        data: &SessionData,
        expiry: DateTime<Utc>,
    ) -> Result<(), SessionError>;

    async fn delete(&self, token: Uuid) -> Result<(), SessionError>;
}

pub struct PgSessionStore {
    db_pool: PgPool,
}

impl PgSessionStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find(&self, token: Uuid) -> Result<Option<SessionRecord>, SessionError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
SELECT data, expiry FROM sessions
WHERE token = $1 AND expiry > $2
            "#,
        )
        .bind(token)
        .bind(Utc::now())
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row.map(SessionRecord::from))
    }

    async fn commit(
        &self,
        token: Uuid,
        data: &SessionData,
        expiry: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        sqlx::query(
            r#"
INSERT INTO sessions (token, data, expiry)
VALUES ($1, $2, $3)
ON CONFLICT (token) DO UPDATE
SET data = EXCLUDED.data, expiry = EXCLUDED.expiry
            "#,
        )
        .bind(token)
        .bind(Json(data))
        .bind(expiry)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, token: Uuid) -> Result<(), SessionError> {
        sqlx::query(r#"DELETE FROM sessions WHERE token = $1"#)
            .bind(token)
            .execute(&self.db_pool)
            .await?;

        Ok(())
    }
}
