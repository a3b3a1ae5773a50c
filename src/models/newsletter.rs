use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subscriber {
    pub id: i64,
    pub email: String,
    pub subscribed_at: DateTime<Utc>,
}

impl Subscriber {
    /// Повторная подписка того же адреса ничего не меняет.
    pub async fn subscribe(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO newsletter (email) VALUES (lower($1)) ON CONFLICT (email) DO NOTHING",
        )
        .bind(email)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Subscriber>, sqlx::Error> {
        sqlx::query_as::<_, Subscriber>(
            "SELECT id, email, subscribed_at FROM newsletter ORDER BY subscribed_at DESC, id DESC",
        )
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM newsletter WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("subscriber", id));
        }
        Ok(())
    }
}
