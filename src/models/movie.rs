use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::Validate;

use crate::error::{on_unique_violation, AppError, AppResult};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub genre: String,
    pub duration: i32,
    pub description: Option<String>,
    pub poster_url: Option<String>,
    pub rating: f64,
    pub votes_count: i32,
    pub release_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MovieInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub genre: String,
    #[validate(range(min = 1, max = 600))]
    pub duration: i32,
    pub description: Option<String>,
    #[validate(url)]
    pub poster_url: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Учитывается только при обновлении.
    pub is_active: Option<bool>,
}

const MOVIE_COLUMNS: &str = "id, title, genre, duration, description, poster_url, rating, \
     votes_count, release_date, end_date, is_active, created_at";

impl Movie {
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE is_active = TRUE ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: i64) -> AppResult<Movie> {
        sqlx::query_as::<_, Movie>(&format!("SELECT {MOVIE_COLUMNS} FROM movies WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::not_found("movie", id))
    }

    pub async fn create(pool: &PgPool, input: &MovieInput) -> AppResult<Movie> {
        check_dates(input)?;
        sqlx::query_as::<_, Movie>(&format!(
            "INSERT INTO movies (title, genre, duration, description, poster_url, release_date, end_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {MOVIE_COLUMNS}"
        ))
        .bind(&input.title)
        .bind(&input.genre)
        .bind(input.duration)
        .bind(&input.description)
        .bind(&input.poster_url)
        .bind(input.release_date)
        .bind(input.end_date)
        .fetch_one(pool)
        .await
        .map_err(|e| on_unique_violation(e, format!("movie '{}' already exists", input.title)))
    }

    pub async fn update(pool: &PgPool, id: i64, input: &MovieInput) -> AppResult<Movie> {
        check_dates(input)?;
        sqlx::query_as::<_, Movie>(&format!(
            "UPDATE movies
             SET title = $2, genre = $3, duration = $4, description = $5, poster_url = $6,
                 release_date = $7, end_date = $8, is_active = COALESCE($9, is_active)
             WHERE id = $1
             RETURNING {MOVIE_COLUMNS}"
        ))
        .bind(id)
        .bind(&input.title)
        .bind(&input.genre)
        .bind(input.duration)
        .bind(&input.description)
        .bind(&input.poster_url)
        .bind(input.release_date)
        .bind(input.end_date)
        .bind(input.is_active)
        .fetch_optional(pool)
        .await
        .map_err(|e| on_unique_violation(e, format!("movie '{}' already exists", input.title)))?
        .ok_or(AppError::not_found("movie", id))
    }

    /// Фильм не удаляется физически: на него ссылаются сеансы и брони.
    pub async fn deactivate(pool: &PgPool, id: i64) -> AppResult<()> {
        let result = sqlx::query("UPDATE movies SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("movie", id));
        }
        Ok(())
    }

    pub async fn count_active(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM movies WHERE is_active = TRUE")
            .fetch_one(pool)
            .await
    }
}

fn check_dates(input: &MovieInput) -> AppResult<()> {
    if let (Some(release), Some(end)) = (input.release_date, input.end_date) {
        if end < release {
            return Err(AppError::validation("end_date must not precede release_date"));
        }
    }
    Ok(())
}
