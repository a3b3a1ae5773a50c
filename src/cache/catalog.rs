use redis::AsyncCommands;
use tracing::debug;

use super::{parse_error, serialize_error, CacheService};
use crate::models::Movie;

const MOVIES_KEY: &str = "movies:active";
const MOVIES_TTL_SECONDS: u64 = 600;

impl CacheService {
    // Активные фильмы: сначала кеш, потом БД
    pub async fn get_movies(&self) -> Result<Vec<Movie>, sqlx::Error> {
        if let Ok(movies) = self.get_movies_from_cache().await {
            return Ok(movies);
        }

        let movies = Movie::list_active(&self.db.pool).await?;
        if let Err(e) = self.save_movies_to_cache(&movies).await {
            debug!(error = %e, "movie list not cached");
        }
        Ok(movies)
    }

    /// Сбрасывается после любой правки фильмов или их рейтинга.
    pub async fn invalidate_movies(&self) {
        let result: redis::RedisResult<()> = async {
            let mut conn = self.redis.conn().await?;
            conn.del(MOVIES_KEY).await
        }
        .await;
        if let Err(e) = result {
            debug!(error = %e, "movie list invalidation failed");
        }
    }

    // === Работа с кешем ===
    async fn get_movies_from_cache(&self) -> redis::RedisResult<Vec<Movie>> {
        let mut conn = self.redis.conn().await?;
        let data: Option<String> = conn.get(MOVIES_KEY).await?;
        let data = data.ok_or_else(|| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Cache miss"))
        })?;
        serde_json::from_str(&data).map_err(parse_error)
    }

    async fn save_movies_to_cache(&self, movies: &[Movie]) -> redis::RedisResult<()> {
        let data = serde_json::to_string(movies).map_err(serialize_error)?;
        let mut conn = self.redis.conn().await?;
        conn.set_ex(MOVIES_KEY, data, MOVIES_TTL_SECONDS).await
    }
}
