use redis::RedisError;
use tracing::info;

use crate::{database::Database, redis_client::RedisClient};

pub mod catalog;

/// Кеш чтения поверх Redis. Ошибки Redis не пробрасываются наружу:
/// при недоступном кеше данные берутся из БД.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    db: Database,
}

impl CacheService {
    pub fn new(redis: RedisClient, db: Database) -> Self {
        Self { redis, db }
    }

    // Прогрев кеша при старте
    pub async fn warmup_cache(&self) {
        info!("Starting cache warmup...");
        match self.get_movies().await {
            Ok(movies) => info!("Loaded {} movies", movies.len()),
            Err(e) => tracing::warn!(error = %e, "cache warmup skipped"),
        }
        info!("Cache warmup done");
    }
}

fn parse_error(_: serde_json::Error) -> RedisError {
    RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
}

fn serialize_error(_: serde_json::Error) -> RedisError {
    RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
}
