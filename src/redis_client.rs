use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    Client,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Клиент Redis с ленивым подключением: сервис стартует и без кеша,
/// соединение поднимается при первом обращении и дальше переиспользуется.
#[derive(Clone)]
pub struct RedisClient {
    client: Client,
    conn: Arc<OnceCell<ConnectionManager>>,
}

impl RedisClient {
    pub fn new(redis_url: &str) -> redis::RedisResult<Self> {
        let client = Client::open(redis_url)?;
        Ok(RedisClient {
            client,
            conn: Arc::new(OnceCell::new()),
        })
    }

    pub async fn conn(&self) -> redis::RedisResult<ConnectionManager> {
        let manager = self
            .conn
            .get_or_try_init(|| {
                // Один ретрай и короткий таймаут подключения
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(1)
                    .set_connection_timeout(Duration::from_secs(2));
                ConnectionManager::new_with_config(self.client.clone(), config)
            })
            .await?;
        Ok(manager.clone())
    }
}
