pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use anyhow::Context;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::task;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use services::{notification, BookingLedger, BookingRules, Catalog, Notifier, PriceBook};
use store::PgStore;

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub db: database::Database,
    pub cache: cache::CacheService,
    pub config: config::Config,
    pub ledger: BookingLedger<PgStore>,
    pub catalog: Catalog<PgStore>,
    pub pricing: PriceBook<PgStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size)
            .await
            .context("failed to connect to database")?;
        tracing::info!("Database connected");

        db.run_migrations().await.context("failed to run migrations")?;

        let redis = redis_client::RedisClient::new(&config.redis.url)
            .context("invalid REDIS_URL")?;

        let state = Self::from_parts(config, db, redis);

        let state_for_bg = state.clone();
        task::spawn(async move {
            // Warmup cache в фоне
            state_for_bg.cache.warmup_cache().await;
        });

        Ok(state)
    }

    /// Собирает состояние из готовых клиентов, без сетевых обращений.
    pub fn from_parts(
        config: config::Config,
        db: database::Database,
        redis: redis_client::RedisClient,
    ) -> Arc<Self> {
        let store = PgStore::new(db.pool.clone());
        let rules = BookingRules::from_config(&config.booking);
        let notifier = notification::build_notifier(&config.notifications, &config.circuit_breaker);

        Arc::new(Self {
            cache: cache::CacheService::new(redis, db.clone()),
            ledger: BookingLedger::new(store.clone(), rules),
            catalog: Catalog::new(store.clone(), rules),
            pricing: PriceBook::new(store),
            db,
            config,
            notifier,
        })
    }
}

/// Полный роутер приложения.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Cinema Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
