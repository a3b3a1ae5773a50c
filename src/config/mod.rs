use serde::Deserialize;
use std::env;
use std::str::FromStr;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub booking: BookingConfig,
    pub notifications: NotificationConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    /// `json` включает структурированный вывод логов, всё остальное - обычный fmt.
    pub log_format: String,
}

// Настройки базы данных
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Настройки Redis
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

// Настройки JWT
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
}

/// Правила продажи билетов.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// За сколько минут до начала сеанса отмена запрещена.
    pub cancellation_cutoff_minutes: i64,
    /// За сколько минут до начала сеанс пропадает из публичной выдачи и закрывается для продаж.
    pub booking_lead_minutes: i64,
    /// Смещение часового пояса кинотеатра относительно UTC (date/time сеансов хранятся в местном времени).
    pub utc_offset_minutes: i32,
    /// Устаревший режим: бронь без явных мест, места назначаются автоматически.
    pub auto_assign_seats: bool,
}

// Настройки отправки подтверждений
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// URL почтового релея. Если не задан - подтверждения только логируются.
    pub relay_url: Option<String>,
    pub api_key: Option<String>,
    pub sender: String,
    pub timeout_seconds: u64,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            cancellation_cutoff_minutes: crate::services::ledger::CANCELLATION_CUTOFF_MINUTES,
            booking_lead_minutes: crate::services::ledger::BOOKING_LEAD_MINUTES,
            utc_offset_minutes: 60,
            auto_assign_seats: false,
        }
    }
}

fn var_or<T>(key: &str, default: &str) -> T
where
    T: FromStr,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .unwrap_or_else(|_| panic!("{key} must be a valid value"))
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let booking_defaults = BookingConfig::default();

        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: var_or("PORT", "3000"),
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "cinema_booking=debug,tower_http=debug".to_string()),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "fmt".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: var_or("DB_POOL_SIZE", "20"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
                expires_in_hours: var_or("JWT_EXPIRES_IN_HOURS", "24"),
            },
            booking: BookingConfig {
                cancellation_cutoff_minutes: var_or(
                    "CANCELLATION_CUTOFF_MINUTES",
                    &booking_defaults.cancellation_cutoff_minutes.to_string(),
                ),
                booking_lead_minutes: var_or(
                    "BOOKING_LEAD_MINUTES",
                    &booking_defaults.booking_lead_minutes.to_string(),
                ),
                utc_offset_minutes: var_or(
                    "CINEMA_UTC_OFFSET_MINUTES",
                    &booking_defaults.utc_offset_minutes.to_string(),
                ),
                auto_assign_seats: var_or("AUTO_ASSIGN_SEATS", "false"),
            },
            notifications: NotificationConfig {
                relay_url: optional_var("MAIL_RELAY_URL"),
                api_key: optional_var("MAIL_RELAY_API_KEY"),
                sender: env::var("MAIL_SENDER")
                    .unwrap_or_else(|_| "noreply@sylver-screen.com".to_string()),
                timeout_seconds: var_or("MAIL_RELAY_TIMEOUT_SECONDS", "10"),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: var_or("CIRCUIT_BREAKER_FAILURE_THRESHOLD", "5"),
                timeout_seconds: var_or("CIRCUIT_BREAKER_TIMEOUT_SECONDS", "60"),
            },
        }
    }
}
