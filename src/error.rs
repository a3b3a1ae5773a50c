//! Ошибки приложения и их отображение в HTTP-ответы.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Единая ошибка для ядра бронирования и HTTP-слоя.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Некорректный ввод; отклоняется до любых изменений.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Мест меньше, чем запрошено.
    #[error("requested {requested} seats but only {available} available")]
    InsufficientCapacity { requested: i32, available: i32 },

    /// Места уже заняты другой активной бронью.
    #[error("seats already taken: {seats:?}")]
    SeatConflict { seats: Vec<i32> },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Отмена внутри окна перед началом сеанса.
    #[error("too late to cancel: {minutes_left} min left, cutoff is {cutoff_minutes} min")]
    TooLate { minutes_left: i64, cutoff_minutes: i64 },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Сбой вне хранилища (хеширование пароля, подпись токена).
    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        AppError::NotFound { entity, id }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        AppError::Internal(err.to_string())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InsufficientCapacity { .. } => "INSUFFICIENT_CAPACITY",
            AppError::SeatConflict { .. } => "SEAT_CONFLICT",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::TooLate { .. } => "TOO_LATE",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientCapacity { .. } => StatusCode::CONFLICT,
            AppError::SeatConflict { .. } => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::TooLate { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Переводит ошибку уникальности (23505) в `Conflict`, остальное оставляет как есть.
pub fn on_unique_violation(err: sqlx::Error, msg: impl Into<String>) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            AppError::Conflict(msg.into())
        }
        _ => AppError::Storage(err),
    }
}

/// Переводит нарушение внешнего ключа (23503) в `NotFound` для указанной сущности.
pub fn on_foreign_key_violation(err: sqlx::Error, entity: &'static str, id: i64) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
            AppError::not_found(entity, id)
        }
        _ => AppError::Storage(err),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match &self {
            AppError::InsufficientCapacity { requested, available } => json!({
                "error": self.to_string(),
                "code": code,
                "requested": requested,
                "available_seats": available,
            }),
            AppError::SeatConflict { seats } => json!({
                "error": self.to_string(),
                "code": code,
                "seats": seats,
            }),
            AppError::TooLate { minutes_left, cutoff_minutes } => json!({
                "error": self.to_string(),
                "code": code,
                "minutes_left": minutes_left,
                "cutoff_minutes": cutoff_minutes,
            }),
            AppError::Storage(_) | AppError::Internal(_) => {
                // Детали наружу не отдаём
                tracing::error!(error = %self, "request failed");
                json!({
                    "error": "An internal error occurred",
                    "code": code,
                })
            }
            _ => json!({
                "error": self.to_string(),
                "code": code,
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_error_maps_to_conflict() {
        let err = AppError::InsufficientCapacity { requested: 3, available: 1 };
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "INSUFFICIENT_CAPACITY");
    }

    #[test]
    fn row_not_found_stays_storage_error() {
        let err = on_unique_violation(sqlx::Error::RowNotFound, "duplicate");
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn too_late_is_unprocessable() {
        let err = AppError::TooLate { minutes_left: 10, cutoff_minutes: 25 };
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("25"));
    }
}
