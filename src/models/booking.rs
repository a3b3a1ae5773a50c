use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool};

/// Состав заказа по категориям. Попкорн - сопутствующий товар, места не занимает.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tickets {
    #[serde(default)]
    pub adulte: u32,
    #[serde(default)]
    pub enfant: u32,
    #[serde(default)]
    pub popcorn: u32,
}

impl Tickets {
    /// Количество билетов, которым нужно место в зале.
    pub fn seated(&self) -> u32 {
        self.adulte.saturating_add(self.enfant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub showtime_id: i64,
    pub seats: Vec<i32>,
    /// `None` у старых записей без разбивки или с битым JSON.
    pub tickets: Option<Tickets>,
    pub total_price: i64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }

    /// Сколько мест вернуть в продажу при отмене или удалении брони.
    /// Берётся из разбивки билетов; без неё - одно место.
    pub fn release_count(&self) -> i32 {
        self.tickets
            .map(|t| t.seated())
            .filter(|&n| n > 0)
            .and_then(|n| i32::try_from(n).ok())
            .unwrap_or(1)
    }
}

/// Строка таблицы `bookings` как она лежит в БД.
#[derive(Debug, FromRow)]
pub struct BookingRow {
    pub id: i64,
    pub user_id: i64,
    pub showtime_id: i64,
    pub seats: Vec<i32>,
    pub tickets: Option<Json<serde_json::Value>>,
    pub total_price: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        // Только объект: serde принял бы и массив `[adulte, enfant, popcorn]`
        let tickets = row
            .tickets
            .filter(|Json(value)| value.is_object())
            .and_then(|Json(value)| serde_json::from_value::<Tickets>(value).ok());
        // Неизвестный статус считаем отменённым: такая бронь места не держит
        let status = BookingStatus::parse(&row.status).unwrap_or(BookingStatus::Cancelled);

        Booking {
            id: row.id,
            user_id: row.user_id,
            showtime_id: row.showtime_id,
            seats: row.seats,
            tickets,
            total_price: row.total_price,
            status,
            created_at: row.created_at,
        }
    }
}

pub const BOOKING_COLUMNS: &str =
    "id, user_id, showtime_id, seats, tickets, total_price, status, created_at";

/// Бронь, прошедшая проверку и готовая к записи.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: i64,
    pub showtime_id: i64,
    pub seats: SeatRequest,
    pub tickets: Tickets,
    pub total_price: i64,
}

/// Как выбираются места для новой брони.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatRequest {
    /// Клиент выбрал конкретные места.
    Explicit(Vec<i32>),
    /// Устаревший режим: назначить N свободных мест.
    Auto(i32),
}

/// Бронь с данными сеанса, фильма и покупателя для админки.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BookingDetails {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub email: String,
    pub showtime_id: i64,
    pub movie_title: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub room: String,
    pub seats: Vec<i32>,
    pub total_price: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

const DETAILS_QUERY: &str = r#"
    SELECT b.id, b.user_id, u.name AS user_name, u.email,
           b.showtime_id, m.title AS movie_title, s.date, s.time, s.room,
           b.seats, b.total_price, b.status, b.created_at
    FROM bookings b
    JOIN users u ON u.id = b.user_id
    JOIN showtimes s ON s.id = b.showtime_id
    JOIN movies m ON m.id = s.movie_id
"#;

impl BookingDetails {
    pub async fn all(pool: &PgPool) -> Result<Vec<BookingDetails>, sqlx::Error> {
        sqlx::query_as::<_, BookingDetails>(&format!(
            "{DETAILS_QUERY} ORDER BY b.created_at DESC, b.id DESC"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: i64) -> Result<Option<BookingDetails>, sqlx::Error> {
        sqlx::query_as::<_, BookingDetails>(&format!("{DETAILS_QUERY} WHERE b.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(tickets: Option<serde_json::Value>, status: &str) -> BookingRow {
        BookingRow {
            id: 7,
            user_id: 1,
            showtime_id: 2,
            seats: vec![4, 5],
            tickets: tickets.map(Json),
            total_price: 6000,
            status: status.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn release_count_follows_seated_tickets() {
        let booking: Booking =
            row(Some(serde_json::json!({"adulte": 2, "enfant": 1, "popcorn": 3})), "confirmed").into();
        assert_eq!(booking.release_count(), 3);
        assert!(booking.is_active());
    }

    #[test]
    fn release_count_falls_back_to_one_without_breakdown() {
        let missing: Booking = row(None, "confirmed").into();
        assert_eq!(missing.tickets, None);
        assert_eq!(missing.release_count(), 1);

        let malformed: Booking = row(Some(serde_json::json!({"adulte": -2})), "confirmed").into();
        assert_eq!(malformed.tickets, None);
        assert_eq!(malformed.release_count(), 1);

        let wrong_shape: Booking = row(Some(serde_json::json!([1, 2])), "confirmed").into();
        assert_eq!(wrong_shape.tickets, None);
        assert_eq!(wrong_shape.release_count(), 1);

        let scalar: Booking = row(Some(serde_json::json!(5)), "confirmed").into();
        assert_eq!(scalar.release_count(), 1);
    }

    #[test]
    fn popcorn_only_breakdown_still_releases_one() {
        let booking: Booking = row(Some(serde_json::json!({"popcorn": 2})), "confirmed").into();
        assert_eq!(booking.release_count(), 1);
    }

    #[test]
    fn status_strings_match_table_values() {
        for status in [BookingStatus::Confirmed, BookingStatus::Cancelled] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::Cancelled.as_str(), "cancelled");
    }

    #[test]
    fn unknown_status_does_not_hold_seats() {
        let booking: Booking = row(None, "pending").into();
        assert_eq!(booking.status, BookingStatus::Cancelled);
    }
}
