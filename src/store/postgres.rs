use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgConnection, PgPool};

use super::{BookingStore, Released};
use crate::error::{on_foreign_key_violation, AppError, AppResult};
use crate::models::booking::{BookingRow, BOOKING_COLUMNS};
use crate::models::rating::{self, MovieRating, RateMovie};
use crate::models::showtime::{NewShowtime, ShowtimeUpdate};
use crate::models::{Booking, BookingStatus, NewBooking, Showtime};
use crate::services::inventory::{self, SeatCounter};
use crate::services::ledger::{check_cancellable, BookingRules};
use crate::services::pricing::{PriceTable, PriceUpdate, KEY_ADULT, KEY_CHILD, KEY_POPCORN};

const SHOWTIME_COLUMNS: &str = "id, movie_id, date, time, room, price, total_seats, available_seats";

/// Хранилище поверх PostgreSQL.
///
/// Строка сеанса блокируется `FOR UPDATE` на всё время операции, а списание
/// мест идёт условным `UPDATE ... WHERE available_seats >= $n`, поэтому две
/// конкурентные брони на последнее место не проходят обе.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn lock_showtime(conn: &mut PgConnection, id: i64) -> AppResult<Showtime> {
    sqlx::query_as::<_, Showtime>(&format!(
        "SELECT {SHOWTIME_COLUMNS} FROM showtimes WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(AppError::not_found("showtime", id))
}

async fn lock_booking(conn: &mut PgConnection, id: i64) -> AppResult<Booking> {
    sqlx::query_as::<_, BookingRow>(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .map(Booking::from)
    .ok_or(AppError::not_found("booking", id))
}

/// Блокирует сеанс брони, затем саму бронь. Порядок общий для всех операций:
/// сначала строка сеанса, потом строки броней.
async fn lock_showtime_and_booking(
    conn: &mut PgConnection,
    booking_id: i64,
) -> AppResult<(Showtime, Booking)> {
    let showtime_id: i64 = sqlx::query_scalar("SELECT showtime_id FROM bookings WHERE id = $1")
        .bind(booking_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(AppError::not_found("booking", booking_id))?;
    let showtime = lock_showtime(&mut *conn, showtime_id).await?;
    let booking = lock_booking(&mut *conn, booking_id).await?;
    Ok((showtime, booking))
}

async fn occupied_in(conn: &mut PgConnection, showtime_id: i64) -> Result<BTreeSet<i32>, sqlx::Error> {
    let seats: Vec<i32> = sqlx::query_scalar(
        "SELECT DISTINCT unnest(seats) FROM bookings WHERE showtime_id = $1 AND status = 'confirmed'",
    )
    .bind(showtime_id)
    .fetch_all(conn)
    .await?;
    Ok(seats.into_iter().collect())
}

/// Возвращает места в продажу, не поднимая счётчик выше вместимости.
async fn release_seats(conn: &mut PgConnection, showtime_id: i64, count: i32) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        "UPDATE showtimes SET available_seats = LEAST(total_seats, available_seats + $2)
         WHERE id = $1
         RETURNING available_seats",
    )
    .bind(showtime_id)
    .bind(count)
    .fetch_one(conn)
    .await
}

async fn load_prices(conn: &mut PgConnection) -> Result<PriceTable, sqlx::Error> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT key, value FROM settings WHERE key = ANY($1)")
            .bind(&[KEY_ADULT, KEY_CHILD, KEY_POPCORN][..])
            .fetch_all(conn)
            .await?;
    Ok(PriceTable::from_entries(rows))
}

impl BookingStore for PgStore {
    async fn showtime(&self, id: i64) -> AppResult<Showtime> {
        sqlx::query_as::<_, Showtime>(&format!(
            "SELECT {SHOWTIME_COLUMNS} FROM showtimes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::not_found("showtime", id))
    }

    async fn occupied_seats(&self, showtime_id: i64) -> AppResult<BTreeSet<i32>> {
        let mut conn = self.pool.acquire().await?;
        Ok(occupied_in(&mut conn, showtime_id).await?)
    }

    async fn price_table(&self) -> AppResult<PriceTable> {
        let mut conn = self.pool.acquire().await?;
        Ok(load_prices(&mut conn).await?)
    }

    async fn update_prices(&self, update: &PriceUpdate) -> AppResult<PriceTable> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in update.entries() {
            sqlx::query(
                "INSERT INTO settings (key, value) VALUES ($1, $2)
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        let table = load_prices(&mut tx).await?;
        tx.commit().await?;
        Ok(table)
    }

    async fn create_booking(&self, new: NewBooking) -> AppResult<Booking> {
        let mut tx = self.pool.begin().await?;

        let showtime = lock_showtime(&mut tx, new.showtime_id).await?;
        let occupied = occupied_in(&mut tx, showtime.id).await?;
        let seats = inventory::resolve_seats(&new.seats, showtime.total_seats, &occupied)?;
        let count = seats.len() as i32;

        SeatCounter::new(showtime.total_seats, showtime.available_seats).reserve(count)?;

        let remaining: Option<i32> = sqlx::query_scalar(
            "UPDATE showtimes SET available_seats = available_seats - $2
             WHERE id = $1 AND available_seats >= $2
             RETURNING available_seats",
        )
        .bind(showtime.id)
        .bind(count)
        .fetch_optional(&mut *tx)
        .await?;

        if remaining.is_none() {
            return Err(AppError::InsufficientCapacity {
                requested: count,
                available: showtime.available_seats,
            });
        }

        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "INSERT INTO bookings (user_id, showtime_id, seats, tickets, total_price, status)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(new.user_id)
        .bind(showtime.id)
        .bind(&seats)
        .bind(Json(new.tickets))
        .bind(new.total_price)
        .bind(BookingStatus::Confirmed.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| on_foreign_key_violation(e, "user", new.user_id))?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn list_bookings_for_user(&self, user_id: i64) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn cancel_booking(
        &self,
        booking_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
        rules: BookingRules,
    ) -> AppResult<Released> {
        let mut tx = self.pool.begin().await?;

        let (showtime, mut booking) = lock_showtime_and_booking(&mut tx, booking_id).await?;
        if booking.user_id != user_id {
            return Err(AppError::Forbidden("booking belongs to another user".into()));
        }
        if !booking.is_active() {
            return Err(AppError::Conflict(format!("booking {booking_id} is already cancelled")));
        }

        check_cancellable(&showtime, now, &rules)?;

        sqlx::query("UPDATE bookings SET status = $2 WHERE id = $1")
            .bind(booking_id)
            .bind(BookingStatus::Cancelled.as_str())
            .execute(&mut *tx)
            .await?;

        let count = booking.release_count();
        let available_seats = release_seats(&mut tx, showtime.id, count).await?;
        tx.commit().await?;

        booking.status = BookingStatus::Cancelled;
        Ok(Released {
            seats_released: available_seats - showtime.available_seats,
            booking,
            available_seats,
        })
    }

    async fn delete_booking(&self, booking_id: i64) -> AppResult<Released> {
        let mut tx = self.pool.begin().await?;

        let (showtime, booking) = lock_showtime_and_booking(&mut tx, booking_id).await?;

        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(booking_id)
            .execute(&mut *tx)
            .await?;

        let available_seats = if booking.is_active() {
            release_seats(&mut tx, showtime.id, booking.release_count()).await?
        } else {
            showtime.available_seats
        };
        tx.commit().await?;

        Ok(Released {
            seats_released: available_seats - showtime.available_seats,
            booking,
            available_seats,
        })
    }

    async fn showtimes_for_movie(&self, movie_id: i64) -> AppResult<Vec<Showtime>> {
        Ok(sqlx::query_as::<_, Showtime>(&format!(
            "SELECT {SHOWTIME_COLUMNS} FROM showtimes WHERE movie_id = $1 ORDER BY date, time, id"
        ))
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_showtime(&self, new: NewShowtime) -> AppResult<Showtime> {
        sqlx::query_as::<_, Showtime>(&format!(
            "INSERT INTO showtimes (movie_id, date, time, room, price, total_seats, available_seats)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {SHOWTIME_COLUMNS}"
        ))
        .bind(new.movie_id)
        .bind(new.date)
        .bind(new.time)
        .bind(&new.room)
        .bind(new.price)
        .bind(new.total_seats)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| on_foreign_key_violation(e, "movie", new.movie_id))
    }

    async fn update_showtime(&self, id: i64, update: ShowtimeUpdate) -> AppResult<Showtime> {
        let mut tx = self.pool.begin().await?;

        let mut showtime = lock_showtime(&mut tx, id).await?;
        update.apply_to(&mut showtime);

        if let Some(new_total) = update.total_seats {
            let occupied = occupied_in(&mut tx, id).await?;
            let counter = SeatCounter::new(showtime.total_seats, showtime.available_seats)
                .resize(new_total, occupied.last().copied())?;
            showtime.total_seats = counter.total;
            showtime.available_seats = counter.available;
        }

        let saved = sqlx::query_as::<_, Showtime>(&format!(
            "UPDATE showtimes
             SET date = $2, time = $3, room = $4, price = $5, total_seats = $6, available_seats = $7
             WHERE id = $1
             RETURNING {SHOWTIME_COLUMNS}"
        ))
        .bind(id)
        .bind(showtime.date)
        .bind(showtime.time)
        .bind(&showtime.room)
        .bind(showtime.price)
        .bind(showtime.total_seats)
        .bind(showtime.available_seats)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn delete_showtime(&self, id: i64) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_showtime(&mut tx, id).await?;

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE showtime_id = $1 AND status = 'confirmed'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if active > 0 {
            return Err(AppError::Conflict(format!(
                "showtime {id} has {active} active bookings"
            )));
        }

        sqlx::query("DELETE FROM bookings WHERE showtime_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM showtimes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn reconcile_showtime(&self, id: i64) -> AppResult<Showtime> {
        let mut tx = self.pool.begin().await?;

        let showtime = lock_showtime(&mut tx, id).await?;
        let occupied = occupied_in(&mut tx, id).await?;
        let counter = SeatCounter::reconciled(showtime.total_seats, &occupied);

        let saved = sqlx::query_as::<_, Showtime>(&format!(
            "UPDATE showtimes SET available_seats = $2 WHERE id = $1 RETURNING {SHOWTIME_COLUMNS}"
        ))
        .bind(id)
        .bind(counter.available)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        if saved.available_seats != showtime.available_seats {
            tracing::warn!(
                showtime_id = id,
                before = showtime.available_seats,
                after = saved.available_seats,
                "seat counter drifted from bookings"
            );
        }
        Ok(saved)
    }

    async fn upsert_rating(&self, user_id: i64, rate: RateMovie) -> AppResult<MovieRating> {
        let mut tx = self.pool.begin().await?;

        // Блокируем фильм, чтобы пересчёт среднего видел все оценки
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT id FROM movies WHERE id = $1 FOR UPDATE")
                .bind(rate.movie_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(AppError::not_found("movie", rate.movie_id));
        }

        sqlx::query(
            "INSERT INTO ratings (user_id, movie_id, rating) VALUES ($1, $2, $3)
             ON CONFLICT (user_id, movie_id)
             DO UPDATE SET rating = EXCLUDED.rating, updated_at = NOW()",
        )
        .bind(user_id)
        .bind(rate.movie_id)
        .bind(rate.rating)
        .execute(&mut *tx)
        .await
        .map_err(|e| on_foreign_key_violation(e, "user", user_id))?;

        let stars: Vec<i32> = sqlx::query_scalar("SELECT rating FROM ratings WHERE movie_id = $1")
            .bind(rate.movie_id)
            .fetch_all(&mut *tx)
            .await?;
        let (average, votes_count) = rating::average(stars);

        sqlx::query("UPDATE movies SET rating = $2, votes_count = $3 WHERE id = $1")
            .bind(rate.movie_id)
            .bind(average)
            .bind(votes_count)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(MovieRating {
            movie_id: rate.movie_id,
            rating: average,
            votes_count,
        })
    }
}
