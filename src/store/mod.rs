//! Хранилище броней и мест.
//!
//! Каждая операция трейта - одна логическая единица работы: проверка и
//! изменение счётчика мест происходят вместе с записью брони, либо не
//! происходят вовсе.

use std::collections::BTreeSet;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppResult;
use crate::models::booking::NewBooking;
use crate::models::rating::{MovieRating, RateMovie};
use crate::models::showtime::{NewShowtime, ShowtimeUpdate};
use crate::models::{Booking, Showtime};
use crate::services::ledger::BookingRules;
use crate::services::pricing::{PriceTable, PriceUpdate};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Результат отмены или удаления брони.
#[derive(Debug, Clone, Serialize)]
pub struct Released {
    pub booking: Booking,
    /// Сколько мест вернулось в продажу (0, если бронь уже была отменена).
    pub seats_released: i32,
    pub available_seats: i32,
}

pub trait BookingStore: Send + Sync + Clone + 'static {
    fn showtime(&self, id: i64) -> impl Future<Output = AppResult<Showtime>> + Send;

    /// Объединение мест всех активных броней сеанса.
    fn occupied_seats(
        &self,
        showtime_id: i64,
    ) -> impl Future<Output = AppResult<BTreeSet<i32>>> + Send;

    fn price_table(&self) -> impl Future<Output = AppResult<PriceTable>> + Send;

    fn update_prices(
        &self,
        update: &PriceUpdate,
    ) -> impl Future<Output = AppResult<PriceTable>> + Send;

    /// Проверяет места, списывает их со счётчика и записывает бронь атомарно.
    fn create_booking(&self, new: NewBooking) -> impl Future<Output = AppResult<Booking>> + Send;

    /// Брони пользователя, новые первыми.
    fn list_bookings_for_user(
        &self,
        user_id: i64,
    ) -> impl Future<Output = AppResult<Vec<Booking>>> + Send;

    fn cancel_booking(
        &self,
        booking_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
        rules: BookingRules,
    ) -> impl Future<Output = AppResult<Released>> + Send;

    /// Удаляет запись без проверки окна отмены; места активной брони возвращаются.
    fn delete_booking(&self, booking_id: i64) -> impl Future<Output = AppResult<Released>> + Send;

    fn showtimes_for_movie(
        &self,
        movie_id: i64,
    ) -> impl Future<Output = AppResult<Vec<Showtime>>> + Send;

    fn create_showtime(
        &self,
        new: NewShowtime,
    ) -> impl Future<Output = AppResult<Showtime>> + Send;

    fn update_showtime(
        &self,
        id: i64,
        update: ShowtimeUpdate,
    ) -> impl Future<Output = AppResult<Showtime>> + Send;

    /// Удаление запрещено, пока на сеанс есть активные брони.
    fn delete_showtime(&self, id: i64) -> impl Future<Output = AppResult<()>> + Send;

    /// Пересчитывает `available_seats` по объединению занятых мест.
    fn reconcile_showtime(&self, id: i64) -> impl Future<Output = AppResult<Showtime>> + Send;

    /// Одна оценка на пару (пользователь, фильм); рейтинг фильма пересчитывается сразу.
    fn upsert_rating(
        &self,
        user_id: i64,
        rate: RateMovie,
    ) -> impl Future<Output = AppResult<MovieRating>> + Send;
}
