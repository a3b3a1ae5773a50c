use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{BookingStore, Released};
use crate::error::{AppError, AppResult};
use crate::models::booking::BookingRow;
use crate::models::rating::{self, MovieRating, RateMovie};
use crate::models::showtime::{NewShowtime, ShowtimeUpdate};
use crate::models::{Booking, BookingStatus, NewBooking, Showtime};
use crate::services::inventory::{self, SeatCounter};
use crate::services::ledger::{check_cancellable, BookingRules};
use crate::services::pricing::{PriceTable, PriceUpdate};

/// Хранилище в памяти процесса.
///
/// Одна блокировка на всё состояние: каждая операция видит и меняет счётчик
/// и брони целиком, так же как транзакция в PostgreSQL.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    movies: BTreeMap<i64, String>,
    showtimes: BTreeMap<i64, Showtime>,
    bookings: BTreeMap<i64, Booking>,
    ratings: BTreeMap<(i64, i64), i32>,
    prices: BTreeMap<String, i64>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn showtime_mut(&mut self, id: i64) -> AppResult<&mut Showtime> {
        self.showtimes
            .get_mut(&id)
            .ok_or(AppError::not_found("showtime", id))
    }

    fn occupied(&self, showtime_id: i64) -> BTreeSet<i32> {
        inventory::occupied_union(
            self.bookings
                .values()
                .filter(|b| b.showtime_id == showtime_id),
        )
    }

    fn release(&mut self, showtime_id: i64, count: i32) -> AppResult<(i32, i32)> {
        let showtime = self.showtime_mut(showtime_id)?;
        let mut counter = SeatCounter::new(showtime.total_seats, showtime.available_seats);
        let released = counter.release(count);
        showtime.available_seats = counter.available;
        Ok((released, counter.available))
    }

    fn price_table(&self) -> PriceTable {
        PriceTable::from_entries(self.prices.iter().map(|(k, v)| (k.as_str(), *v)))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Заводит фильм, на который можно вешать сеансы и оценки.
    pub async fn add_movie(&self, title: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.movies.insert(id, title.to_string());
        id
    }

    /// Подменяет сохранённую бронь строкой в формате таблицы, минуя проверки.
    /// Строка декодируется так же, как при чтении из PostgreSQL.
    pub async fn put_raw_row(&self, row: BookingRow) {
        let booking = Booking::from(row);
        let mut state = self.state.lock().await;
        state.next_id = state.next_id.max(booking.id);
        state.bookings.insert(booking.id, booking);
    }
}

impl BookingStore for MemoryStore {
    async fn showtime(&self, id: i64) -> AppResult<Showtime> {
        let state = self.state.lock().await;
        state
            .showtimes
            .get(&id)
            .cloned()
            .ok_or(AppError::not_found("showtime", id))
    }

    async fn occupied_seats(&self, showtime_id: i64) -> AppResult<BTreeSet<i32>> {
        Ok(self.state.lock().await.occupied(showtime_id))
    }

    async fn price_table(&self) -> AppResult<PriceTable> {
        Ok(self.state.lock().await.price_table())
    }

    async fn update_prices(&self, update: &PriceUpdate) -> AppResult<PriceTable> {
        let mut state = self.state.lock().await;
        for (key, value) in update.entries() {
            state.prices.insert(key.to_string(), value);
        }
        Ok(state.price_table())
    }

    async fn create_booking(&self, new: NewBooking) -> AppResult<Booking> {
        let mut state = self.state.lock().await;

        let occupied = state.occupied(new.showtime_id);
        let showtime = state.showtime_mut(new.showtime_id)?;
        let seats = inventory::resolve_seats(&new.seats, showtime.total_seats, &occupied)?;

        let mut counter = SeatCounter::new(showtime.total_seats, showtime.available_seats);
        counter.reserve(seats.len() as i32)?;
        showtime.available_seats = counter.available;

        let booking = Booking {
            id: state.next_id(),
            user_id: new.user_id,
            showtime_id: new.showtime_id,
            seats,
            tickets: Some(new.tickets),
            total_price: new.total_price,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        };
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn list_bookings_for_user(&self, user_id: i64) -> AppResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(bookings)
    }

    async fn cancel_booking(
        &self,
        booking_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
        rules: BookingRules,
    ) -> AppResult<Released> {
        let mut state = self.state.lock().await;

        let booking = state
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or(AppError::not_found("booking", booking_id))?;
        if booking.user_id != user_id {
            return Err(AppError::Forbidden("booking belongs to another user".into()));
        }
        if !booking.is_active() {
            return Err(AppError::Conflict(format!("booking {booking_id} is already cancelled")));
        }

        let showtime = state.showtime_mut(booking.showtime_id)?.clone();
        check_cancellable(&showtime, now, &rules)?;

        let (seats_released, available_seats) =
            state.release(showtime.id, booking.release_count())?;
        let stored = state
            .bookings
            .get_mut(&booking_id)
            .ok_or(AppError::not_found("booking", booking_id))?;
        stored.status = BookingStatus::Cancelled;

        Ok(Released {
            booking: stored.clone(),
            seats_released,
            available_seats,
        })
    }

    async fn delete_booking(&self, booking_id: i64) -> AppResult<Released> {
        let mut state = self.state.lock().await;

        let booking = state
            .bookings
            .remove(&booking_id)
            .ok_or(AppError::not_found("booking", booking_id))?;

        let (seats_released, available_seats) = if booking.is_active() {
            state.release(booking.showtime_id, booking.release_count())?
        } else {
            (0, state.showtime_mut(booking.showtime_id)?.available_seats)
        };

        Ok(Released {
            booking,
            seats_released,
            available_seats,
        })
    }

    async fn showtimes_for_movie(&self, movie_id: i64) -> AppResult<Vec<Showtime>> {
        let state = self.state.lock().await;
        let mut showtimes: Vec<Showtime> = state
            .showtimes
            .values()
            .filter(|s| s.movie_id == movie_id)
            .cloned()
            .collect();
        showtimes.sort_by_key(|s| (s.date, s.time, s.id));
        Ok(showtimes)
    }

    async fn create_showtime(&self, new: NewShowtime) -> AppResult<Showtime> {
        let mut state = self.state.lock().await;
        if !state.movies.contains_key(&new.movie_id) {
            return Err(AppError::not_found("movie", new.movie_id));
        }
        let showtime = Showtime {
            id: state.next_id(),
            movie_id: new.movie_id,
            date: new.date,
            time: new.time,
            room: new.room,
            price: new.price,
            total_seats: new.total_seats,
            available_seats: new.total_seats,
        };
        state.showtimes.insert(showtime.id, showtime.clone());
        Ok(showtime)
    }

    async fn update_showtime(&self, id: i64, update: ShowtimeUpdate) -> AppResult<Showtime> {
        let mut state = self.state.lock().await;

        let highest = state.occupied(id).last().copied();
        let mut showtime = state.showtime_mut(id)?.clone();
        update.apply_to(&mut showtime);

        if let Some(new_total) = update.total_seats {
            let counter = SeatCounter::new(showtime.total_seats, showtime.available_seats)
                .resize(new_total, highest)?;
            showtime.total_seats = counter.total;
            showtime.available_seats = counter.available;
        }

        *state.showtime_mut(id)? = showtime.clone();
        Ok(showtime)
    }

    async fn delete_showtime(&self, id: i64) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.showtime_mut(id)?;

        let active = state
            .bookings
            .values()
            .filter(|b| b.showtime_id == id && b.is_active())
            .count();
        if active > 0 {
            return Err(AppError::Conflict(format!(
                "showtime {id} has {active} active bookings"
            )));
        }

        state.bookings.retain(|_, b| b.showtime_id != id);
        state.showtimes.remove(&id);
        Ok(())
    }

    async fn reconcile_showtime(&self, id: i64) -> AppResult<Showtime> {
        let mut state = self.state.lock().await;
        let occupied = state.occupied(id);
        let showtime = state.showtime_mut(id)?;
        showtime.available_seats = SeatCounter::reconciled(showtime.total_seats, &occupied).available;
        Ok(showtime.clone())
    }

    async fn upsert_rating(&self, user_id: i64, rate: RateMovie) -> AppResult<MovieRating> {
        let mut state = self.state.lock().await;
        if !state.movies.contains_key(&rate.movie_id) {
            return Err(AppError::not_found("movie", rate.movie_id));
        }
        state.ratings.insert((user_id, rate.movie_id), rate.rating);

        let (average, votes_count) = rating::average(
            state
                .ratings
                .iter()
                .filter(|((_, movie_id), _)| *movie_id == rate.movie_id)
                .map(|(_, stars)| *stars),
        );
        Ok(MovieRating {
            movie_id: rate.movie_id,
            rating: average,
            votes_count,
        })
    }
}
