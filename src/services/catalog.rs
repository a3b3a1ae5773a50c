//! Сеансы и оценки: публичная выдача и правки администратора.

use chrono::{DateTime, Utc};
use validator::Validate;

use crate::error::AppResult;
use crate::models::rating::{MovieRating, RateMovie};
use crate::models::showtime::{NewShowtime, ShowtimeUpdate};
use crate::models::Showtime;
use crate::services::ledger::BookingRules;
use crate::store::BookingStore;

#[derive(Clone)]
pub struct Catalog<S> {
    store: S,
    rules: BookingRules,
}

impl<S: BookingStore> Catalog<S> {
    pub fn new(store: S, rules: BookingRules) -> Self {
        Self { store, rules }
    }

    /// Сеансы, на которые ещё идёт продажа.
    pub async fn bookable_showtimes(&self, movie_id: i64) -> AppResult<Vec<Showtime>> {
        self.bookable_showtimes_at(movie_id, Utc::now()).await
    }

    pub async fn bookable_showtimes_at(
        &self,
        movie_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Showtime>> {
        let showtimes = self.store.showtimes_for_movie(movie_id).await?;
        Ok(showtimes
            .into_iter()
            .filter(|s| s.is_bookable(now, self.rules.booking_lead, self.rules.utc_offset))
            .collect())
    }

    /// Все сеансы фильма, включая прошедшие (для админки).
    pub async fn all_showtimes(&self, movie_id: i64) -> AppResult<Vec<Showtime>> {
        self.store.showtimes_for_movie(movie_id).await
    }

    pub async fn create_showtime(&self, new: NewShowtime) -> AppResult<Showtime> {
        new.validate()?;
        let showtime = self.store.create_showtime(new).await?;
        tracing::info!(
            showtime_id = showtime.id,
            movie_id = showtime.movie_id,
            total_seats = showtime.total_seats,
            "showtime created"
        );
        Ok(showtime)
    }

    pub async fn update_showtime(&self, id: i64, update: ShowtimeUpdate) -> AppResult<Showtime> {
        update.validate()?;
        let showtime = self.store.update_showtime(id, update).await?;
        tracing::info!(
            showtime_id = id,
            total_seats = showtime.total_seats,
            available_seats = showtime.available_seats,
            "showtime updated"
        );
        Ok(showtime)
    }

    pub async fn delete_showtime(&self, id: i64) -> AppResult<()> {
        self.store.delete_showtime(id).await?;
        tracing::info!(showtime_id = id, "showtime deleted");
        Ok(())
    }

    pub async fn reconcile(&self, id: i64) -> AppResult<Showtime> {
        self.store.reconcile_showtime(id).await
    }

    pub async fn rate(&self, user_id: i64, rate: RateMovie) -> AppResult<MovieRating> {
        rate.validate()?;
        let rating = self.store.upsert_rating(user_id, rate).await?;
        tracing::debug!(
            movie_id = rating.movie_id,
            rating = rating.rating,
            votes = rating.votes_count,
            "movie rating recomputed"
        );
        Ok(rating)
    }
}
