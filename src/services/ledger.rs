//! Журнал броней: создание, просмотр, отмена и удаление.
//!
//! Запрос проверяется целиком до первого обращения к хранилищу. Списание и
//! возврат мест выполняет хранилище в той же транзакции, что и запись брони.

use chrono::{DateTime, FixedOffset, Offset, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::BookingConfig;
use crate::error::{AppError, AppResult};
use crate::models::{Booking, NewBooking, SeatRequest, Showtime, Tickets};
use crate::store::{BookingStore, Released};

/// Отмена запрещена, если до начала сеанса осталось столько минут или меньше.
pub const CANCELLATION_CUTOFF_MINUTES: i64 = 25;
/// Сеанс продаётся, пока до начала больше этого числа минут.
pub const BOOKING_LEAD_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingRules {
    pub cancellation_cutoff: TimeDelta,
    pub booking_lead: TimeDelta,
    pub utc_offset: FixedOffset,
    pub auto_assign_seats: bool,
}

impl BookingRules {
    pub fn from_config(config: &BookingConfig) -> Self {
        let utc_offset = FixedOffset::east_opt(config.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| {
                tracing::warn!(
                    minutes = config.utc_offset_minutes,
                    "invalid cinema UTC offset, falling back to UTC"
                );
                Utc.fix()
            });

        Self {
            cancellation_cutoff: TimeDelta::minutes(config.cancellation_cutoff_minutes),
            booking_lead: TimeDelta::minutes(config.booking_lead_minutes),
            utc_offset,
            auto_assign_seats: config.auto_assign_seats,
        }
    }
}

impl Default for BookingRules {
    fn default() -> Self {
        Self::from_config(&BookingConfig::default())
    }
}

/// Можно ли ещё отменить бронь на этот сеанс.
pub fn check_cancellable(
    showtime: &Showtime,
    now: DateTime<Utc>,
    rules: &BookingRules,
) -> AppResult<()> {
    let left = showtime.starts_at(rules.utc_offset) - now;
    if left <= rules.cancellation_cutoff {
        return Err(AppError::TooLate {
            minutes_left: left.num_minutes(),
            cutoff_minutes: rules.cancellation_cutoff.num_minutes(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(range(min = 1))]
    pub showtime_id: i64,
    #[serde(default)]
    pub seat_numbers: Vec<i32>,
    pub tickets: Tickets,
    #[validate(range(min = 0))]
    pub total_price: i64,
}

impl CreateBookingRequest {
    /// Проверки, не требующие хранилища.
    fn seat_request(&self, rules: &BookingRules) -> AppResult<SeatRequest> {
        self.validate()?;

        let seated = self.tickets.seated();
        if seated == 0 {
            return Err(AppError::validation(
                "at least one adult or child ticket is required",
            ));
        }
        let seated = i32::try_from(seated)
            .map_err(|_| AppError::validation("too many tickets in one booking"))?;

        if self.seat_numbers.is_empty() {
            if rules.auto_assign_seats {
                return Ok(SeatRequest::Auto(seated));
            }
            return Err(AppError::validation("seat_numbers are required"));
        }

        if self.seat_numbers.len() != seated as usize {
            return Err(AppError::validation(format!(
                "{} seats selected for {} tickets",
                self.seat_numbers.len(),
                seated
            )));
        }
        Ok(SeatRequest::Explicit(self.seat_numbers.clone()))
    }
}

/// Схема зала для выбора мест.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatMap {
    pub showtime_id: i64,
    pub occupied_seats: Vec<i32>,
    pub total_seats: i32,
    pub available_seats: i32,
}

#[derive(Clone)]
pub struct BookingLedger<S> {
    store: S,
    rules: BookingRules,
}

impl<S: BookingStore> BookingLedger<S> {
    pub fn new(store: S, rules: BookingRules) -> Self {
        Self { store, rules }
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    pub async fn create(&self, user_id: i64, request: CreateBookingRequest) -> AppResult<Booking> {
        self.create_at(user_id, request, Utc::now()).await
    }

    pub async fn create_at(
        &self,
        user_id: i64,
        request: CreateBookingRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Booking> {
        let seats = request.seat_request(&self.rules)?;

        let showtime = self.store.showtime(request.showtime_id).await?;
        if !showtime.is_bookable(now, self.rules.booking_lead, self.rules.utc_offset) {
            return Err(AppError::validation(format!(
                "showtime {} is closed for booking",
                showtime.id
            )));
        }

        let prices = self.store.price_table().await?.resolve(&showtime);
        let expected = prices.quote(&request.tickets)?;
        if expected != request.total_price {
            tracing::warn!(
                showtime_id = showtime.id,
                user_id,
                submitted = request.total_price,
                expected,
                "booking total does not match current prices"
            );
            return Err(AppError::validation(format!(
                "total_price {} does not match computed total {}",
                request.total_price, expected
            )));
        }

        let booking = self
            .store
            .create_booking(NewBooking {
                user_id,
                showtime_id: showtime.id,
                seats,
                tickets: request.tickets,
                total_price: expected,
            })
            .await
            .inspect_err(|e| {
                tracing::debug!(showtime_id = showtime.id, user_id, error = %e, "booking rejected")
            })?;

        tracing::info!(
            booking_id = booking.id,
            showtime_id = booking.showtime_id,
            user_id,
            seats = ?booking.seats,
            total_price = booking.total_price,
            "booking confirmed"
        );
        Ok(booking)
    }

    pub async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Booking>> {
        self.store.list_bookings_for_user(user_id).await
    }

    pub async fn cancel(&self, booking_id: i64, user_id: i64) -> AppResult<Released> {
        self.cancel_at(booking_id, user_id, Utc::now()).await
    }

    pub async fn cancel_at(
        &self,
        booking_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Released> {
        let released = self
            .store
            .cancel_booking(booking_id, user_id, now, self.rules)
            .await
            .inspect_err(|e| tracing::warn!(booking_id, user_id, error = %e, "cancel rejected"))?;

        tracing::info!(
            booking_id,
            showtime_id = released.booking.showtime_id,
            seats_released = released.seats_released,
            available_seats = released.available_seats,
            "booking cancelled"
        );
        Ok(released)
    }

    pub async fn admin_delete(&self, booking_id: i64) -> AppResult<Released> {
        let released = self.store.delete_booking(booking_id).await?;
        tracing::info!(
            booking_id,
            showtime_id = released.booking.showtime_id,
            seats_released = released.seats_released,
            available_seats = released.available_seats,
            "booking deleted by admin"
        );
        Ok(released)
    }

    pub async fn seat_map(&self, showtime_id: i64) -> AppResult<SeatMap> {
        let showtime = self.store.showtime(showtime_id).await?;
        let occupied = self.store.occupied_seats(showtime_id).await?;
        Ok(SeatMap {
            showtime_id,
            occupied_seats: occupied.into_iter().collect(),
            total_seats: showtime.total_seats,
            available_seats: showtime.available_seats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn rules() -> BookingRules {
        BookingRules {
            utc_offset: FixedOffset::east_opt(0).unwrap(),
            ..BookingRules::default()
        }
    }

    fn showtime() -> Showtime {
        Showtime {
            id: 1,
            movie_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            room: "Salle 1".into(),
            price: None,
            total_seats: 60,
            available_seats: 60,
        }
    }

    fn request(seats: &[i32], adulte: u32, enfant: u32) -> CreateBookingRequest {
        CreateBookingRequest {
            showtime_id: 1,
            seat_numbers: seats.to_vec(),
            tickets: Tickets { adulte, enfant, popcorn: 0 },
            total_price: 0,
        }
    }

    #[test]
    fn cutoff_boundary_is_too_late() {
        let st = showtime();
        let at = |h, m| Utc.with_ymd_and_hms(2026, 6, 1, h, m, 0).unwrap();

        assert!(check_cancellable(&st, at(19, 34), &rules()).is_ok());
        match check_cancellable(&st, at(19, 35), &rules()) {
            Err(AppError::TooLate { minutes_left, cutoff_minutes }) => {
                assert_eq!(minutes_left, 25);
                assert_eq!(cutoff_minutes, CANCELLATION_CUTOFF_MINUTES);
            }
            other => panic!("expected TooLate, got {other:?}"),
        }
        assert!(check_cancellable(&st, at(21, 0), &rules()).is_err());
    }

    #[test]
    fn default_rules_use_canonical_constants() {
        let rules = BookingRules::default();
        assert_eq!(rules.cancellation_cutoff, TimeDelta::minutes(25));
        assert_eq!(rules.booking_lead, TimeDelta::minutes(30));
        assert_eq!(rules.utc_offset.local_minus_utc(), 3600);
        assert!(!rules.auto_assign_seats);
    }

    #[test]
    fn seat_count_must_match_seated_tickets() {
        let err = request(&[1, 2], 2, 1).seat_request(&rules()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let ok = request(&[1, 2, 3], 2, 1).seat_request(&rules()).unwrap();
        assert_eq!(ok, SeatRequest::Explicit(vec![1, 2, 3]));
    }

    #[test]
    fn popcorn_alone_is_not_a_booking() {
        let mut req = request(&[], 0, 0);
        req.tickets.popcorn = 2;
        assert!(matches!(req.seat_request(&rules()), Err(AppError::Validation(_))));
    }

    #[test]
    fn missing_seats_depend_on_assignment_mode() {
        let req = request(&[], 2, 0);
        assert!(matches!(req.seat_request(&rules()), Err(AppError::Validation(_))));

        let legacy = BookingRules { auto_assign_seats: true, ..rules() };
        assert_eq!(req.seat_request(&legacy).unwrap(), SeatRequest::Auto(2));
    }

    #[test]
    fn negative_total_is_rejected() {
        let mut req = request(&[1], 1, 0);
        req.total_price = -1;
        assert!(matches!(req.seat_request(&rules()), Err(AppError::Validation(_))));
    }
}
