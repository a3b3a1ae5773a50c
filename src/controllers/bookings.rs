use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::middleware::{AppJson, AuthUser};
use crate::models::booking::BookingDetails;
use crate::models::{Booking, User};
use crate::services::ledger::CreateBookingRequest;
use crate::services::notification::{spawn_confirmation, BookingConfirmation};
use crate::store::Released;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(get_user_bookings).post(create_booking))
        .route("/bookings/{id}/cancel", put(cancel_booking))
}

#[derive(Debug, Serialize)]
struct CreateBookingResponse {
    booking_id: i64,
    booking: Booking,
}

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<CreateBookingResponse>)> {
    let booking = state.ledger.create(user.user_id, req).await?;
    notify_confirmed(&state, &booking);

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            booking_id: booking.id,
            booking,
        }),
    ))
}

// GET /api/bookings
async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<Vec<Booking>>> {
    Ok(Json(state.ledger.list_for_user(user.user_id).await?))
}

// PUT /api/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Released>> {
    Ok(Json(state.ledger.cancel(id, user.user_id).await?))
}

/// Письмо уходит уже после коммита; ошибки отправки бронь не затрагивают.
fn notify_confirmed(state: &Arc<AppState>, booking: &Booking) {
    let pool = state.db.pool.clone();
    let booking = booking.clone();
    spawn_confirmation(state.notifier.clone(), booking.id, async move {
        let Some(user) = User::find_by_id(&pool, booking.user_id).await? else {
            return Ok(None);
        };
        if !user.email_notifications {
            return Ok(None);
        }
        let Some(details) = BookingDetails::find(&pool, booking.id).await? else {
            return Ok(None);
        };

        Ok::<_, AppError>(Some(BookingConfirmation {
            booking_id: booking.id,
            email: user.email,
            name: user.name,
            movie_title: details.movie_title,
            date: details.date,
            time: details.time,
            room: details.room,
            seats: booking.seats,
            tickets: booking.tickets,
            total_price: booking.total_price,
        }))
    });
}
