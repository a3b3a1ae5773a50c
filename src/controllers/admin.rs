use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::error::AppResult;
use crate::middleware::AdminUser;
use crate::models::booking::BookingDetails;
use crate::models::stats::AdminStats;
use crate::models::user::UserSummary;
use crate::models::{Showtime, User};
use crate::store::Released;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/bookings", get(list_bookings))
        .route("/admin/bookings/{id}", delete(delete_booking))
        .route("/admin/showtimes/{id}/reconcile", post(reconcile_showtime))
        .route("/admin/movies/{id}/showtimes", get(list_all_showtimes))
        .route("/admin/users", get(list_users))
        .route("/admin/stats", get(stats))
}

async fn list_bookings(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<BookingDetails>>> {
    Ok(Json(BookingDetails::all(&state.db.pool).await?))
}

// DELETE /api/admin/bookings/{id} - без проверки окна отмены, места возвращаются
async fn delete_booking(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Released>> {
    let released = state.ledger.admin_delete(id).await?;
    tracing::info!(booking_id = id, admin_id = admin.user_id, "admin removed booking");
    Ok(Json(released))
}

async fn reconcile_showtime(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Showtime>> {
    Ok(Json(state.catalog.reconcile(id).await?))
}

// Все сеансы фильма, включая прошедшие
async fn list_all_showtimes(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Showtime>>> {
    Ok(Json(state.catalog.all_showtimes(id).await?))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<UserSummary>>> {
    Ok(Json(User::list(&state.db.pool).await?))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<AdminStats>> {
    Ok(Json(AdminStats::load(&state.db.pool).await?))
}
