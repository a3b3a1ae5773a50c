use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;

use crate::error::AppResult;
use crate::middleware::{AdminUser, AppJson};
use crate::models::showtime::{NewShowtime, ShowtimeUpdate};
use crate::models::Showtime;
use crate::services::ledger::SeatMap;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/showtimes", post(create_showtime))
        .route("/showtimes/{id}", put(update_showtime).delete(delete_showtime))
        .route("/showtimes/{id}/seats", get(get_seats))
}

// GET /api/showtimes/{id}/seats - всегда из БД, без кеша
async fn get_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<SeatMap>> {
    Ok(Json(state.ledger.seat_map(id).await?))
}

async fn create_showtime(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    AppJson(new): AppJson<NewShowtime>,
) -> AppResult<(StatusCode, Json<Showtime>)> {
    let showtime = state.catalog.create_showtime(new).await?;
    Ok((StatusCode::CREATED, Json(showtime)))
}

async fn update_showtime(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<i64>,
    AppJson(update): AppJson<ShowtimeUpdate>,
) -> AppResult<Json<Showtime>> {
    let showtime = state.catalog.update_showtime(id, update).await?;
    Ok(Json(showtime))
}

async fn delete_showtime(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.catalog.delete_showtime(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
