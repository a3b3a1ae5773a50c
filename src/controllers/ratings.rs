use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;

use crate::error::AppResult;
use crate::middleware::{AppJson, AuthUser};
use crate::models::rating::{MovieRating, RateMovie};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ratings", post(rate_movie))
}

// POST /api/ratings - повторная оценка перезаписывает прежнюю
async fn rate_movie(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(rate): AppJson<RateMovie>,
) -> AppResult<Json<MovieRating>> {
    let rating = state.catalog.rate(user.user_id, rate).await?;
    // Рейтинг входит в кешированный список фильмов
    state.cache.invalidate_movies().await;
    Ok(Json(rating))
}
