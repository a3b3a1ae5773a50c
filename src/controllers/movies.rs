use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::{AdminUser, AppJson};
use crate::models::movie::MovieInput;
use crate::models::{Movie, Showtime};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route(
            "/movies/{id}",
            get(get_movie).put(update_movie).delete(delete_movie),
        )
        .route("/movies/{id}/showtimes", get(list_showtimes))
}

// GET /api/movies
async fn list_movies(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Movie>>> {
    Ok(Json(state.cache.get_movies().await?))
}

// GET /api/movies/{id}
async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<Movie>> {
    Ok(Json(Movie::find(&state.db.pool, id).await?))
}

// GET /api/movies/{id}/showtimes - только сеансы, на которые идёт продажа
async fn list_showtimes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<Showtime>>> {
    Ok(Json(state.catalog.bookable_showtimes(id).await?))
}

async fn create_movie(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppJson(input): AppJson<MovieInput>,
) -> AppResult<(StatusCode, Json<Movie>)> {
    input.validate()?;
    let movie = Movie::create(&state.db.pool, &input).await?;
    state.cache.invalidate_movies().await;

    tracing::info!(movie_id = movie.id, admin_id = admin.user_id, "movie created");
    Ok((StatusCode::CREATED, Json(movie)))
}

async fn update_movie(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    AppJson(input): AppJson<MovieInput>,
) -> AppResult<Json<Movie>> {
    input.validate()?;
    let movie = Movie::update(&state.db.pool, id, &input).await?;
    state.cache.invalidate_movies().await;

    tracing::info!(movie_id = id, admin_id = admin.user_id, "movie updated");
    Ok(Json(movie))
}

// Мягкое удаление: сеансы и брони остаются
async fn delete_movie(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    Movie::deactivate(&state.db.pool, id).await?;
    state.cache.invalidate_movies().await;

    tracing::info!(movie_id = id, admin_id = admin.user_id, "movie deactivated");
    Ok(StatusCode::NO_CONTENT)
}
