use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::{issue_token, AppJson};
use crate::models::user::{NewUser, UserSummary};
use crate::models::User;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 20))]
    pub phone: Option<String>,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    pub email_notifications: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserSummary,
}

async fn hash_password(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
}

async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
}

fn respond(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let token = issue_token(user, &state.config.jwt).map_err(AppError::internal)?;
    Ok(AuthResponse {
        token,
        user: UserSummary::from(user),
    })
}

// POST /api/auth/register
async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;

    let email = req.email.trim().to_lowercase();
    let password_hash = hash_password(req.password).await?;

    let user = User::create(
        &state.db.pool,
        &NewUser {
            name: req.name.trim(),
            email: &email,
            phone: req.phone.as_deref(),
            password_hash: &password_hash,
            is_admin: false,
            email_notifications: req.email_notifications.unwrap_or(true),
        },
    )
    .await?;

    tracing::info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(respond(&state, &user)?)))
}

// POST /api/auth/login
async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    req.validate()?;

    let invalid = || AppError::Unauthorized("invalid email or password".into());

    let user = User::find_by_email(&state.db.pool, req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(req.password, user.password_hash.clone()).await? {
        tracing::debug!(user_id = user.id, "wrong password");
        return Err(invalid());
    }

    Ok(Json(respond(&state, &user)?))
}
