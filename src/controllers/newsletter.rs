use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::{AdminUser, AppJson};
use crate::models::newsletter::Subscriber;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/newsletter/subscribe", post(subscribe))
        .route("/admin/newsletter", get(list_subscribers))
        .route("/admin/newsletter/{id}", delete(delete_subscriber))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(email)]
    pub email: String,
}

// POST /api/newsletter/subscribe
async fn subscribe(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<SubscribeRequest>,
) -> AppResult<Json<Value>> {
    req.validate()?;
    let created = Subscriber::subscribe(&state.db.pool, req.email.trim()).await?;
    Ok(Json(json!({ "subscribed": true, "created": created })))
}

async fn list_subscribers(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<Subscriber>>> {
    Ok(Json(Subscriber::list(&state.db.pool).await?))
}

async fn delete_subscriber(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    Subscriber::delete(&state.db.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
