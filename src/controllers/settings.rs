use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use std::sync::Arc;

use crate::error::AppResult;
use crate::middleware::{AdminUser, AppJson};
use crate::services::pricing::{PriceTable, PriceUpdate};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/settings/prices", get(get_prices))
        .route("/admin/prices", put(update_prices))
}

// GET /api/settings/prices - всегда из БД, без кеша
async fn get_prices(State(state): State<Arc<AppState>>) -> AppResult<Json<PriceTable>> {
    Ok(Json(state.pricing.current().await?))
}

// PUT /api/admin/prices
async fn update_prices(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    AppJson(update): AppJson<PriceUpdate>,
) -> AppResult<Json<PriceTable>> {
    let table = state.pricing.update(&update).await?;
    tracing::info!(admin_id = admin.user_id, "prices changed by admin");
    Ok(Json(table))
}
