pub mod admin;
pub mod auth;
pub mod bookings;
pub mod movies;
pub mod newsletter;
pub mod ratings;
pub mod settings;
pub mod showtimes;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(auth::routes())
        .merge(movies::routes())
        .merge(showtimes::routes())
        .merge(bookings::routes())
        .merge(ratings::routes())
        .merge(settings::routes())
        .merge(newsletter::routes())
        .merge(admin::routes())
}
