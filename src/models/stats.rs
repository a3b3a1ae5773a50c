use serde::Serialize;
use sqlx::PgPool;

use super::{Movie, User};

/// Сводка для главной страницы админки.
#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub users: i64,
    pub bookings: i64,
    pub revenue: i64,
    pub movies: i64,
}

impl AdminStats {
    pub async fn load(pool: &PgPool) -> Result<AdminStats, sqlx::Error> {
        let confirmed = async {
            sqlx::query_as::<_, (i64, i64)>(
                "SELECT COUNT(*), COALESCE(SUM(total_price), 0)::BIGINT
                 FROM bookings WHERE status = 'confirmed'",
            )
            .fetch_one(pool)
            .await
        };

        let (users, (bookings, revenue), movies) = tokio::try_join!(
            User::count(pool),
            confirmed,
            Movie::count_active(pool),
        )?;

        Ok(AdminStats { users, bookings, revenue, movies })
    }
}
