//! Наполняет базу демонстрационными данными: администратор, тестовые
//! пользователи, фильмы и сеансы на сегодня и завтра.

use anyhow::Context;
use chrono::{NaiveDate, NaiveTime, TimeDelta, Utc};
use tracing::info;

use cinema_booking::{
    config::Config,
    database::Database,
    models::{
        showtime::{local_to_utc, NewShowtime},
        user::NewUser,
        User,
    },
    services::{BookingRules, Catalog},
    store::PgStore,
};

struct DemoMovie {
    title: &'static str,
    genre: &'static str,
    duration: i32,
    description: &'static str,
    poster_url: &'static str,
    release_date: (i32, u32, u32),
    end_date: (i32, u32, u32),
}

const MOVIES: &[DemoMovie] = &[
    DemoMovie {
        title: "Wicked",
        genre: "Musical / Fantasy",
        duration: 160,
        description: "L'histoire inédite des sorcières d'Oz avant l'arrivée de Dorothy.",
        poster_url: "https://upload.wikimedia.org/wikipedia/en/5/5c/Wicked_2024_film_poster.jpg",
        release_date: (2025, 1, 10),
        end_date: (2025, 5, 15),
    },
    DemoMovie {
        title: "Moana 2",
        genre: "Animation / Aventure",
        duration: 100,
        description: "Vaiana reçoit un appel inattendu de ses ancêtres et part vers des mers inexplorées.",
        poster_url: "https://upload.wikimedia.org/wikipedia/en/6/6a/Moana_2_poster.jpg",
        release_date: (2025, 1, 5),
        end_date: (2025, 4, 20),
    },
    DemoMovie {
        title: "Nosferatu",
        genre: "Horreur / Gothique",
        duration: 132,
        description: "Une réinterprétation gothique et terrifiante du mythe du comte Orlok.",
        poster_url: "https://upload.wikimedia.org/wikipedia/en/9/91/Nosferatu_2024_film_poster.jpg",
        release_date: (2025, 1, 15),
        end_date: (2025, 3, 30),
    },
    DemoMovie {
        title: "Mickey 17",
        genre: "Science-Fiction",
        duration: 137,
        description: "Un homme sacrifiable est envoyé en mission sur une planète glaciale.",
        poster_url: "https://upload.wikimedia.org/wikipedia/en/5/5b/Mickey_17_film_poster.jpg",
        release_date: (2025, 3, 7),
        end_date: (2025, 5, 30),
    },
];

const SLOTS: &[(u32, u32, &str)] = &[
    (14, 0, "Salle 1"),
    (16, 30, "Salle 2"),
    (19, 0, "Salle 1"),
    (21, 30, "Salle 2"),
];

const SEATS_PER_ROOM: i32 = 60;

fn date(parts: (i32, u32, u32)) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(parts.0, parts.1, parts.2)
}

async fn upsert_movie(db: &Database, movie: &DemoMovie) -> anyhow::Result<i64> {
    let id = sqlx::query_scalar(
        "INSERT INTO movies (title, genre, duration, description, poster_url, release_date, end_date)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (title) DO UPDATE
         SET genre = EXCLUDED.genre, description = EXCLUDED.description, poster_url = EXCLUDED.poster_url
         RETURNING id",
    )
    .bind(movie.title)
    .bind(movie.genre)
    .bind(movie.duration)
    .bind(movie.description)
    .bind(movie.poster_url)
    .bind(date(movie.release_date))
    .bind(date(movie.end_date))
    .fetch_one(&db.pool)
    .await
    .with_context(|| format!("failed to upsert movie {}", movie.title))?;
    Ok(id)
}

async fn showtime_exists(db: &Database, show: &NewShowtime) -> anyhow::Result<bool> {
    Ok(sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM showtimes WHERE movie_id = $1 AND date = $2 AND time = $3 AND room = $4)",
    )
    .bind(show.movie_id)
    .bind(show.date)
    .bind(show.time)
    .bind(&show.room)
    .fetch_one(&db.pool)
    .await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .init();

    let db = Database::new(&config.database.url, 2)
        .await
        .context("failed to connect to database")?;
    db.run_migrations().await?;

    // Пользователи
    let admin_hash = bcrypt::hash("admin123", bcrypt::DEFAULT_COST)?;
    User::ensure(
        &db.pool,
        &NewUser {
            name: "Admin",
            email: "admin@sylver-screen.com",
            phone: Some("+237000000000"),
            password_hash: &admin_hash,
            is_admin: true,
            email_notifications: false,
        },
    )
    .await?;

    let test_hash = bcrypt::hash("test123", bcrypt::DEFAULT_COST)?;
    for (name, email, phone) in [
        ("Jean Dupont", "jean@example.com", "+237670000001"),
        ("Marie Kouam", "marie@example.com", "+237670000002"),
        ("Paul Mbella", "paul@example.com", "+237670000003"),
    ] {
        User::ensure(
            &db.pool,
            &NewUser {
                name,
                email,
                phone: Some(phone),
                password_hash: &test_hash,
                is_admin: false,
                email_notifications: true,
            },
        )
        .await?;
    }
    info!("👥 users ready");

    // Фильмы и сеансы
    let rules = BookingRules::from_config(&config.booking);
    let catalog = Catalog::new(PgStore::new(db.pool.clone()), rules);
    let now = Utc::now();
    let today = now.with_timezone(&rules.utc_offset).date_naive();

    let mut created = 0;
    for (index, movie) in MOVIES.iter().enumerate() {
        let movie_id = upsert_movie(&db, movie).await?;

        for day in 0..2 {
            let date = today + TimeDelta::days(day);
            // Два сеанса в день, набор слотов чередуется между фильмами
            for (hour, minute, room) in SLOTS.iter().skip(index % 2).step_by(2) {
                let Some(time) = NaiveTime::from_hms_opt(*hour, *minute, 0) else {
                    continue;
                };
                let show = NewShowtime {
                    movie_id,
                    date,
                    time,
                    room: room.to_string(),
                    price: None,
                    total_seats: SEATS_PER_ROOM,
                };

                let starts_at = local_to_utc(date, time, rules.utc_offset);
                if starts_at - now <= rules.booking_lead || showtime_exists(&db, &show).await? {
                    continue;
                }

                catalog.create_showtime(show).await?;
                created += 1;
            }
        }
    }

    info!(movies = MOVIES.len(), showtimes = created, "🎬 catalog ready");
    info!("Admin: admin@sylver-screen.com / admin123, test: jean@example.com / test123");
    Ok(())
}
