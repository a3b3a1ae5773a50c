//! Проверки PgStore на живой базе. Нужен DATABASE_URL:
//! `cargo test --test postgres_store -- --ignored`

mod common;

use std::collections::BTreeSet;

use sqlx::PgPool;

use cinema_booking::error::AppError;
use cinema_booking::models::rating::RateMovie;
use cinema_booking::models::showtime::NewShowtime;
use cinema_booking::models::BookingStatus;
use cinema_booking::services::{BookingLedger, Catalog};
use cinema_booking::store::{BookingStore, PgStore};
use common::{before_start, request, rules, show_date, show_time, tickets};

async fn insert_user(pool: &PgPool, email: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO users (name, email, password_hash) VALUES ('Test', $1, 'x') RETURNING id",
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn insert_movie(pool: &PgPool) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO movies (title, genre, duration) VALUES ('Moana 2', 'Animation', 100) RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn setup(pool: PgPool, total_seats: i32) -> (PgStore, i64, i64) {
    let store = PgStore::new(pool.clone());
    let movie_id = insert_movie(&pool).await;
    let showtime = Catalog::new(store.clone(), rules())
        .create_showtime(NewShowtime {
            movie_id,
            date: show_date(),
            time: show_time(),
            room: "Salle 2".into(),
            price: None,
            total_seats,
        })
        .await
        .unwrap();
    (store, movie_id, showtime.id)
}

async fn assert_consistent(store: &PgStore, showtime_id: i64) {
    let showtime = store.showtime(showtime_id).await.unwrap();
    let occupied = store.occupied_seats(showtime_id).await.unwrap();
    assert_eq!(
        (showtime.total_seats - showtime.available_seats) as usize,
        occupied.len()
    );
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore]
async fn booking_and_cancellation_round_trip(pool: PgPool) {
    let user = insert_user(&pool, "awa@example.com").await;
    let (store, _, showtime_id) = setup(pool, 60).await;
    let ledger = BookingLedger::new(store.clone(), rules());

    let booking = ledger
        .create_at(
            user,
            request(showtime_id, &[1, 2, 3], tickets(2, 1, 0)),
            before_start(180),
        )
        .await
        .unwrap();
    assert_eq!(booking.total_price, 8000);
    assert_eq!(store.showtime(showtime_id).await.unwrap().available_seats, 57);
    assert_eq!(
        store.occupied_seats(showtime_id).await.unwrap(),
        BTreeSet::from([1, 2, 3])
    );

    let err = ledger
        .create_at(
            user,
            request(showtime_id, &[3, 4], tickets(2, 0, 0)),
            before_start(170),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SeatConflict { .. }));

    let released = ledger
        .cancel_at(booking.id, user, before_start(60))
        .await
        .unwrap();
    assert_eq!(released.booking.status, BookingStatus::Cancelled);
    assert_eq!(released.seats_released, 3);
    assert_eq!(released.available_seats, 60);
    assert_consistent(&store, showtime_id).await;
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore]
async fn last_seat_goes_to_exactly_one_booking(pool: PgPool) {
    let first = insert_user(&pool, "first@example.com").await;
    let second = insert_user(&pool, "second@example.com").await;
    let (store, _, showtime_id) = setup(pool, 1).await;
    let ledger = BookingLedger::new(store.clone(), rules());

    let (a, b) = tokio::join!(
        ledger.create_at(first, request(showtime_id, &[1], tickets(1, 0, 0)), before_start(90)),
        ledger.create_at(second, request(showtime_id, &[1], tickets(1, 0, 0)), before_start(90)),
    );
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    assert_eq!(store.showtime(showtime_id).await.unwrap().available_seats, 0);
    assert_consistent(&store, showtime_id).await;
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore]
async fn showtime_with_bookings_cannot_be_deleted(pool: PgPool) {
    let user = insert_user(&pool, "keep@example.com").await;
    let (store, _, showtime_id) = setup(pool, 10).await;
    let ledger = BookingLedger::new(store.clone(), rules());
    ledger
        .create_at(user, request(showtime_id, &[5], tickets(1, 0, 0)), before_start(120))
        .await
        .unwrap();

    let err = store.delete_showtime(showtime_id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore]
async fn second_rating_replaces_first(pool: PgPool) {
    let awa = insert_user(&pool, "awa@example.com").await;
    let paul = insert_user(&pool, "paul@example.com").await;
    let (store, movie_id, _) = setup(pool, 10).await;

    store
        .upsert_rating(awa, RateMovie { movie_id, rating: 2 })
        .await
        .unwrap();
    store
        .upsert_rating(paul, RateMovie { movie_id, rating: 5 })
        .await
        .unwrap();
    let summary = store
        .upsert_rating(awa, RateMovie { movie_id, rating: 4 })
        .await
        .unwrap();

    assert_eq!(summary.votes_count, 2);
    assert!((summary.rating - 4.5).abs() < f64::EPSILON);
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore]
async fn array_breakdown_releases_a_single_seat(pool: PgPool) {
    let user = insert_user(&pool, "array@example.com").await;
    let (store, _, showtime_id) = setup(pool.clone(), 10).await;
    let ledger = BookingLedger::new(store.clone(), rules());

    ledger
        .create_at(user, request(showtime_id, &[1, 2, 3], tickets(3, 0, 0)), before_start(180))
        .await
        .unwrap();
    let damaged = ledger
        .create_at(user, request(showtime_id, &[4], tickets(1, 0, 0)), before_start(180))
        .await
        .unwrap();
    sqlx::query("UPDATE bookings SET tickets = '[5]'::jsonb WHERE id = $1")
        .bind(damaged.id)
        .execute(&pool)
        .await
        .unwrap();

    let released = ledger.admin_delete(damaged.id).await.unwrap();
    assert_eq!(released.seats_released, 1);
    assert_eq!(released.available_seats, 7);
    assert_consistent(&store, showtime_id).await;
}

#[sqlx::test(migrations = "src/migrations")]
#[ignore]
async fn concurrent_booking_and_showtime_deletes_do_not_deadlock(pool: PgPool) {
    let user = insert_user(&pool, "race@example.com").await;
    let (store, _, showtime_id) = setup(pool, 10).await;
    let ledger = BookingLedger::new(store.clone(), rules());

    let booking = ledger
        .create_at(user, request(showtime_id, &[2], tickets(1, 0, 0)), before_start(180))
        .await
        .unwrap();
    ledger.cancel_at(booking.id, user, before_start(120)).await.unwrap();

    let (by_booking, by_showtime) = tokio::join!(
        store.delete_booking(booking.id),
        store.delete_showtime(showtime_id),
    );

    // Проигравшая операция видит уже удалённую строку, но не ошибку хранилища
    assert!(!matches!(by_booking, Err(AppError::Storage(_))), "{by_booking:?}");
    assert!(by_showtime.is_ok(), "{by_showtime:?}");
    assert!(matches!(
        store.showtime(showtime_id).await,
        Err(AppError::NotFound { .. })
    ));
}
