use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cinema_booking::models::{SeatRequest, Showtime, Tickets};
use cinema_booking::services::inventory::resolve_seats;
use cinema_booking::services::pricing::PriceTable;

fn showtime(price: Option<i64>) -> Showtime {
    Showtime {
        id: 1,
        movie_id: 1,
        date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
        time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        room: "Salle 1".into(),
        price,
        total_seats: 300,
        available_seats: 300,
    }
}

fn bench_quote(c: &mut Criterion) {
    let table = PriceTable::default();
    let tickets = Tickets {
        adulte: 4,
        enfant: 3,
        popcorn: 2,
    };
    let with_override = showtime(Some(3500));

    c.bench_function("quote_with_showtime_price", |b| {
        b.iter(|| {
            table
                .resolve(black_box(&with_override))
                .quote(black_box(&tickets))
                .unwrap()
        })
    });
}

fn bench_resolve_seats(c: &mut Criterion) {
    // Половина зала занята через одно место
    let occupied: BTreeSet<i32> = (1..=300).filter(|s| s % 2 == 0).collect();
    let explicit = SeatRequest::Explicit(vec![1, 3, 5, 7, 9, 11]);
    let auto = SeatRequest::Auto(6);

    c.bench_function("resolve_explicit_seats", |b| {
        b.iter(|| resolve_seats(black_box(&explicit), 300, black_box(&occupied)).unwrap())
    });
    c.bench_function("auto_assign_seats", |b| {
        b.iter(|| resolve_seats(black_box(&auto), 300, black_box(&occupied)).unwrap())
    });
}

criterion_group!(benches, bench_quote, bench_resolve_seats);
criterion_main!(benches);
