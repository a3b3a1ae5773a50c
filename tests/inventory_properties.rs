//! Инварианты учёта мест на случайных последовательностях операций.

mod common;

use proptest::prelude::*;
use proptest::test_runner::Config;

use cinema_booking::services::inventory::SeatCounter;
use common::{assert_consistent, before_start, cinema, request, tickets};

#[derive(Debug, Clone)]
enum Op {
    Book { user: i64, seats: Vec<i32> },
    Cancel { pick: usize },
    Delete { pick: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1i64..4, prop::collection::vec(1i32..=12, 1..4))
            .prop_map(|(user, seats)| Op::Book { user, seats }),
        1 => any::<usize>().prop_map(|pick| Op::Cancel { pick }),
        1 => any::<usize>().prop_map(|pick| Op::Delete { pick }),
    ]
}

proptest! {
    #![proptest_config(Config::with_cases(64))]

    #[test]
    fn counter_matches_seat_union_after_any_sequence(ops in prop::collection::vec(op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let c = cinema(10).await;
            let mut booked: Vec<(i64, i64)> = Vec::new();

            for op in ops {
                match op {
                    Op::Book { user, seats } => {
                        let count = seats.len() as u32;
                        let req = request(c.showtime_id, &seats, tickets(count, 0, 0));
                        if let Ok(booking) = c.ledger.create_at(user, req, before_start(180)).await {
                            booked.push((booking.id, user));
                        }
                    }
                    Op::Cancel { pick } if !booked.is_empty() => {
                        let (id, user) = booked[pick % booked.len()];
                        let _ = c.ledger.cancel_at(id, user, before_start(120)).await;
                    }
                    Op::Delete { pick } if !booked.is_empty() => {
                        let (id, _) = booked.remove(pick % booked.len());
                        c.ledger.admin_delete(id).await.unwrap();
                    }
                    _ => {}
                }
                assert_consistent(&c.store, c.showtime_id).await;
            }
        });
    }

    #[test]
    fn counter_stays_within_bounds(
        total in 1i32..200,
        steps in prop::collection::vec((any::<bool>(), 0i32..50), 0..60),
    ) {
        let mut counter = SeatCounter::new(total, total);
        for (reserve, n) in steps {
            if reserve {
                let before = counter;
                if counter.reserve(n).is_err() {
                    prop_assert_eq!(counter, before);
                }
            } else {
                counter.release(n);
            }
            prop_assert!(counter.available >= 0);
            prop_assert!(counter.available <= counter.total);
        }
    }
}
