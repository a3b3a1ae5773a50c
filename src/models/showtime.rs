use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Сеанс. `date`/`time` хранятся в местном времени кинотеатра.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Showtime {
    pub id: i64,
    pub movie_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub room: String,
    /// Цена взрослого билета для сеанса; `None` - берётся глобальная.
    pub price: Option<i64>,
    pub total_seats: i32,
    pub available_seats: i32,
}

/// Местное время кинотеатра в UTC.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    (date.and_time(time) - TimeDelta::seconds(offset.local_minus_utc().into())).and_utc()
}

impl Showtime {
    pub fn starts_at(&self, offset: FixedOffset) -> DateTime<Utc> {
        local_to_utc(self.date, self.time, offset)
    }

    /// Сеанс продаётся, пока до начала строго больше `lead`.
    pub fn is_bookable(&self, now: DateTime<Utc>, lead: TimeDelta, offset: FixedOffset) -> bool {
        self.starts_at(offset) - now > lead
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewShowtime {
    #[validate(range(min = 1))]
    pub movie_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[validate(length(min = 1, max = 64))]
    pub room: String,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(range(min = 1, max = 1000))]
    pub total_seats: i32,
}

/// Правка сеанса администратором. Пустые поля не меняются.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ShowtimeUpdate {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    #[validate(length(min = 1, max = 64))]
    pub room: Option<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    /// Явный сброс цены сеанса к глобальной.
    #[serde(default)]
    pub clear_price: bool,
    #[validate(range(min = 1, max = 1000))]
    pub total_seats: Option<i32>,
}

impl ShowtimeUpdate {
    pub fn apply_to(&self, showtime: &mut Showtime) {
        if let Some(date) = self.date {
            showtime.date = date;
        }
        if let Some(time) = self.time {
            showtime.time = time;
        }
        if let Some(room) = &self.room {
            showtime.room = room.clone();
        }
        if self.clear_price {
            showtime.price = None;
        } else if let Some(price) = self.price {
            showtime.price = Some(price);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn showtime_at(date: NaiveDate, time: NaiveTime) -> Showtime {
        Showtime {
            id: 1,
            movie_id: 1,
            date,
            time,
            room: "Salle 1".into(),
            price: None,
            total_seats: 60,
            available_seats: 60,
        }
    }

    #[test]
    fn start_is_shifted_by_cinema_offset() {
        let st = showtime_at(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
        );
        let offset = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(st.starts_at(offset), Utc.with_ymd_and_hms(2026, 3, 1, 18, 0, 0).unwrap());
    }

    #[test]
    fn lead_time_boundary_is_exclusive() {
        let st = showtime_at(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        );
        let utc = FixedOffset::east_opt(0).unwrap();
        let lead = TimeDelta::minutes(30);

        let exactly = Utc.with_ymd_and_hms(2026, 3, 1, 19, 30, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2026, 3, 1, 19, 29, 0).unwrap();
        assert!(!st.is_bookable(exactly, lead, utc));
        assert!(st.is_bookable(before, lead, utc));
    }

    #[test]
    fn update_can_reset_price_to_global() {
        let mut st = showtime_at(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
        );
        st.price = Some(3500);
        let update = ShowtimeUpdate {
            clear_price: true,
            room: Some("Salle 2".into()),
            ..Default::default()
        };
        update.apply_to(&mut st);
        assert_eq!(st.price, None);
        assert_eq!(st.room, "Salle 2");
    }
}
