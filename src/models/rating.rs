use serde::{Deserialize, Serialize};
use validator::Validate;

/// Итоговая оценка фильма после пересчёта.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovieRating {
    pub movie_id: i64,
    pub rating: f64,
    pub votes_count: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RateMovie {
    #[validate(range(min = 1))]
    pub movie_id: i64,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
}

/// Среднее арифметическое оценок; для пустого набора - 0.
pub fn average(stars: impl IntoIterator<Item = i32>) -> (f64, i32) {
    let (sum, count) = stars
        .into_iter()
        .fold((0i64, 0i32), |(sum, count), s| (sum + i64::from(s), count + 1));
    if count == 0 {
        (0.0, 0)
    } else {
        (sum as f64 / f64::from(count), count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_distinct_votes() {
        assert_eq!(average([5, 4, 3]), (4.0, 3));
        assert_eq!(average([]), (0.0, 0));
    }

    #[test]
    fn rating_outside_range_is_rejected() {
        let bad = RateMovie { movie_id: 1, rating: 6 };
        assert!(bad.validate().is_err());
        let ok = RateMovie { movie_id: 1, rating: 1 };
        assert!(ok.validate().is_ok());
    }
}
