//! Тарифы и расчёт стоимости заказа.
//!
//! Все суммы - целые числа в минимальной единице валюты (франк КФА дробной
//! части не имеет). Порядок разрешения цены:
//! - взрослый билет: цена сеанса, если задана, иначе глобальный тариф `adulte`;
//! - детский билет: всегда глобальный тариф `enfant`;
//! - попкорн: всегда глобальный тариф `popcorn`.
//!
//! Тарифы читаются из хранилища при каждом расчёте и нигде не кешируются.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Showtime, Tickets};
use crate::store::BookingStore;

pub const CURRENCY: &str = "XAF";

pub const DEFAULT_ADULT_PRICE: i64 = 3000;
pub const DEFAULT_CHILD_PRICE: i64 = 2000;
pub const DEFAULT_POPCORN_PRICE: i64 = 4000;
/// Минимальный тариф, который может выставить администратор.
pub const MIN_PRICE: i64 = 500;

pub const KEY_ADULT: &str = "adulte";
pub const KEY_CHILD: &str = "enfant";
pub const KEY_POPCORN: &str = "popcorn";

/// Глобальные тарифы по категориям.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTable {
    pub adulte: i64,
    pub enfant: i64,
    pub popcorn: i64,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            adulte: DEFAULT_ADULT_PRICE,
            enfant: DEFAULT_CHILD_PRICE,
            popcorn: DEFAULT_POPCORN_PRICE,
        }
    }
}

impl PriceTable {
    /// Собирает таблицу из пар ключ-значение; отсутствующие ключи получают значения по умолчанию.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, i64)>,
        K: AsRef<str>,
    {
        let mut table = PriceTable::default();
        for (key, value) in entries {
            match key.as_ref() {
                KEY_ADULT => table.adulte = value,
                KEY_CHILD => table.enfant = value,
                KEY_POPCORN => table.popcorn = value,
                other => tracing::debug!(key = other, "ignoring unknown price setting"),
            }
        }
        table
    }

    /// Эффективные цены для конкретного сеанса.
    pub fn resolve(&self, showtime: &Showtime) -> ResolvedPrices {
        ResolvedPrices {
            adulte: showtime.price.unwrap_or(self.adulte),
            enfant: self.enfant,
            popcorn: self.popcorn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedPrices {
    pub adulte: i64,
    pub enfant: i64,
    pub popcorn: i64,
}

impl ResolvedPrices {
    /// Сумма `количество * цена` по всем категориям.
    pub fn quote(&self, tickets: &Tickets) -> AppResult<i64> {
        [
            (tickets.adulte, self.adulte),
            (tickets.enfant, self.enfant),
            (tickets.popcorn, self.popcorn),
        ]
        .into_iter()
        .try_fold(0i64, |total, (count, price)| {
            i64::from(count)
                .checked_mul(price)
                .and_then(|line| total.checked_add(line))
        })
        .ok_or_else(|| AppError::validation("order total is out of range"))
    }
}

/// Частичное обновление тарифов администратором.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct PriceUpdate {
    #[validate(range(min = MIN_PRICE))]
    pub adulte: Option<i64>,
    #[validate(range(min = MIN_PRICE))]
    pub enfant: Option<i64>,
    #[validate(range(min = MIN_PRICE))]
    pub popcorn: Option<i64>,
}

impl PriceUpdate {
    pub fn check(&self) -> AppResult<()> {
        if self.adulte.is_none() && self.enfant.is_none() && self.popcorn.is_none() {
            return Err(AppError::validation("at least one price is required"));
        }
        self.validate()?;
        Ok(())
    }

    pub fn entries(&self) -> Vec<(&'static str, i64)> {
        [
            (KEY_ADULT, self.adulte),
            (KEY_CHILD, self.enfant),
            (KEY_POPCORN, self.popcorn),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
    }
}

/// Доступ к тарифам поверх хранилища.
#[derive(Clone)]
pub struct PriceBook<S> {
    store: S,
}

impl<S: BookingStore> PriceBook<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn current(&self) -> AppResult<PriceTable> {
        self.store.price_table().await
    }

    pub async fn update(&self, update: &PriceUpdate) -> AppResult<PriceTable> {
        update.check()?;
        let table = self.store.update_prices(update).await?;
        tracing::info!(
            adulte = table.adulte,
            enfant = table.enfant,
            popcorn = table.popcorn,
            "price table updated"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn showtime(price: Option<i64>) -> Showtime {
        Showtime {
            id: 1,
            movie_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            room: "Salle 1".into(),
            price,
            total_seats: 60,
            available_seats: 60,
        }
    }

    #[test]
    fn missing_keys_use_defaults() {
        let table = PriceTable::from_entries([("enfant", 1500)]);
        assert_eq!(table.adulte, DEFAULT_ADULT_PRICE);
        assert_eq!(table.enfant, 1500);
        assert_eq!(table.popcorn, DEFAULT_POPCORN_PRICE);
    }

    #[test]
    fn showtime_price_overrides_adult_only() {
        let table = PriceTable { adulte: 3000, enfant: 2000, popcorn: 4000 };
        let prices = table.resolve(&showtime(Some(3500)));
        assert_eq!(prices.adulte, 3500);
        assert_eq!(prices.enfant, 2000);
        assert_eq!(prices.popcorn, 4000);

        let prices = table.resolve(&showtime(None));
        assert_eq!(prices.adulte, 3000);
    }

    #[test]
    fn quote_sums_every_category() {
        let table = PriceTable { adulte: 3000, enfant: 2000, popcorn: 4000 };
        let prices = table.resolve(&showtime(None));
        let tickets = Tickets { adulte: 2, enfant: 1, popcorn: 0 };
        assert_eq!(prices.quote(&tickets).unwrap(), 8000);

        let with_popcorn = Tickets { adulte: 1, enfant: 0, popcorn: 2 };
        assert_eq!(prices.quote(&with_popcorn).unwrap(), 11000);
    }

    #[test]
    fn quote_overflow_is_a_validation_error() {
        let prices = ResolvedPrices { adulte: i64::MAX, enfant: 0, popcorn: 0 };
        let tickets = Tickets { adulte: 2, enfant: 0, popcorn: 0 };
        assert!(matches!(prices.quote(&tickets), Err(AppError::Validation(_))));
    }

    #[test]
    fn update_requires_at_least_one_price() {
        assert!(PriceUpdate::default().check().is_err());
        let too_low = PriceUpdate { enfant: Some(499), ..Default::default() };
        assert!(too_low.check().is_err());
        let ok = PriceUpdate { popcorn: Some(500), ..Default::default() };
        assert!(ok.check().is_ok());
        assert_eq!(ok.entries(), vec![("popcorn", 500)]);
    }
}
