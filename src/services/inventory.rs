//! Учёт мест сеанса.
//!
//! Счётчик `available_seats` - проекция объединения мест всех активных броней.
//! Здесь только чистые правила; атомарность обеспечивает хранилище, которое
//! применяет их внутри одной транзакции (или под одним мьютексом).

use std::collections::BTreeSet;

use crate::error::{AppError, AppResult};
use crate::models::{Booking, SeatRequest};

/// Счётчик мест одного сеанса. Инвариант: `0 <= available <= total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatCounter {
    pub total: i32,
    pub available: i32,
}

impl SeatCounter {
    pub fn new(total: i32, available: i32) -> Self {
        Self { total, available }
    }

    pub fn held(&self) -> i32 {
        self.total - self.available
    }

    /// Списывает `count` мест. При нехватке счётчик не меняется.
    pub fn reserve(&mut self, count: i32) -> AppResult<()> {
        if count <= 0 {
            return Err(AppError::validation("seat count must be positive"));
        }
        if count > self.available {
            return Err(AppError::InsufficientCapacity {
                requested: count,
                available: self.available,
            });
        }
        self.available -= count;
        Ok(())
    }

    /// Возвращает `count` мест, не поднимаясь выше `total`. Отдаёт фактически возвращённое.
    pub fn release(&mut self, count: i32) -> i32 {
        let before = self.available;
        self.available = self.available.saturating_add(count.max(0)).min(self.total);
        self.available - before
    }

    /// Пересчёт счётчика по фактически занятым местам.
    pub fn reconciled(total: i32, occupied: &BTreeSet<i32>) -> SeatCounter {
        let taken = i32::try_from(occupied.len()).unwrap_or(i32::MAX);
        SeatCounter {
            total,
            available: (total - taken).clamp(0, total),
        }
    }

    /// Меняет вместимость зала, сохраняя число удерживаемых мест.
    ///
    /// `highest_occupied` - наибольший номер места среди активных броней:
    /// зал нельзя сделать меньше него, иначе бронь окажется на несуществующем месте.
    pub fn resize(&self, new_total: i32, highest_occupied: Option<i32>) -> AppResult<SeatCounter> {
        if new_total <= 0 {
            return Err(AppError::validation("total_seats must be positive"));
        }
        let held = self.held();
        if new_total < held {
            return Err(AppError::Conflict(format!(
                "cannot shrink to {new_total} seats: {held} seats are booked"
            )));
        }
        if let Some(highest) = highest_occupied {
            if new_total < highest {
                return Err(AppError::Conflict(format!(
                    "cannot shrink to {new_total} seats: seat {highest} is booked"
                )));
            }
        }
        Ok(SeatCounter {
            total: new_total,
            available: new_total - held,
        })
    }
}

/// Занятые места: объединение мест всех неотменённых броней сеанса.
pub fn occupied_union<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> BTreeSet<i32> {
    bookings
        .into_iter()
        .filter(|b| b.is_active())
        .flat_map(|b| b.seats.iter().copied())
        .collect()
}

/// Проверяет запрошенные места или назначает свободные.
///
/// Явный выбор: каждый номер в `1..=total`, без повторов и не занят.
/// Автоназначение: самые младшие свободные номера по возрастанию.
pub fn resolve_seats(
    request: &SeatRequest,
    total: i32,
    occupied: &BTreeSet<i32>,
) -> AppResult<Vec<i32>> {
    match request {
        SeatRequest::Explicit(seats) => check_explicit(seats, total, occupied),
        SeatRequest::Auto(count) => assign_free_seats(*count, total, occupied),
    }
}

fn check_explicit(seats: &[i32], total: i32, occupied: &BTreeSet<i32>) -> AppResult<Vec<i32>> {
    if seats.is_empty() {
        return Err(AppError::validation("at least one seat is required"));
    }

    let mut unique = BTreeSet::new();
    for &seat in seats {
        if seat < 1 || seat > total {
            return Err(AppError::validation(format!(
                "seat {seat} is outside 1..={total}"
            )));
        }
        if !unique.insert(seat) {
            return Err(AppError::validation(format!("seat {seat} is listed twice")));
        }
    }

    let taken: Vec<i32> = unique.intersection(occupied).copied().collect();
    if !taken.is_empty() {
        return Err(AppError::SeatConflict { seats: taken });
    }

    Ok(seats.to_vec())
}

fn assign_free_seats(count: i32, total: i32, occupied: &BTreeSet<i32>) -> AppResult<Vec<i32>> {
    if count <= 0 {
        return Err(AppError::validation("seat count must be positive"));
    }
    let free: Vec<i32> = (1..=total)
        .filter(|seat| !occupied.contains(seat))
        .take(count as usize)
        .collect();
    if free.len() < count as usize {
        return Err(AppError::InsufficientCapacity {
            requested: count,
            available: free.len() as i32,
        });
    }
    Ok(free)
}
